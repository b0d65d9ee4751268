/// Inclusive range of frames or milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Span {
    pub start: u64,
    pub stop: u64,
}

impl Span {
    pub fn new(a: u64, b: u64) -> Self {
        Self {
            start: a.min(b),
            stop: a.max(b),
        }
    }
}

/// Sort spans and join any whose gap is within `min_gap`.
pub fn merge(mut spans: Vec<Span>, min_gap: u64) -> Vec<Span> {
    spans.sort();
    let mut merged: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(last) if span.start <= last.stop.saturating_add(min_gap) => {
                last.stop = last.stop.max(span.stop);
            }
            _ => merged.push(span),
        }
    }
    merged
}

/// Cut a span into pieces of `target` length. A trailing remainder shorter
/// than `min_len` is folded into the piece before it.
pub fn split(span: Span, target: u64, min_len: u64) -> Vec<Span> {
    let target = target.max(1);
    let min_len = min_len.max(1);

    let mut pieces = Vec::new();
    let mut p = span.start;
    loop {
        let mut end = p.saturating_add(target - 1).min(span.stop);
        let remaining = span.stop - end;
        if remaining > 0 && remaining < min_len {
            end = span.stop;
        }
        pieces.push(Span { start: p, stop: end });
        if end == span.stop {
            break;
        }
        p = end + 1;
    }
    pieces
}
