use super::ranges::{self, Span};
use super::{DetectionContext, DetectionRequest, MediaSegmenter, WorkRange};
use crate::model::Medium;
use tracing::{debug, warn};

pub const FRAME_COUNT_METADATA: &str = "FRAME_COUNT";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoSegmenter;

impl MediaSegmenter for VideoSegmenter {
    fn create_work_units(&self, medium: &Medium, ctx: &DetectionContext) -> Vec<DetectionRequest> {
        let spans = if ctx.is_first_detection_stage {
            match frame_count(medium) {
                Some(count) => vec![Span::new(0, count - 1)],
                None => return Vec::new(),
            }
        } else {
            ctx.previous_tracks
                .iter()
                .map(|t| Span::new(u64::from(t.start_frame), u64::from(t.stop_frame)))
                .collect()
        };

        let plan = &ctx.segmenting_plan;
        let merged = ranges::merge(spans, u64::from(plan.min_gap_between_segments));
        debug!(
            "medium #{} action {}: {} frame range(s) after merging",
            medium.id,
            ctx.action_index,
            merged.len()
        );

        merged
            .into_iter()
            .flat_map(|span| {
                ranges::split(
                    span,
                    u64::from(plan.target_segment_length),
                    u64::from(plan.min_segment_length),
                )
            })
            .map(|segment| {
                DetectionRequest::new(
                    medium,
                    ctx,
                    WorkRange::Video {
                        start_frame: to_frame(segment.start),
                        stop_frame: to_frame(segment.stop),
                        frame_interval: plan.sampling_interval,
                    },
                )
            })
            .collect()
    }
}

fn frame_count(medium: &Medium) -> Option<u64> {
    let Some(raw) = medium.metadata(FRAME_COUNT_METADATA) else {
        warn!("video medium #{} has no {FRAME_COUNT_METADATA}; nothing to segment", medium.id);
        return None;
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => {
            warn!("video medium #{} has {FRAME_COUNT_METADATA}=0; nothing to segment", medium.id);
            None
        }
        Ok(count) => Some(count),
        Err(_) => {
            warn!("video medium #{} has non-numeric {FRAME_COUNT_METADATA} '{raw}'", medium.id);
            None
        }
    }
}

fn to_frame(v: u64) -> u32 {
    u32::try_from(v).unwrap_or(u32::MAX)
}
