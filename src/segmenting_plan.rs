use crate::config::Segmenting;
use crate::model::Properties;
use crate::properties::{
    COMPUTED_FRAME_INTERVAL, FRAME_INTERVAL, MINIMUM_GAP_BETWEEN_SEGMENTS, MINIMUM_SEGMENT_LENGTH,
    TARGET_SEGMENT_LENGTH,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentingPlan {
    pub target_segment_length: u32,
    pub min_segment_length: u32,
    /// Always >= 1.
    pub sampling_interval: u32,
    pub min_gap_between_segments: u32,
}

impl SegmentingPlan {
    pub fn defaults(defaults: &Segmenting) -> Self {
        Self {
            target_segment_length: defaults.target_segment_length,
            min_segment_length: defaults.min_segment_length,
            sampling_interval: defaults.sampling_interval.max(1),
            min_gap_between_segments: defaults.min_gap_between_segments,
        }
    }

    /// Build a plan from a resolved property map. Keys match case-insensitively;
    /// unparseable values are logged and leave the field untouched.
    pub fn from_properties(defaults: &Segmenting, properties: &Properties) -> Self {
        let mut plan = Self::defaults(defaults);
        let default_interval = plan.sampling_interval;
        let mut computed = None;

        for (key, value) in properties {
            if key.eq_ignore_ascii_case(TARGET_SEGMENT_LENGTH) {
                set_u32(&mut plan.target_segment_length, TARGET_SEGMENT_LENGTH, value);
            } else if key.eq_ignore_ascii_case(MINIMUM_SEGMENT_LENGTH) {
                set_u32(&mut plan.min_segment_length, MINIMUM_SEGMENT_LENGTH, value);
            } else if key.eq_ignore_ascii_case(MINIMUM_GAP_BETWEEN_SEGMENTS) {
                set_u32(&mut plan.min_gap_between_segments, MINIMUM_GAP_BETWEEN_SEGMENTS, value);
            } else if key.eq_ignore_ascii_case(FRAME_INTERVAL) {
                match value.trim().parse::<i64>() {
                    Ok(v) if v >= 1 => plan.sampling_interval = clamp_u32(v),
                    Ok(_) => {
                        plan.sampling_interval = default_interval;
                        warn!(
                            "'{}' is not an acceptable {} value. Defaulting to '{}'.",
                            value, FRAME_INTERVAL, default_interval
                        );
                    }
                    Err(err) => warn!(
                        "Attempted to parse {} value of '{}' but encountered an exception ({}). Defaulting to '{}'.",
                        FRAME_INTERVAL, value, err, plan.sampling_interval
                    ),
                }
            } else if key.eq_ignore_ascii_case(COMPUTED_FRAME_INTERVAL) {
                computed = parse_computed_interval(value);
            }
        }

        // Applied last so the injected value is not shadowed by map order.
        if let Some(interval) = computed {
            plan.sampling_interval = interval;
        }

        plan
    }
}

fn set_u32(field: &mut u32, name: &str, value: &str) {
    match value.trim().parse::<u32>() {
        Ok(v) => *field = v,
        Err(err) => warn!(
            "Attempted to parse {} value of '{}' but encountered an exception ({}). Defaulting to '{}'.",
            name, value, err, field
        ),
    }
}

fn clamp_u32(v: i64) -> u32 {
    u32::try_from(v).unwrap_or(u32::MAX)
}

/// Accepts the integral forms a computed interval is written in ("3" or "3.0").
fn parse_computed_interval(value: &str) -> Option<u32> {
    let parsed = value.trim().parse::<f64>().ok();
    match parsed {
        Some(v) if v.is_finite() && v >= 1.0 && v.fract() == 0.0 => Some(clamp_u32(v as i64)),
        _ => {
            warn!("ignoring invalid {} value '{}'", COMPUTED_FRAME_INTERVAL, value);
            None
        }
    }
}
