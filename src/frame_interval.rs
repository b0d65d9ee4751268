//! Frame-rate cap handling.
//!
//! A frame-rate cap (`FRAME_RATE_CAP`, frames to process per second) is
//! converted into a sampling interval for media that report an `FPS`. The cap
//! may be set system-wide, on the job, or on the job's overrides for one
//! algorithm; each level is applied in that order. A positive job
//! `FRAME_INTERVAL` suppresses the system cap, a positive algorithm
//! `FRAME_INTERVAL` discards anything computed from the system or job caps,
//! and a cap at a higher level wins over whatever was computed before it.
//! Caps `<= 0` are disabled.

use crate::model::{Medium, Properties};
use crate::properties::{FRAME_INTERVAL, FRAME_RATE_CAP};
use tracing::{debug, warn};

pub const FPS_METADATA: &str = "FPS";

#[derive(Debug, Clone, Copy)]
pub struct FrameIntervalInputs<'a> {
    pub media_fps: Option<f64>,
    pub system_cap: f64,
    pub job: &'a Properties,
    pub job_algorithm: Option<&'a Properties>,
    pub medium: &'a Properties,
}

/// `max(1, floor(fps / cap))`, or `None` when the cap is disabled.
pub fn interval_from_cap(fps: f64, cap: f64) -> Option<u32> {
    if cap.is_nan() || cap <= 0.0 || !fps.is_finite() {
        return None;
    }
    let raw = (fps / cap).floor().max(1.0);
    Some(raw.min(u32::MAX as f64) as u32)
}

/// Intrinsic frame rate of the medium, if it has a usable one.
pub fn media_fps(medium: &Medium) -> Option<f64> {
    let raw = medium.metadata(FPS_METADATA)?;
    match raw.trim().parse::<f64>() {
        Ok(fps) if fps.is_finite() && fps > 0.0 => Some(fps),
        Ok(fps) => {
            warn!(
                "medium #{} reports unusable {FPS_METADATA}={fps}; ignoring frame-rate caps",
                medium.id
            );
            None
        }
        Err(_) => {
            warn!(
                "medium #{} has non-numeric {FPS_METADATA} '{raw}'; ignoring frame-rate caps",
                medium.id
            );
            None
        }
    }
}

/// The sampling interval implied by the configured caps, if any.
pub fn resolve(inputs: &FrameIntervalInputs<'_>) -> Option<u32> {
    let fps = inputs.media_fps?;

    let mut computed = None;

    // A job-level interval only outranks the system cap; a job-level cap still applies.
    if !has_positive(inputs.job, FRAME_INTERVAL) {
        computed = interval_from_cap(fps, inputs.system_cap);
        if computed.is_some() {
            debug!(fps, cap = inputs.system_cap, ?computed, "system frame-rate cap applied");
        }
    }

    if let Some(cap) = number(inputs.job, FRAME_RATE_CAP) {
        if cap > 0.0 {
            computed = interval_from_cap(fps, cap);
            debug!(fps, cap, ?computed, "job frame-rate cap applied");
        }
    }

    if let Some(alg) = inputs.job_algorithm {
        if has_positive(alg, FRAME_INTERVAL) {
            if computed.is_some() {
                debug!("algorithm {FRAME_INTERVAL} override discards computed interval");
            }
            computed = None;
        } else if let Some(cap) = number(alg, FRAME_RATE_CAP) {
            if cap > 0.0 {
                computed = interval_from_cap(fps, cap);
                debug!(fps, cap, ?computed, "algorithm frame-rate cap applied");
            }
        }
    }

    if computed.is_some() && has_positive(inputs.medium, FRAME_INTERVAL) {
        debug!("medium {FRAME_INTERVAL} override discards computed interval");
        computed = None;
    }

    computed
}

fn has_positive(props: &Properties, key: &str) -> bool {
    number(props, key).is_some_and(|v| v > 0.0)
}

fn number(props: &Properties, key: &str) -> Option<f64> {
    let raw = props.get(key)?;
    match raw.trim().parse::<f64>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("ignoring non-numeric {key} value '{raw}'");
            None
        }
    }
}
