use super::{DetectionContext, DetectionRequest, MediaSegmenter, WorkRange};
use crate::model::Medium;

/// One request for the whole image, unless a later stage has nothing to follow up on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageSegmenter;

impl MediaSegmenter for ImageSegmenter {
    fn create_work_units(&self, medium: &Medium, ctx: &DetectionContext) -> Vec<DetectionRequest> {
        if ctx.is_first_detection_stage || !ctx.previous_tracks.is_empty() {
            vec![DetectionRequest::new(medium, ctx, WorkRange::Image)]
        } else {
            Vec::new()
        }
    }
}
