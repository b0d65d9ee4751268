use super::{DetectionContext, DetectionRequest, MediaSegmenter, WorkRange};
use crate::model::Medium;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenericSegmenter;

impl MediaSegmenter for GenericSegmenter {
    fn create_work_units(&self, medium: &Medium, ctx: &DetectionContext) -> Vec<DetectionRequest> {
        if ctx.is_first_detection_stage || !ctx.previous_tracks.is_empty() {
            vec![DetectionRequest::new(medium, ctx, WorkRange::Generic)]
        } else {
            Vec::new()
        }
    }
}
