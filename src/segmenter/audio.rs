use super::ranges::{self, Span};
use super::{DetectionContext, DetectionRequest, MediaSegmenter, WorkRange};
use crate::model::Medium;
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudioSegmenter;

impl MediaSegmenter for AudioSegmenter {
    fn create_work_units(&self, medium: &Medium, ctx: &DetectionContext) -> Vec<DetectionRequest> {
        if ctx.is_first_detection_stage {
            return vec![DetectionRequest::new(
                medium,
                ctx,
                WorkRange::Audio {
                    start_time_ms: 0,
                    stop_time_ms: None,
                },
            )];
        }

        let spans = ctx
            .previous_tracks
            .iter()
            .filter_map(|t| {
                if t.stop_time_ms < t.start_time_ms {
                    warn!(
                        "skipping track on medium #{} with stop time {}ms before start time {}ms",
                        medium.id, t.stop_time_ms, t.start_time_ms
                    );
                    return None;
                }
                Some(Span::new(t.start_time_ms, t.stop_time_ms))
            })
            .collect();

        ranges::merge(spans, 0)
            .into_iter()
            .map(|span| {
                DetectionRequest::new(
                    medium,
                    ctx,
                    WorkRange::Audio {
                        start_time_ms: span.start,
                        stop_time_ms: Some(span.stop),
                    },
                )
            })
            .collect()
    }
}
