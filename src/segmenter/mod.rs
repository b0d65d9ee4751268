pub mod audio;
pub mod generic;
pub mod image;
pub mod ranges;
pub mod types;
pub mod video;

use crate::model::{MediaType, Medium};

pub use audio::AudioSegmenter;
pub use generic::GenericSegmenter;
pub use image::ImageSegmenter;
pub use types::{DetectionContext, DetectionRequest, WorkRange};
pub use video::VideoSegmenter;

/// Turns one medium plus its per-action context into work-unit requests.
pub trait MediaSegmenter {
    fn create_work_units(&self, medium: &Medium, ctx: &DetectionContext) -> Vec<DetectionRequest>;
}

/// Segmenter chosen purely by the medium's declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segmenter {
    Image(ImageSegmenter),
    Video(VideoSegmenter),
    Audio(AudioSegmenter),
    Generic(GenericSegmenter),
}

impl Segmenter {
    pub fn for_media_type(media_type: MediaType) -> Self {
        match media_type {
            MediaType::Image => Segmenter::Image(ImageSegmenter),
            MediaType::Video => Segmenter::Video(VideoSegmenter),
            MediaType::Audio => Segmenter::Audio(AudioSegmenter),
            MediaType::Unknown => Segmenter::Generic(GenericSegmenter),
        }
    }
}

impl MediaSegmenter for Segmenter {
    fn create_work_units(&self, medium: &Medium, ctx: &DetectionContext) -> Vec<DetectionRequest> {
        match self {
            Segmenter::Image(s) => s.create_work_units(medium, ctx),
            Segmenter::Video(s) => s.create_work_units(medium, ctx),
            Segmenter::Audio(s) => s.create_work_units(medium, ctx),
            Segmenter::Generic(s) => s.create_work_units(medium, ctx),
        }
    }
}
