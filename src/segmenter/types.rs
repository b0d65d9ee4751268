use crate::model::{MediaType, Medium, Properties, Track};
use crate::properties::AlgorithmProperty;
use crate::segmenting_plan::SegmentingPlan;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Everything a segmenter needs to know about one action on one medium.
/// Built fresh for every pair and dropped once the requests exist.
#[derive(Debug, Clone)]
pub struct DetectionContext {
    pub job_id: u64,
    pub stage_index: usize,
    pub stage_name: String,
    pub action_index: usize,
    pub action_name: String,
    pub is_first_detection_stage: bool,
    pub algorithm_properties: Vec<AlgorithmProperty>,
    pub previous_tracks: BTreeSet<Track>,
    pub segmenting_plan: SegmentingPlan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkRange {
    Image,
    Video {
        start_frame: u32,
        stop_frame: u32,
        frame_interval: u32,
    },
    Audio {
        start_time_ms: u64,
        /// `None` runs to the end of the medium.
        stop_time_ms: Option<u64>,
    },
    Generic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionRequest {
    pub job_id: u64,
    pub medium_id: u64,
    pub medium_uri: String,
    pub media_type: MediaType,
    pub stage_index: usize,
    pub stage_name: String,
    pub action_index: usize,
    pub action_name: String,
    pub algorithm_properties: Vec<AlgorithmProperty>,
    pub media_metadata: Properties,
    pub range: WorkRange,
}

impl DetectionRequest {
    pub fn new(medium: &Medium, ctx: &DetectionContext, range: WorkRange) -> Self {
        Self {
            job_id: ctx.job_id,
            medium_id: medium.id,
            medium_uri: medium.uri.clone(),
            media_type: medium.media_type,
            stage_index: ctx.stage_index,
            stage_name: ctx.stage_name.clone(),
            action_index: ctx.action_index,
            action_name: ctx.action_name.clone(),
            algorithm_properties: ctx.algorithm_properties.clone(),
            media_metadata: medium.metadata.clone(),
            range,
        }
    }
}
