use crate::splitter::WorkUnitRequest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitReport {
    pub job_id: u64,
    pub stage_index: usize,
    pub stage_name: String,
    pub generated_at: String,
    pub config_hash: String,
    pub work_unit_count: usize,
    /// Work units per recipient queue.
    pub queues: BTreeMap<String, usize>,
    pub persisted_media: Vec<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub work_units: Vec<WorkUnitRequest>,
}

pub fn queue_summary(units: &[WorkUnitRequest]) -> BTreeMap<String, usize> {
    let mut queues = BTreeMap::new();
    for unit in units {
        *queues.entry(unit.recipient_queue.clone()).or_insert(0) += 1;
    }
    queues
}
