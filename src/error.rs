use thiserror::Error;

/// Caller mistakes that abort a split. Everything else is logged and absorbed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SplitError {
    #[error("job {job_id} has no pipeline stages")]
    NoStages { job_id: u64 },

    #[error("job {job_id} current stage {current} is out of range ({stages} stages)")]
    StageOutOfRange {
        job_id: u64,
        current: usize,
        stages: usize,
    },

    #[error("job {job_id} stage '{stage}' action #{action_index} has no algorithm name")]
    MissingAlgorithm {
        job_id: u64,
        stage: String,
        action_index: usize,
    },
}
