use crate::model::{AlgorithmDefinition, Job, Track};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A job plus the collaborator state the CLI feeds to the splitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobFile {
    pub job: Job,
    #[serde(default)]
    pub algorithms: Vec<AlgorithmDefinition>,
    /// Results of earlier stages.
    #[serde(default)]
    pub tracks: Vec<Track>,
}

impl JobFile {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading job file: {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing job JSON: {}", path.display()))
    }
}
