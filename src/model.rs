use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Flat key/value property map. Ordered so resolved maps serialize deterministically.
pub type Properties = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Detection,
    Markup,
    Undefined,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Detection => "DETECTION",
            ActionType::Markup => "MARKUP",
            ActionType::Undefined => "UNDEFINED",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaType {
    Image,
    Video,
    Audio,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    pub algorithm: String,
    #[serde(default)]
    pub properties: Properties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    pub action_type: ActionType,
    #[serde(default)]
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub name: String,
    #[serde(default)]
    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDefinition {
    pub name: String,
    pub default_value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmDefinition {
    pub name: String,
    #[serde(default = "default_action_type")]
    pub action_type: ActionType,
    #[serde(default)]
    pub properties: Vec<PropertyDefinition>,
}

fn default_action_type() -> ActionType {
    ActionType::Detection
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Medium {
    pub id: u64,
    #[serde(default)]
    pub uri: String,
    pub media_type: MediaType,
    #[serde(default)]
    pub failed: bool,
    #[serde(default)]
    pub metadata: Properties,
    /// Medium-specific overrides; the highest precedence layer.
    #[serde(default)]
    pub properties: Properties,
}

impl Medium {
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn add_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: u64,
    pub pipeline: Pipeline,
    #[serde(default)]
    pub current_stage: usize,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub media: Vec<Medium>,
    #[serde(default)]
    pub overridden_job_properties: Properties,
    /// Algorithm name -> overrides for that algorithm.
    #[serde(default)]
    pub overridden_algorithm_properties: BTreeMap<String, Properties>,
}

fn default_priority() -> u8 {
    4
}

impl Job {
    pub fn stage(&self, index: usize) -> Option<&Stage> {
        self.pipeline.stages.get(index)
    }
}

/// A prior stage's result for one medium.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub job_id: u64,
    pub medium_id: u64,
    pub stage_index: usize,
    #[serde(default)]
    pub action_index: usize,
    pub start_frame: u32,
    pub stop_frame: u32,
    #[serde(default)]
    pub start_time_ms: u64,
    #[serde(default)]
    pub stop_time_ms: u64,
    #[serde(default)]
    pub track_type: String,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub properties: Properties,
}

impl Ord for Track {
    fn cmp(&self, other: &Self) -> Ordering {
        self.start_frame
            .cmp(&other.start_frame)
            .then(self.stop_frame.cmp(&other.stop_frame))
            .then(self.start_time_ms.cmp(&other.start_time_ms))
            .then(self.stop_time_ms.cmp(&other.stop_time_ms))
            .then_with(|| self.track_type.cmp(&other.track_type))
            .then(self.confidence.total_cmp(&other.confidence))
            .then(self.job_id.cmp(&other.job_id))
            .then(self.medium_id.cmp(&other.medium_id))
            .then(self.stage_index.cmp(&other.stage_index))
            .then(self.action_index.cmp(&other.action_index))
            .then_with(|| self.properties.cmp(&other.properties))
    }
}

impl PartialOrd for Track {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Track {}
