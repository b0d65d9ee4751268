use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub segmenting: Segmenting,
    #[serde(default)]
    pub frame_rate: FrameRate,
    #[serde(default)]
    pub routing: Routing,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub debug: Debug,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// A stable, normalization-friendly string for hashing.
    pub fn normalized_for_hash(&self) -> String {
        toml::to_string(self).unwrap_or_default()
    }
}

/// System-wide segmenting defaults, used when no property layer sets a value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segmenting {
    pub target_segment_length: u32,
    pub min_segment_length: u32,
    pub sampling_interval: u32,
    pub min_gap_between_segments: u32,
}
impl Default for Segmenting {
    fn default() -> Self {
        Self {
            target_segment_length: 200,
            min_segment_length: 20,
            sampling_interval: 1,
            min_gap_between_segments: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRate {
    /// System frame-rate cap; `<= 0` disables it.
    pub cap: f64,
}
impl Default for FrameRate {
    fn default() -> Self {
        Self { cap: -1.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Routing {
    pub queue_prefix: String,
    pub reply_to: String,
}
impl Default for Routing {
    fn default() -> Self {
        Self {
            queue_prefix: "".into(),
            reply_to: "MPF.COMPLETED_DETECTIONS".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub pretty: bool,
    pub include_work_units: bool,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            pretty: true,
            include_work_units: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debug {
    pub dump_effective_config: bool,
}
impl Default for Debug {
    fn default() -> Self {
        Self {
            dump_effective_config: false,
        }
    }
}
