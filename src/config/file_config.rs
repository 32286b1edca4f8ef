use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub concurrency: Option<usize>,
    pub data_dir: Option<String>,
    pub language: Option<String>,
    pub skip_list: Option<String>,
    pub fetch_timeout_sec: Option<u64>,

    // Feature configs
    pub mime: Option<MimeConfig>,
    pub trust: Option<TrustConfig>,
    pub moderation: Option<ModerationConfig>,
    pub acquisition: Option<AcquisitionConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct MimeConfig {
    /// Content types to harvest, in priority order
    pub allowed: Option<Vec<String>>,
    /// Per-type budget in megabytes, merged over the built-in table
    pub limits_mb: Option<HashMap<String, f64>>,
    /// Per-type file extension, merged over the built-in table
    pub extensions: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct TrustConfig {
    pub allowed_suffixes: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ModerationConfig {
    pub enabled: Option<bool>,
    pub url: Option<String>,
    pub accepted_class: Option<String>,
    pub min_confidence: Option<f64>,
    pub timeout_sec: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub aws_bin: Option<String>,
    pub bucket_url: Option<String>,
    pub max_slow_down_retries: Option<u32>,
    pub slow_down_step_secs: Option<u64>,
    pub skip_index_files: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
