mod file_config;

pub use file_config::{AcquisitionConfig, FileConfig, MimeConfig, ModerationConfig, TrustConfig};

use anyhow::{bail, Result};
use std::path::PathBuf;

use crate::index_source::{SlowDownRetryPolicy, DEFAULT_BUCKET_URL};
use crate::mime::{ActiveMimeSet, ContentTypeLimits, MimeExtensionMap, DEFAULT_ALLOWED_MIMES};
use crate::moderation::{
    ModerationPolicy, DEFAULT_ACCEPTED_CLASS, DEFAULT_MIN_CONFIDENCE, DEFAULT_MODERATION_URL,
};
use crate::trust::{TrustPolicy, DEFAULT_ALLOWED_SUFFIXES};

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_LANGUAGE: &str = "eng";
pub const DEFAULT_SKIP_LIST: &str = "indexes.txt";
pub const DEFAULT_FETCH_TIMEOUT_SEC: u64 = 60;
pub const DEFAULT_MODERATION_TIMEOUT_SEC: u64 = 30;

/// Content types to harvest and their per-type tables.
#[derive(Debug, Clone)]
pub struct MimeSettings {
    pub allowed: Vec<String>,
    pub limits: ContentTypeLimits,
    pub extensions: MimeExtensionMap,
}

impl MimeSettings {
    pub fn active_set(&self) -> ActiveMimeSet {
        ActiveMimeSet::new(self.allowed.iter().cloned())
    }
}

#[derive(Debug, Clone)]
pub struct TrustSettings {
    pub allowed_suffixes: Vec<String>,
}

impl TrustSettings {
    pub fn policy(&self) -> TrustPolicy {
        TrustPolicy::new(self.allowed_suffixes.iter().cloned())
    }
}

#[derive(Debug, Clone)]
pub struct ModerationSettings {
    pub enabled: bool,
    pub url: String,
    pub accepted_class: String,
    /// Percentage in `0..=100`
    pub min_confidence: f64,
    pub timeout_sec: u64,
}

impl ModerationSettings {
    pub fn policy(&self) -> ModerationPolicy {
        ModerationPolicy {
            accepted_class: self.accepted_class.clone(),
            min_confidence: self.min_confidence,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AcquisitionSettings {
    pub aws_bin: String,
    pub bucket_url: String,
    pub max_slow_down_retries: u32,
    pub slow_down_step_secs: u64,
    pub skip_index_files: usize,
}

impl AcquisitionSettings {
    pub fn retry_policy(&self) -> SlowDownRetryPolicy {
        SlowDownRetryPolicy::new(self.max_slow_down_retries, self.slow_down_step_secs)
    }
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        let retry = SlowDownRetryPolicy::default();
        Self {
            aws_bin: "aws".to_string(),
            bucket_url: DEFAULT_BUCKET_URL.to_string(),
            max_slow_down_retries: retry.max_retries,
            slow_down_step_secs: retry.step.as_secs(),
            skip_index_files: 0,
        }
    }
}

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub concurrency: Option<usize>,
    pub data_dir: Option<PathBuf>,
    pub language: Option<String>,
    pub skip_list: Option<PathBuf>,
    pub moderation_url: Option<String>,
    pub no_moderation: bool,
    pub fetch_timeout_sec: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub concurrency: usize,
    pub data_dir: PathBuf,
    pub language: String,
    pub skip_list: PathBuf,
    pub fetch_timeout_sec: u64,

    // Feature configs (with defaults)
    pub mime: MimeSettings,
    pub trust: TrustSettings,
    pub moderation: ModerationSettings,
    pub acquisition: AcquisitionSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let concurrency = file.concurrency.or(cli.concurrency).ok_or_else(|| {
            anyhow::anyhow!("concurrency must be given on the command line or in the config file")
        })?;
        if concurrency == 0 {
            bail!("concurrency must be at least 1");
        }

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .or_else(|| cli.data_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let language = file
            .language
            .or_else(|| cli.language.clone())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
        let skip_list = file
            .skip_list
            .map(PathBuf::from)
            .or_else(|| cli.skip_list.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SKIP_LIST));
        let fetch_timeout_sec = file
            .fetch_timeout_sec
            .or(cli.fetch_timeout_sec)
            .unwrap_or(DEFAULT_FETCH_TIMEOUT_SEC);
        if fetch_timeout_sec == 0 {
            bail!("fetch_timeout_sec must be at least 1");
        }

        // Mime tables - file entries are merged over the built-in ones
        let mime_file = file.mime.unwrap_or_default();
        let allowed = mime_file.allowed.unwrap_or_else(|| {
            DEFAULT_ALLOWED_MIMES
                .iter()
                .map(|m| m.to_string())
                .collect()
        });
        if allowed.is_empty() {
            bail!("At least one content type must be allowed");
        }
        let mut limits = ContentTypeLimits::default();
        if let Some(overrides) = mime_file.limits_mb {
            if let Some((mime, mb)) = overrides.iter().find(|(_, mb)| !mb.is_finite() || **mb < 0.0)
            {
                bail!("Invalid limit for {}: {}", mime, mb);
            }
            limits.merge(overrides);
        }
        if let Some(missing) = allowed.iter().find(|m| !limits.contains(m)) {
            bail!("No size limit configured for allowed content type {}", missing);
        }
        let mut extensions = MimeExtensionMap::default();
        if let Some(overrides) = mime_file.extensions {
            extensions.merge(overrides);
        }

        let trust_file = file.trust.unwrap_or_default();
        let allowed_suffixes = trust_file.allowed_suffixes.unwrap_or_else(|| {
            DEFAULT_ALLOWED_SUFFIXES
                .iter()
                .map(|s| s.to_string())
                .collect()
        });
        if allowed_suffixes.is_empty() {
            bail!("At least one trusted domain suffix must be configured");
        }

        let moderation_file = file.moderation.unwrap_or_default();
        let moderation = ModerationSettings {
            enabled: moderation_file.enabled.unwrap_or(!cli.no_moderation),
            url: moderation_file
                .url
                .or_else(|| cli.moderation_url.clone())
                .unwrap_or_else(|| DEFAULT_MODERATION_URL.to_string()),
            accepted_class: moderation_file
                .accepted_class
                .unwrap_or_else(|| DEFAULT_ACCEPTED_CLASS.to_string()),
            min_confidence: moderation_file
                .min_confidence
                .unwrap_or(DEFAULT_MIN_CONFIDENCE),
            timeout_sec: moderation_file
                .timeout_sec
                .unwrap_or(DEFAULT_MODERATION_TIMEOUT_SEC),
        };
        if !(0.0..=100.0).contains(&moderation.min_confidence) {
            bail!(
                "moderation.min_confidence must be between 0 and 100, got {}",
                moderation.min_confidence
            );
        }

        let acquisition_file = file.acquisition.unwrap_or_default();
        let acquisition_defaults = AcquisitionSettings::default();
        let acquisition = AcquisitionSettings {
            aws_bin: acquisition_file
                .aws_bin
                .unwrap_or(acquisition_defaults.aws_bin),
            bucket_url: acquisition_file
                .bucket_url
                .unwrap_or(acquisition_defaults.bucket_url),
            max_slow_down_retries: acquisition_file
                .max_slow_down_retries
                .unwrap_or(acquisition_defaults.max_slow_down_retries),
            slow_down_step_secs: acquisition_file
                .slow_down_step_secs
                .unwrap_or(acquisition_defaults.slow_down_step_secs),
            skip_index_files: acquisition_file
                .skip_index_files
                .unwrap_or(acquisition_defaults.skip_index_files),
        };

        Ok(Self {
            concurrency,
            data_dir,
            language,
            skip_list,
            fetch_timeout_sec,
            mime: MimeSettings {
                allowed,
                limits,
                extensions,
            },
            trust: TrustSettings { allowed_suffixes },
            moderation,
            acquisition,
        })
    }

    /// Directory index archives are copied to and decompressed in.
    pub fn staging_dir(&self) -> PathBuf {
        self.data_dir.join("indexes")
    }
}
