//! [`IndexSource`] backed by the `aws` command line tool.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use super::decompress::gunzip_in_place;
use super::retry::{retry_on_slow_down, SlowDownRetryPolicy};
use super::skip_list::SkipList;
use super::{AcquisitionError, IndexSource};

pub const DEFAULT_BUCKET_URL: &str = "s3://commoncrawl/cc-index/collections";

/// Text the CLI prints on stderr when the bucket throttles us.
pub const SLOW_DOWN_MARKER: &str = "An error occurred (SlowDown)";

#[derive(Debug, Clone)]
pub struct AwsCliSettings {
    /// Path or name of the `aws` executable.
    pub aws_bin: String,
    /// Prefix holding one directory per collection.
    pub bucket_url: String,
    /// Where archives are copied and decompressed.
    pub staging_dir: PathBuf,
    /// Leading index files of every collection to leave out.
    pub skip_index_files: usize,
    pub retry: SlowDownRetryPolicy,
}

impl AwsCliSettings {
    pub fn new(staging_dir: PathBuf) -> Self {
        Self {
            aws_bin: "aws".to_string(),
            bucket_url: DEFAULT_BUCKET_URL.to_string(),
            staging_dir,
            skip_index_files: 0,
            retry: SlowDownRetryPolicy::default(),
        }
    }
}

/// Collection ids from `aws s3 ls <bucket>/`, newest first.
///
/// Each line reads `PRE <collection>/`.
pub fn parse_collection_listing(output: &str, skip: &SkipList) -> Vec<String> {
    let mut collections: Vec<String> = output
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(|id| id.trim_end_matches('/'))
        .filter(|id| !id.is_empty() && !skip.contains(id))
        .map(str::to_string)
        .collect();
    collections.sort_unstable_by(|a, b| b.cmp(a));
    collections.dedup();
    collections
}

/// Index archive names from `aws s3 ls <collection>/indexes/`.
///
/// Each line reads `<date> <time> <size> <name>`. Only `cdx-*.gz` entries are
/// kept, in name order, minus the first `skip_files`.
pub fn parse_index_listing(output: &str, skip_files: usize) -> Vec<String> {
    let mut files: Vec<String> = output
        .lines()
        .filter_map(|line| line.split_whitespace().nth(3))
        .filter(|name| name.starts_with("cdx-") && name.ends_with(".gz"))
        .map(str::to_string)
        .collect();
    files.sort_unstable();
    files.into_iter().skip(skip_files).collect()
}

pub struct AwsCliIndexSource {
    settings: AwsCliSettings,
    skip_list: SkipList,
}

impl AwsCliIndexSource {
    pub fn new(settings: AwsCliSettings, skip_list: SkipList) -> Self {
        Self {
            settings,
            skip_list,
        }
    }

    fn bucket(&self) -> &str {
        self.settings.bucket_url.trim_end_matches('/')
    }

    async fn run_once(&self, args: &[String]) -> Result<String, AcquisitionError> {
        debug!("Running {} {}", self.settings.aws_bin, args.join(" "));
        let output = Command::new(&self.settings.aws_bin)
            .args(args)
            .output()
            .await
            .map_err(|source| AcquisitionError::Spawn {
                program: self.settings.aws_bin.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.contains(SLOW_DOWN_MARKER) {
            return Err(AcquisitionError::SlowDown(stderr));
        }
        Err(AcquisitionError::Command {
            command: format!("{} {}", self.settings.aws_bin, args.join(" ")),
            status: output.status,
            stderr,
        })
    }

    async fn run(&self, args: Vec<String>) -> Result<String, AcquisitionError> {
        retry_on_slow_down(&self.settings.retry, || self.run_once(&args)).await
    }
}

#[async_trait]
impl IndexSource for AwsCliIndexSource {
    async fn list_collections(&self) -> Result<Vec<String>, AcquisitionError> {
        let listing = self
            .run(vec![
                "s3".to_string(),
                "ls".to_string(),
                format!("{}/", self.bucket()),
            ])
            .await?;
        let collections = parse_collection_listing(&listing, &self.skip_list);
        info!("Found {} collections to process", collections.len());
        Ok(collections)
    }

    async fn list_index_files(&self, collection: &str) -> Result<Vec<String>, AcquisitionError> {
        let listing = self
            .run(vec![
                "s3".to_string(),
                "ls".to_string(),
                format!("{}/{}/indexes/", self.bucket(), collection),
            ])
            .await?;
        let files = parse_index_listing(&listing, self.settings.skip_index_files);
        info!("Collection {} has {} index files to process", collection, files.len());
        Ok(files)
    }

    async fn fetch_index(
        &self,
        collection: &str,
        file: &str,
    ) -> Result<PathBuf, AcquisitionError> {
        let staging = &self.settings.staging_dir;
        tokio::fs::create_dir_all(staging)
            .await
            .map_err(|source| AcquisitionError::Staging {
                path: staging.clone(),
                source,
            })?;

        let remote = format!("{}/{}/indexes/{}", self.bucket(), collection, file);
        info!("Downloading index file: {}", remote);
        self.run(vec![
            "s3".to_string(),
            "cp".to_string(),
            remote,
            format!("{}/", staging.display()),
        ])
        .await?;
        info!("Download successful.");

        let local = staging.join(file);
        if file.ends_with(".gz") {
            gunzip_in_place(&local).await
        } else {
            Ok(local)
        }
    }
}
