//! Outer loop: collections, then index files, then records.
//!
//! The active type set is threaded through every file so a budget used up in
//! one file stays closed for the rest of the run. Whatever ends the run, no
//! worker is left in flight when [`Harvester::run`] returns.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::index::{ParseOutcome, RecordStreamParser};
use crate::index_source::IndexSource;
use crate::mime::ActiveMimeSet;
use crate::quota::{MimeQuotaRegistry, QuotaUsage};
use crate::stats::{HarvestStats, HarvestStatsSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every content type reached its budget.
    Exhausted,
    /// Shutdown requested.
    Cancelled,
    /// No collections or index files left.
    Completed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Exhausted => write!(f, "all budgets exhausted"),
            StopReason::Cancelled => write!(f, "shutdown requested"),
            StopReason::Completed => write!(f, "no index files left"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HarvestSummary {
    pub stop_reason: StopReason,
    /// Types still under budget when the run stopped.
    pub remaining: Vec<String>,
    pub files_parsed: u64,
    pub quota: Vec<QuotaUsage>,
    pub stats: HarvestStatsSnapshot,
}

pub struct Harvester {
    source: Arc<dyn IndexSource>,
    parser: RecordStreamParser,
    registry: Arc<MimeQuotaRegistry>,
    stats: Arc<HarvestStats>,
    shutdown: CancellationToken,
}

impl Harvester {
    pub fn new(
        source: Arc<dyn IndexSource>,
        parser: RecordStreamParser,
        registry: Arc<MimeQuotaRegistry>,
        stats: Arc<HarvestStats>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            source,
            parser,
            registry,
            stats,
            shutdown,
        }
    }

    /// Processes collections until budgets run out, shutdown is requested or
    /// there is nothing left. Acquisition failures abort the run, after
    /// outstanding workers have finished.
    pub async fn run(&self, active: ActiveMimeSet) -> Result<HarvestSummary> {
        let mut files_parsed = 0;
        let result = self.visit_collections(active, &mut files_parsed).await;

        self.parser.dispatcher().drain().await;
        let (stop_reason, remaining) = result?;

        Ok(HarvestSummary {
            stop_reason,
            remaining: remaining.snapshot(),
            files_parsed,
            quota: self.registry.snapshot().await,
            stats: self.stats.snapshot(),
        })
    }

    async fn visit_collections(
        &self,
        mut active: ActiveMimeSet,
        files_parsed: &mut u64,
    ) -> Result<(StopReason, ActiveMimeSet)> {
        if MimeQuotaRegistry::is_exhausted(&active) {
            return Ok((StopReason::Exhausted, active));
        }

        let collections = self
            .source
            .list_collections()
            .await
            .context("Failed to list collections")?;

        for collection in collections {
            if self.shutdown.is_cancelled() {
                return Ok((StopReason::Cancelled, active));
            }

            let files = self
                .source
                .list_index_files(&collection)
                .await
                .with_context(|| format!("Failed to list index files of {}", collection))?;

            for file in files {
                if self.shutdown.is_cancelled() {
                    return Ok((StopReason::Cancelled, active));
                }

                let path = self
                    .source
                    .fetch_index(&collection, &file)
                    .await
                    .with_context(|| format!("Failed to acquire {}/{}", collection, file))?;

                info!("Parsing file: {}", path.display());
                let outcome = self.parser.parse_file(&path, active).await;
                remove_index(&path).await;
                *files_parsed += 1;

                match outcome? {
                    ParseOutcome::Finished { active: next, .. } => active = next,
                    ParseOutcome::Exhausted { .. } => {
                        return Ok((StopReason::Exhausted, ActiveMimeSet::default()))
                    }
                    ParseOutcome::Cancelled { active, .. } => {
                        return Ok((StopReason::Cancelled, active))
                    }
                }
            }
        }

        Ok((StopReason::Completed, active))
    }
}

async fn remove_index(path: &Path) {
    info!("Removing file: {}", path.display());
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!("Failed to remove {}: {}", path.display(), e);
    }
}
