//! Run-wide counters, reported in the final summary.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the parser and the fetch workers.
#[derive(Debug, Default)]
pub struct HarvestStats {
    admitted: AtomicU64,
    stored: AtomicU64,
    untrusted: AtomicU64,
    discarded: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`HarvestStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestStatsSnapshot {
    /// Records handed to a worker
    pub admitted: u64,
    /// Files written to disk
    pub stored: u64,
    /// URLs refused by the trust gate
    pub untrusted: u64,
    /// Payloads dropped by moderation, including when no verdict came back
    pub discarded: u64,
    /// Request, status, body or filesystem failures
    pub failed: u64,
}

impl HarvestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_admitted(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stored(&self) {
        self.stored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_untrusted(&self) {
        self.untrusted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HarvestStatsSnapshot {
        HarvestStatsSnapshot {
            admitted: self.admitted.load(Ordering::Relaxed),
            stored: self.stored.load(Ordering::Relaxed),
            untrusted: self.untrusted.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
