//! reqwest-backed fetcher.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::naming::derive_filename;
use super::{ContentFetcher, FetchError, FetchOutcome};
use crate::mime::{is_image, MimeExtensionMap};
use crate::moderation::{ContentModerator, ModerationPolicy};
use crate::quota::{bytes_to_megabytes, MimeQuotaRegistry};
use crate::stats::HarvestStats;
use crate::trust::TrustPolicy;

/// Redirect hops followed before the last 3xx response is returned as is.
const MAX_REDIRECTS: usize = 10;

/// Static settings for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Root directory; payloads land in `<data_root>/<mime>/`.
    pub data_root: PathBuf,
    /// Per-request timeout for the GET.
    pub timeout_secs: u64,
    pub trust: TrustPolicy,
    pub extensions: Arc<MimeExtensionMap>,
}

/// Downloads admitted URLs, moderates images and writes accepted payloads.
pub struct HttpFetcher {
    client: reqwest::Client,
    settings: FetchSettings,
    registry: Arc<MimeQuotaRegistry>,
    stats: Arc<HarvestStats>,
    moderator: Option<Arc<dyn ContentModerator>>,
    moderation_policy: ModerationPolicy,
}

impl HttpFetcher {
    pub fn new(
        settings: FetchSettings,
        registry: Arc<MimeQuotaRegistry>,
        stats: Arc<HarvestStats>,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .redirect(redirect_policy(settings.trust.clone()))
            .build()
            .map_err(FetchError::Request)?;

        Ok(Self {
            client,
            settings,
            registry,
            stats,
            moderator: None,
            moderation_policy: ModerationPolicy::default(),
        })
    }

    /// Sends image payloads through `moderator` before they are written.
    pub fn with_moderator(
        mut self,
        moderator: Arc<dyn ContentModerator>,
        policy: ModerationPolicy,
    ) -> Self {
        self.moderator = Some(moderator);
        self.moderation_policy = policy;
        self
    }

    async fn try_fetch(&self, url: &str, mime: &str) -> Result<FetchOutcome, FetchError> {
        if let Err(rejection) = self.settings.trust.check(url) {
            return Ok(FetchOutcome::Untrusted(rejection));
        }

        info!("Downloading file: {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(FetchError::Request)?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        let file_name = derive_filename(url, mime, &self.settings.extensions);
        let dir = self.settings.data_root.join(mime);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| FetchError::Storage {
                path: dir.clone(),
                source,
            })?;

        let content_length = response.content_length();
        let body = response.bytes().await.map_err(FetchError::Body)?;

        if is_image(mime) {
            if let Some(moderator) = &self.moderator {
                match moderator.classify(body.clone()).await {
                    Ok(verdict) if self.moderation_policy.accepts(&verdict) => {
                        debug!(
                            "Image {} accepted: {} {:.2}%",
                            url, verdict.class, verdict.percentage
                        );
                    }
                    Ok(verdict) => {
                        return Ok(FetchOutcome::Discarded {
                            verdict: Some(verdict),
                        });
                    }
                    Err(e) => {
                        warn!("Moderation failed for {}: {}", url, e);
                        return Ok(FetchOutcome::Discarded { verdict: None });
                    }
                }
            }
        }

        let path = dir.join(file_name);
        tokio::fs::write(&path, &body)
            .await
            .map_err(|source| FetchError::Storage {
                path: path.clone(),
                source,
            })?;

        let megabytes = bytes_to_megabytes(charged_bytes(content_length, body.len()));
        self.registry.record(mime, megabytes).await;

        Ok(FetchOutcome::Stored { path, megabytes })
    }
}

/// Every redirect target goes through the same trust gate as the admitted URL.
fn redirect_policy(trust: TrustPolicy) -> reqwest::redirect::Policy {
    reqwest::redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() > MAX_REDIRECTS {
            warn!("Too many redirects, stopping at {}", attempt.url());
            attempt.stop()
        } else if trust.is_trusted(attempt.url().as_str()) {
            attempt.follow()
        } else {
            warn!("Refusing redirect to untrusted URL {}", attempt.url());
            attempt.stop()
        }
    })
}

/// Bytes charged to the quota: the declared length, or the body read when
/// the response carried none.
fn charged_bytes(content_length: Option<u64>, body_len: usize) -> u64 {
    content_length.unwrap_or(body_len as u64)
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch_and_persist(&self, url: String, mime: String) -> FetchOutcome {
        let outcome = self
            .try_fetch(&url, &mime)
            .await
            .unwrap_or_else(FetchOutcome::Failed);

        match &outcome {
            FetchOutcome::Stored { path, megabytes } => {
                self.stats.record_stored();
                info!(
                    "Stored {} as {} ({:.3} MB)",
                    url,
                    path.display(),
                    megabytes
                );
            }
            FetchOutcome::Untrusted(rejection) => {
                self.stats.record_untrusted();
                debug!("Skipping untrusted URL {}: {}", url, rejection);
            }
            FetchOutcome::Discarded { verdict } => {
                self.stats.record_discarded();
                match verdict {
                    Some(v) => info!(
                        "Discarded image {}: {} {:.2}%",
                        url, v.class, v.percentage
                    ),
                    None => info!("Discarded image {}: no verdict", url),
                }
            }
            FetchOutcome::Failed(e) => {
                self.stats.record_failed();
                warn!("Error downloading file {}: {}", url, e);
            }
        }

        outcome
    }
}
