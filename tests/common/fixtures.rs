use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::Arc;

use commoncrawl_harvester::fetch::{FetchSettings, HttpFetcher};
use commoncrawl_harvester::mime::{
    ContentTypeLimits, MimeExtensionMap, APPLICATION_PDF, IMAGE_JPEG, IMAGE_PNG,
};
use commoncrawl_harvester::moderation::{HttpModerationClient, ModerationPolicy};
use commoncrawl_harvester::quota::MimeQuotaRegistry;
use commoncrawl_harvester::stats::HarvestStats;
use commoncrawl_harvester::trust::TrustPolicy;
use httpmock::MockServer;
use tempfile::TempDir;

/// Budgets used by the integration tests, in megabytes.
pub const TEST_LIMITS: &[(&str, f64)] = &[(APPLICATION_PDF, 1.0), (IMAGE_JPEG, 10.0), (IMAGE_PNG, 10.0)];

/// Some sandboxes refuse to bind sockets; HTTP tests are skipped there.
pub fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

/// URL on the mock server, addressed by name so the trust gate sees a domain.
pub fn local_url(server: &MockServer, path: &str) -> String {
    format!("http://localhost:{}{}", server.port(), path)
}

/// Trusts plaintext `localhost` only.
pub fn loopback_trust() -> TrustPolicy {
    TrustPolicy::new(["localhost"]).allow_plaintext()
}

/// One CDX-JSON index line.
pub fn cdx_line(url: &str, mime: &str, status: &str, languages: &str) -> String {
    format!(
        r#"localhost)/ 20240301000000 {{"url": "{url}", "mime": "{mime}", "mime-detected": "{mime}", "status": "{status}", "languages": "{languages}", "length": "1000", "offset": "0", "filename": "crawl-data/x.warc.gz"}}"#
    )
}

/// An [`HttpFetcher`] writing into a temporary data root.
pub struct FetchRig {
    pub data_dir: TempDir,
    pub registry: Arc<MimeQuotaRegistry>,
    pub stats: Arc<HarvestStats>,
    pub fetcher: Arc<HttpFetcher>,
}

impl FetchRig {
    /// Moderation is enabled when `moderation_url` is given.
    pub fn new(moderation_url: Option<String>) -> Self {
        let data_dir = TempDir::new().unwrap();
        let limits: HashMap<String, f64> = TEST_LIMITS
            .iter()
            .map(|(mime, mb)| (mime.to_string(), *mb))
            .collect();
        let registry = Arc::new(MimeQuotaRegistry::new(Arc::new(ContentTypeLimits::new(
            limits,
        ))));
        let stats = Arc::new(HarvestStats::new());

        let mut fetcher = HttpFetcher::new(
            FetchSettings {
                data_root: data_dir.path().to_path_buf(),
                timeout_secs: 5,
                trust: loopback_trust(),
                extensions: Arc::new(MimeExtensionMap::default()),
            },
            registry.clone(),
            stats.clone(),
        )
        .unwrap();
        if let Some(url) = moderation_url {
            let moderator = HttpModerationClient::new(url, 5).unwrap();
            fetcher = fetcher.with_moderator(Arc::new(moderator), ModerationPolicy::default());
        }

        Self {
            data_dir,
            registry,
            stats,
            fetcher: Arc::new(fetcher),
        }
    }
}
