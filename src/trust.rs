//! URL trust gate.
//!
//! Decides whether a crawled URL may be fetched at all: it must be
//! well-formed, use TLS, name a host by domain rather than by IP literal, and
//! that domain must end in one of the allowed suffixes.

use thiserror::Error;
use url::{Host, Url};

/// Host suffixes trusted when the configuration doesn't provide any.
pub const DEFAULT_ALLOWED_SUFFIXES: &[&str] =
    &[".edu", ".com", ".gov", ".gov.uk", ".mil", ".bank", ".airforce"];

/// Why a URL was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrustRejection {
    #[error("malformed URL: {0}")]
    Malformed(String),

    #[error("URL is not using HTTPS: {0}")]
    InsecureScheme(String),

    #[error("URL host is an IP address: {0}")]
    NumericHost(String),

    #[error("unsupported domain suffix: {0}")]
    DisallowedSuffix(String),
}

/// Transport and domain policy applied to every candidate URL.
#[derive(Debug, Clone)]
pub struct TrustPolicy {
    allowed_suffixes: Vec<String>,
    allow_plaintext: bool,
}

impl TrustPolicy {
    pub fn new<I, S>(allowed_suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_suffixes: allowed_suffixes
                .into_iter()
                .map(|s| s.into().to_ascii_lowercase())
                .collect(),
            allow_plaintext: false,
        }
    }

    /// Accept `http` as well as `https`. Only meant for loopback test servers.
    pub fn allow_plaintext(mut self) -> Self {
        self.allow_plaintext = true;
        self
    }

    pub fn allowed_suffixes(&self) -> &[String] {
        &self.allowed_suffixes
    }

    pub fn check(&self, raw: &str) -> Result<(), TrustRejection> {
        let url = Url::parse(raw).map_err(|e| TrustRejection::Malformed(format!("{raw} ({e})")))?;

        match url.scheme() {
            "https" => {}
            "http" if self.allow_plaintext => {}
            _ => return Err(TrustRejection::InsecureScheme(raw.to_string())),
        }

        let hostname = match url.host() {
            None => return Err(TrustRejection::Malformed(raw.to_string())),
            Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => {
                return Err(TrustRejection::NumericHost(raw.to_string()))
            }
            Some(Host::Domain(domain)) => domain.to_ascii_lowercase(),
        };

        if self
            .allowed_suffixes
            .iter()
            .any(|suffix| hostname.ends_with(suffix.as_str()))
        {
            Ok(())
        } else {
            Err(TrustRejection::DisallowedSuffix(hostname))
        }
    }

    pub fn is_trusted(&self, raw: &str) -> bool {
        self.check(raw).is_ok()
    }
}

impl Default for TrustPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_SUFFIXES.iter().copied())
    }
}
