//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{can_bind_localhost, local_url, FetchRig};
//!
//! #[tokio::test]
//! async fn test_store_pdf() {
//!     if !can_bind_localhost() {
//!         return;
//!     }
//!     let server = httpmock::MockServer::start_async().await;
//!     let rig = FetchRig::new(None);
//!     // mock `server`, then call rig.fetcher.fetch_and_persist(local_url(&server, "/a"), ...)
//! }
//! ```

mod fixtures;
mod source;

// Public API - this is what tests import
#[allow(unused_imports)]
pub use fixtures::{
    can_bind_localhost, cdx_line, local_url, loopback_trust, FetchRig, TEST_LIMITS,
};
#[allow(unused_imports)]
pub use source::StaticIndexSource;
