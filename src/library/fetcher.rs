//! Library fetching
//!
//! The loader never talks to the network directly; it goes through a
//! [`LibraryFetcher`] so tests and offline hosts can supply their own.

use crate::config::LibraryDefinition;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

/// Source of library bodies.
#[async_trait]
pub trait LibraryFetcher: Send + Sync {
    /// Fetch a library body. The error string becomes the load failure reason.
    async fn fetch(&self, library: &LibraryDefinition) -> std::result::Result<Bytes, String>;

    /// Human-readable name for logs
    fn name(&self) -> &str;
}

/// HTTP fetcher backed by reqwest
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with a per-request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("artifact-sandbox/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl LibraryFetcher for HttpFetcher {
    async fn fetch(&self, library: &LibraryDefinition) -> std::result::Result<Bytes, String> {
        let response = self
            .client
            .get(&library.url)
            .send()
            .await
            .map_err(|e| format!("request to {} failed: {}", library.url, e))?;

        let response = response
            .error_for_status()
            .map_err(|e| format!("bad status from {}: {}", library.url, e))?;

        response
            .bytes()
            .await
            .map_err(|e| format!("failed to read body from {}: {}", library.url, e))
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Fetcher that succeeds without network access.
///
/// Used by the CLI `render` command and by hosts that inject library URLs
/// into documents without prefetching them.
#[derive(Debug, Default)]
pub struct NoopFetcher;

#[async_trait]
impl LibraryFetcher for NoopFetcher {
    async fn fetch(&self, _library: &LibraryDefinition) -> std::result::Result<Bytes, String> {
        Ok(Bytes::new())
    }

    fn name(&self) -> &str {
        "noop"
    }
}
