use std::time::Duration;
use thiserror::Error;

/// Default time allowed for downloading a manifest.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur while downloading a manifest
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Unsupported update channel URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to start fetch runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Source of update manifest documents.
#[cfg_attr(test, mockall::automock)]
pub trait ManifestFetcher: Send + Sync {
    /// Retrieve the manifest at `url` as text.
    fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Fetches manifests over HTTP(S).
///
/// Each call drives the request on a short-lived current-thread runtime, so it can be
/// used from plain synchronous code. Do not call it from inside another tokio runtime.
#[derive(Debug, Clone)]
pub struct HttpManifestFetcher {
    client: reqwest::Client,
}

impl HttpManifestFetcher {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    async fn fetch_async(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

impl ManifestFetcher for HttpManifestFetcher {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        if !is_http_url(url) {
            return Err(FetchError::InvalidUrl(url.to_string()));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(FetchError::Runtime)?;

        tracing::debug!("Fetching update manifest from {}", url);
        let text = runtime.block_on(self.fetch_async(url))?;
        tracing::debug!("Fetched {} bytes from {}", text.len(), url);
        Ok(text)
    }
}

fn is_http_url(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
