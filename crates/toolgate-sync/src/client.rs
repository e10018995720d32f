//! Async HTTP client for fetching the remote policy bundle.

use reqwest::Client;
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::types::BundleDocument;

/// Fetches bundle documents from the remote policy endpoint.
pub struct BundleClient {
    http: Client,
}

impl BundleClient {
    /// Create a new bundle client.
    pub fn new() -> Result<Self> {
        let http = Client::builder().user_agent("toolgate-sync/0.1").build()?;
        Ok(Self { http })
    }

    /// Create a client with a custom HTTP client (for testing with mockito).
    pub fn with_http_client(http: Client) -> Self {
        Self { http }
    }

    /// GET the bundle document at `url`, authenticating with `auth_token`
    /// when present. Non-success statuses and schema violations are sync
    /// errors, never panics.
    pub async fn fetch(&self, url: &str, auth_token: Option<&str>) -> Result<BundleDocument> {
        debug!(url = %url, "fetching policy bundle");

        let mut request = self.http.get(url);
        if let Some(token) = auth_token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(SyncError::FetchError(format!(
                "bundle fetch returned status {}",
                resp.status()
            )));
        }

        let raw = resp.bytes().await?;
        let doc: BundleDocument = serde_json::from_slice(&raw)?;
        Ok(doc)
    }
}
