//! Remote quote feed client.
//!
//! Thin JSON transport over `reqwest`: fetch the full remote batch for a sync
//! cycle, and push a single record outward for the manual-override path. A
//! fetch failure is reported whole; the engine skips the cycle rather than
//! reconciling a partial batch.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use tracing::{debug, info, instrument};

use crate::errors::RemoteError;
use crate::models::{QuoteRecord, RemoteQuote};

/// Asynchronous client for the remote quote endpoint.
#[derive(Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl RemoteClient {
    /// Create a client for `base_url` with the given request timeout and an
    /// optional bearer token.
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        token: Option<String>,
    ) -> Result<Self, RemoteError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("quotesync/0.1"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        info!(base_url = %base_url, "created RemoteClient");
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    /// Fetch the full remote quote batch.
    #[instrument(skip(self))]
    pub async fn fetch(&self) -> Result<Vec<RemoteQuote>, RemoteError> {
        let mut req = self.http.get(&self.base_url);
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        let resp = check_response(resp).await?;
        let items: Vec<RemoteQuote> = resp
            .json()
            .await
            .map_err(|e| RemoteError::ParseError(e.to_string()))?;
        debug!(count = items.len(), "fetched remote quotes");
        Ok(items)
    }

    /// Push a local record outward (manual-override path).
    ///
    /// The remote identifier travels in the body so the endpoint can address
    /// the record it already knows about.
    #[instrument(skip(self, record), fields(id = %record.id))]
    pub async fn push(&self, record: &QuoteRecord) -> Result<(), RemoteError> {
        let body = serde_json::json!({
            "remote_id": record.remote_id,
            "text": record.text,
            "category": record.category,
        });
        let mut req = self.http.post(&self.base_url).json(&body);
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        check_response(resp).await?;
        debug!("pushed local quote outward");
        Ok(())
    }
}

/// Turn a non-success status into [`RemoteError::ApiError`] with the body.
async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        let body = resp.text().await.unwrap_or_default();
        Err(RemoteError::ApiError {
            status: status.as_u16(),
            body,
        })
    }
}
