//! HTTP client for the opportunity detection service.

use std::error::Error as StdError;
use std::time::Duration;

use common::{Error, OpportunitiesPayload};
use tracing::debug;

const OPPORTUNITIES_PATH: &str = "/opportunities";

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

fn format_reqwest_error(err: &reqwest::Error) -> String {
    // Keep chained causes so DNS/TLS/socket failures are visible.
    let mut message = err.to_string();
    let mut source = err.source();

    while let Some(cause) = source {
        let cause_msg = cause.to_string();
        if !cause_msg.is_empty() && !message.contains(&cause_msg) {
            message.push_str(": ");
            message.push_str(&cause_msg);
        }
        source = cause.source();
    }

    message
}

fn summarize_response_body(raw: &str) -> String {
    const MAX_CHARS: usize = 400;
    let compact = raw.replace(['\n', '\r'], " ");
    match compact.char_indices().nth(MAX_CHARS) {
        Some((cut, _)) => format!("{}...", &compact[..cut]),
        None => compact,
    }
}

/// Async client for `GET {base}/opportunities`.
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: reqwest::Client,
    base_url: String,
}

impl FeedClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(2)
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Http(format_reqwest_error(&e)))?;

        Ok(Self {
            client,
            base_url: normalize_base_url(base_url),
        })
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.base_url, OPPORTUNITIES_PATH)
    }

    /// Fetch the current opportunity list.
    pub async fn fetch(&self) -> Result<OpportunitiesPayload, Error> {
        let resp = self
            .client
            .get(self.url())
            .send()
            .await
            .map_err(|e| Error::Http(format_reqwest_error(&e)))?;

        let status_code = resp.status().as_u16();
        if status_code != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::FeedApi {
                status: status_code,
                message: summarize_response_body(&body),
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| Error::Http(format_reqwest_error(&e)))?;
        let payload = OpportunitiesPayload::from_json(&body)?;

        debug!(
            "Fetched {} raw opportunities from {}",
            payload.opportunities.len(),
            self.base_url
        );
        Ok(payload)
    }
}
