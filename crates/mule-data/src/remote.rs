//! # Remote Analysis Client
//!
//! Submits a transaction batch to a hosted analysis service that implements
//! the same contract as the local engine: the transactions go up as a CSV
//! `file` field in a multipart form posted to `/analyze`, and the response
//! body is an [`AnalysisResult`] JSON document.
//!
//! The client performs no retries. Callers decide whether to re-invoke or
//! fall back to local analysis.

use std::time::Duration;

use eyre::{eyre, Context, Result};
use reqwest::multipart::{Form, Part};
use tracing::{debug, info};

use crate::ingest::transactions_to_csv;
use crate::types::{AnalysisResult, Transaction};

/// Environment variable holding the analysis service base URL.
pub const REMOTE_URL_ENV: &str = "MULE_REMOTE_URL";

/// Request timeout for one analysis call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP client for a remote analysis service.
#[derive(Debug, Clone)]
pub struct RemoteAnalyzer {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteAnalyzer {
    /// Creates a client for the service rooted at `base_url`.
    ///
    /// # Errors
    /// Returns error if the URL is empty or the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(eyre!("remote analysis URL is empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .wrap_err("failed to build HTTP client")?;

        Ok(Self { client, base_url })
    }

    /// Creates a client from [`REMOTE_URL_ENV`], if set.
    pub fn from_env() -> Option<Result<Self>> {
        std::env::var(REMOTE_URL_ENV).ok().map(|url| Self::new(&url))
    }

    /// Full URL of the analysis endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}/analyze", self.base_url)
    }

    /// Posts the transactions to the service and decodes its result.
    ///
    /// # Errors
    /// Returns error on transport failure, a non-success status, or a body
    /// that is not a valid result document.
    #[tracing::instrument(skip_all, fields(endpoint = %self.endpoint(), transactions = transactions.len()))]
    pub async fn analyze(&self, transactions: &[Transaction]) -> Result<AnalysisResult> {
        let csv = transactions_to_csv(transactions);
        let part = Part::text(csv)
            .file_name("transactions.csv")
            .mime_str("text/csv")
            .wrap_err("failed to build multipart file part")?;
        let form = Form::new().part("file", part);

        debug!("posting transactions to remote analysis service");
        let response = self
            .client
            .post(self.endpoint())
            .multipart(form)
            .send()
            .await
            .wrap_err("remote analysis HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(eyre!(
                "remote analysis returned HTTP {}: {}",
                status.as_u16(),
                body
            ));
        }

        let body = response
            .text()
            .await
            .wrap_err("failed to read remote analysis response body")?;
        let result: AnalysisResult =
            serde_json::from_str(&body).wrap_err("failed to parse remote analysis JSON")?;

        info!(
            suspicious = result.suspicious_accounts.len(),
            rings = result.fraud_rings.len(),
            "remote analysis complete"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_strips_trailing_slash() {
        let remote = RemoteAnalyzer::new("https://analysis.example.com/").unwrap();
        assert_eq!(remote.endpoint(), "https://analysis.example.com/analyze");
    }

    #[test]
    fn from_env_reads_service_url() {
        std::env::set_var(REMOTE_URL_ENV, "http://localhost:8000/");
        let remote = RemoteAnalyzer::from_env().unwrap().unwrap();
        assert_eq!(remote.endpoint(), "http://localhost:8000/analyze");

        std::env::remove_var(REMOTE_URL_ENV);
        assert!(RemoteAnalyzer::from_env().is_none());
    }

    #[test]
    fn empty_url_rejected() {
        assert!(RemoteAnalyzer::new("   ").is_err());
    }
}
