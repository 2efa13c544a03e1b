//! HTTP client for `POST /moderate`

use std::time::Duration;
use toxguard_core::{Error, ModerationRequest, ModerationResult, Result};

/// Environment variable holding the server's base URL
pub const MODERATION_URL_ENV: &str = "MODERATION_SERVICE_URL";

/// Request timeout used unless one is given explicitly
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for a toxguard server.
///
/// Without a base URL moderation is switched off and every text comes back
/// approved.
#[derive(Debug, Clone)]
pub struct ModerationClient {
    base_url: Option<String>,
    http: reqwest::Client,
}

impl ModerationClient {
    /// Create a client with the default timeout
    pub fn new(base_url: Option<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a client from `MODERATION_SERVICE_URL`; unset or empty disables moderation
    pub fn from_env() -> Result<Self> {
        Self::new(std::env::var(MODERATION_URL_ENV).ok())
    }

    pub fn with_timeout(base_url: Option<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { base_url, http })
    }

    /// Whether requests actually reach a server
    pub fn is_enabled(&self) -> bool {
        self.base_url.is_some()
    }

    /// Ask the server to moderate `text`
    pub async fn moderate(&self, text: &str) -> Result<ModerationResult> {
        let Some(base_url) = &self.base_url else {
            tracing::debug!("Moderation disabled, approving without a check");
            return Ok(ModerationResult::approved_unchecked());
        };

        let url = format!("{}/moderate", base_url);
        let response = self
            .http
            .post(&url)
            .json(&ModerationRequest::new(text))
            .send()
            .await
            .map_err(|e| Error::moderation_unavailable(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Moderation endpoint {} returned {}", url, status);
            return Err(Error::moderation_unavailable(format!(
                "{} returned {}",
                url, status
            )));
        }

        response
            .json::<ModerationResult>()
            .await
            .map_err(|e| Error::moderation_unavailable(format!("Invalid response from {}: {}", url, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_url_disables() {
        assert!(!ModerationClient::new(None).unwrap().is_enabled());
        assert!(!ModerationClient::new(Some("  ".to_string())).unwrap().is_enabled());
        assert!(ModerationClient::new(Some("http://localhost:8000/".to_string()))
            .unwrap()
            .is_enabled());
    }

    #[tokio::test]
    async fn test_disabled_client_approves() {
        let client = ModerationClient::new(None).unwrap();
        let result = client.moderate("anything at all").await.unwrap();

        assert!(result.is_approved);
        assert_eq!(result.toxicity_score, 0.0);
        assert!(result.details.is_empty());
    }
}
