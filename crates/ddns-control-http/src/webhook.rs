// # Webhook Notifier
//
// CallbackNotifier that POSTs the address change as JSON:
//
// ```json
// {"ApiKey":"...","OldIP":"1.2.3.4","NewIP":"5.6.7.8"}
// ```
//
// Any 2xx status is a delivery. Everything else, transport failures
// included, is returned once as `Error::Callback`; there is no retry.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use ddns_core::traits::{AddressChange, CallbackNotifier};
use ddns_core::{CallbackConfig, Error, Result};

/// Default HTTP timeout for callback requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Webhook-backed [`CallbackNotifier`]
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// Create a notifier posting to `url`
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(url, DEFAULT_HTTP_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(url, client))
    }

    /// Create a notifier over a caller-built client
    pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }

    /// Create a notifier for a validated callback configuration
    pub fn from_config(config: &CallbackConfig) -> Result<Self> {
        config.validate()?;
        Self::new(config.url.clone())
    }
}

#[async_trait]
impl CallbackNotifier for WebhookNotifier {
    async fn notify(&self, change: &AddressChange) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(change)
            .send()
            .await
            .map_err(|e| Error::callback(format!("Callback request to {} failed: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::callback(format!(
                "Callback failed with status code: {}",
                status
            )));
        }

        debug!("Callback accepted by {} ({})", self.url, status);
        Ok(())
    }

    fn target(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_validates_url() {
        let ok = WebhookNotifier::from_config(&CallbackConfig::new("https://hooks.example.com/ip", "k"));
        assert_eq!(ok.unwrap().target(), "https://hooks.example.com/ip");

        let bad = WebhookNotifier::from_config(&CallbackConfig::new("hooks.example.com/ip", "k"));
        assert!(matches!(bad, Err(Error::Config(_))));
    }
}
