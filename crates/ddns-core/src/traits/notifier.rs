// # Callback Notifier Trait
//
// Defines the interface for telling a third party that a record's address
// changed.
//
// ## Implementations
//
// - Webhook (JSON POST): `ddns-control-http` crate
//
// ## Delivery
//
// Fire-once. Implementations must not retry; a failure is returned to the
// control plane exactly once.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Payload describing one address change
///
/// Serialized with the field names the webhook receivers expect:
///
/// ```json
/// {"ApiKey":"...","OldIP":"1.2.3.4","NewIP":"5.6.7.8"}
/// ```
///
/// `OldIP` is empty when the record did not exist before.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressChange {
    #[serde(rename = "ApiKey")]
    pub api_key: String,
    #[serde(rename = "OldIP")]
    pub old_ip: String,
    #[serde(rename = "NewIP")]
    pub new_ip: String,
}

impl AddressChange {
    pub fn new(api_key: impl Into<String>, old_ip: Option<IpAddr>, new_ip: IpAddr) -> Self {
        Self {
            api_key: api_key.into(),
            old_ip: old_ip.map(|ip| ip.to_string()).unwrap_or_default(),
            new_ip: new_ip.to_string(),
        }
    }
}

// The API key never shows up in logs
impl std::fmt::Debug for AddressChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressChange")
            .field("api_key", &"<REDACTED>")
            .field("old_ip", &self.old_ip)
            .field("new_ip", &self.new_ip)
            .finish()
    }
}

/// Trait for address-change notification
///
/// # Thread Safety
///
/// Implementations must be thread-safe; the control plane calls them from
/// whichever listener task handled the update.
#[async_trait]
pub trait CallbackNotifier: Send + Sync {
    /// Deliver one notification
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The endpoint answered with a 2xx status
    /// - `Err(Error::Callback)`: Transport failure or non-2xx status
    async fn notify(&self, change: &AddressChange) -> Result<(), crate::Error>;

    /// Human-readable target for logs (e.g. the webhook URL)
    fn target(&self) -> &str;
}
