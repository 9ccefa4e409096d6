//! Configuration types for the DDNS authority
//!
//! This module defines the configuration handed to the core once at
//! startup. Values arrive already resolved (the daemon reads them from the
//! environment); the core only validates their shape.

use std::collections::HashMap;

use crate::{Error, Result};

/// What an API key is allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// Create or overwrite address records
    Update,
    /// Remove address records
    Delete,
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Permission::Update => f.write_str("update"),
            Permission::Delete => f.write_str("delete"),
        }
    }
}

/// Mapping from opaque API key to permission
///
/// Immutable once handed to the control plane. Empty keys are never
/// stored, so a request without a key can not match an unset key. Keys
/// only enter through [`grant`](Self::grant) and are never serialized.
#[derive(Clone, Default)]
pub struct ApiKeyTable {
    keys: HashMap<String, Permission>,
}

impl ApiKeyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `permission` to `key`
    ///
    /// Empty keys are ignored. A key already present keeps its first
    /// permission and the call fails.
    pub fn grant(&mut self, key: impl Into<String>, permission: Permission) -> Result<()> {
        let key = key.into();
        if key.is_empty() {
            return Ok(());
        }

        if let Some(existing) = self.keys.get(&key) {
            return Err(Error::config(format!(
                "API key already granted '{}', can not also grant '{}'",
                existing, permission
            )));
        }

        self.keys.insert(key, permission);
        Ok(())
    }

    /// Builder-style [`grant`](Self::grant)
    pub fn with_key(mut self, key: impl Into<String>, permission: Permission) -> Result<Self> {
        self.grant(key, permission)?;
        Ok(self)
    }

    /// Permission bound to `key`, if any
    pub fn permission(&self, key: &str) -> Option<Permission> {
        self.keys.get(key).copied()
    }

    /// Check that `key` is present and carries `required`
    pub fn authorize(&self, key: Option<&str>, required: Permission) -> Result<()> {
        let key = key.ok_or_else(|| Error::auth("missing API key"))?;

        match self.permission(key) {
            Some(granted) if granted == required => Ok(()),
            Some(granted) => Err(Error::auth(format!(
                "API key has '{}' permission, '{}' required",
                granted, required
            ))),
            None => Err(Error::auth("unknown API key")),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

// Keys are secrets; only permissions are shown
impl std::fmt::Debug for ApiKeyTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut permissions: Vec<String> = self.keys.values().map(|p| p.to_string()).collect();
        permissions.sort();
        f.debug_struct("ApiKeyTable")
            .field("keys", &"<REDACTED>")
            .field("permissions", &permissions)
            .finish()
    }
}

/// Webhook notified when an update changes an address
#[derive(Clone)]
pub struct CallbackConfig {
    /// URL receiving the JSON POST
    pub url: String,

    /// Key sent as `ApiKey` in the payload
    pub api_key: String,
}

impl CallbackConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(Error::config("Callback URL cannot be empty"));
        }

        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(Error::config(format!(
                "Callback URL must use HTTP or HTTPS scheme. Got: {}",
                self.url
            )));
        }

        Ok(())
    }
}

impl std::fmt::Debug for CallbackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackConfig")
            .field("url", &self.url)
            .field("api_key", &"<REDACTED>")
            .finish()
    }
}

/// Control plane configuration
#[derive(Debug, Clone, Default)]
pub struct ControlConfig {
    /// API keys and their permissions
    pub api_keys: ApiKeyTable,

    /// Address-change webhook; `None` disables callbacks
    pub callback: Option<CallbackConfig>,
}

impl ControlConfig {
    pub fn new(api_keys: ApiKeyTable) -> Self {
        Self {
            api_keys,
            callback: None,
        }
    }

    pub fn with_callback(mut self, callback: CallbackConfig) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(callback) = &self.callback {
            callback.validate()?;
        }

        if self.api_keys.is_empty() {
            tracing::warn!("No API keys configured; every control request will be refused");
        }

        Ok(())
    }
}

/// Record store policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreConfig {
    /// When true, a failed snapshot flush rolls back the mutation and is
    /// returned as an error. When false the mutation stands and the
    /// failure is only logged.
    pub durable: bool,
}

impl StoreConfig {
    pub fn durable() -> Self {
        Self { durable: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ApiKeyTable {
        ApiKeyTable::new()
            .with_key("upd-key", Permission::Update)
            .unwrap()
            .with_key("del-key", Permission::Delete)
            .unwrap()
    }

    #[test]
    fn test_authorize() {
        let keys = table();
        assert!(keys.authorize(Some("upd-key"), Permission::Update).is_ok());
        assert!(keys.authorize(Some("del-key"), Permission::Delete).is_ok());

        assert!(keys.authorize(Some("upd-key"), Permission::Delete).unwrap_err().is_authorization());
        assert!(keys.authorize(Some("nope"), Permission::Update).unwrap_err().is_authorization());
        assert!(keys.authorize(None, Permission::Update).unwrap_err().is_authorization());
    }

    #[test]
    fn test_empty_key_never_authorizes() {
        let keys = ApiKeyTable::new().with_key("", Permission::Update).unwrap();
        assert!(keys.is_empty());
        assert!(keys.authorize(Some(""), Permission::Update).is_err());
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let result = table().with_key("upd-key", Permission::Delete);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_debug_redacts_keys() {
        let rendered = format!("{:?}", table());
        assert!(!rendered.contains("upd-key"));
        assert!(!rendered.contains("del-key"));

        let callback = CallbackConfig::new("https://hooks.example.com/ip", "cb-secret");
        assert!(!format!("{:?}", callback).contains("cb-secret"));

        let config = ControlConfig::new(table()).with_callback(callback);
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("upd-key"));
        assert!(!rendered.contains("cb-secret"));
    }

    #[test]
    fn test_callback_validation() {
        assert!(CallbackConfig::new("https://example.com/callback", "").validate().is_ok());
        assert!(CallbackConfig::new("", "k").validate().is_err());
        assert!(CallbackConfig::new("ftp://example.com", "k").validate().is_err());

        let config = ControlConfig::new(table())
            .with_callback(CallbackConfig::new("example.com/callback", "k"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_store_config_defaults_to_best_effort() {
        assert!(!StoreConfig::default().durable);
        assert!(StoreConfig::durable().durable);
    }
}
