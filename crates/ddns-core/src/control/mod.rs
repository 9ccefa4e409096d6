//! Control plane
//!
//! Transport-independent semantics of the two control operations. The HTTP
//! layer authorizes, decodes the body and hands the request here; nothing
//! in this module knows about status codes.
//!
//! ## Update Flow
//!
//! ```text
//! UpdateRequest ─► resolve target address ─► build A/AAAA record
//!                  (explicit Ip or caller)          │
//!                                                   ▼
//!                                      RecordStore::upsert
//!                                                   │
//!                        address changed and callback enabled?
//!                                                   │ yes
//!                                                   ▼
//!                                     CallbackNotifier::notify
//! ```
//!
//! A callback failure is returned as the result of the update even though
//! the record is already committed; callers that render the error see the
//! callback text, and the committed record stays in place.

use serde::Deserialize;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{ControlConfig, Permission};
use crate::record::{RecordType, ResourceRecord};
use crate::store::{RecordStore, UpsertOutcome};
use crate::traits::{AddressChange, CallbackNotifier};
use crate::{Error, Result};

/// Body of an update request
///
/// ```json
/// {"Domain":"a.example.com","Ip":"1.2.3.4"}
/// ```
///
/// An absent or empty `Ip` means "use the caller's address".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UpdateRequest {
    #[serde(rename = "Domain", alias = "domain", default)]
    pub domain: String,

    #[serde(rename = "Ip", alias = "ip", alias = "IP", default)]
    pub ip: Option<String>,
}

impl UpdateRequest {
    pub fn new(domain: impl Into<String>, ip: Option<&str>) -> Self {
        Self {
            domain: domain.into(),
            ip: ip.map(str::to_string),
        }
    }
}

/// Body of a delete request
///
/// ```json
/// {"Domain":"a.example.com","Type":"AAAA"}
/// ```
///
/// `Type` defaults to `A`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DeleteRequest {
    #[serde(rename = "Domain", alias = "domain", default)]
    pub domain: String,

    #[serde(rename = "Type", alias = "type", default)]
    pub record_type: RecordType,
}

impl DeleteRequest {
    pub fn new(domain: impl Into<String>, record_type: RecordType) -> Self {
        Self {
            domain: domain.into(),
            record_type,
        }
    }
}

/// What an update did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    /// The record now stored
    pub record: ResourceRecord,
    /// What the store reported
    pub outcome: UpsertOutcome,
    /// Whether a callback was delivered
    pub notified: bool,
}

/// Control plane over a shared [`RecordStore`]
pub struct ControlPlane {
    store: Arc<RecordStore>,
    config: ControlConfig,
    notifier: Option<Arc<dyn CallbackNotifier>>,
}

impl ControlPlane {
    /// Create a control plane
    ///
    /// Callbacks stay disabled until a notifier is attached with
    /// [`with_notifier`](Self::with_notifier) and `config.callback` is set.
    pub fn new(store: Arc<RecordStore>, config: ControlConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            store,
            config,
            notifier: None,
        })
    }

    /// Attach the notifier used for address-change callbacks
    pub fn with_notifier(mut self, notifier: Arc<dyn CallbackNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    /// True when an address change will trigger a callback
    pub fn callbacks_enabled(&self) -> bool {
        self.config.callback.is_some() && self.notifier.is_some()
    }

    /// Check an API key against the permission an operation requires
    pub fn authorize(&self, api_key: Option<&str>, required: Permission) -> Result<()> {
        self.config.api_keys.authorize(api_key, required).inspect_err(|e| {
            debug!("Refused {} request: {}", required, e);
        })
    }

    /// Point the request's domain at its address
    ///
    /// # Parameters
    ///
    /// - `request`: Domain and optional explicit address
    /// - `caller`: Observed address of the requesting peer, used when the
    ///   request carries no address
    pub async fn update(&self, request: &UpdateRequest, caller: IpAddr) -> Result<UpdateReport> {
        let target = resolve_target(request.ip.as_deref(), caller)?;
        let record = ResourceRecord::address_record(&request.domain, target)?;

        let outcome = self.store.upsert(record.clone()).await?;

        let notified = if outcome.changed() {
            self.notify_change(&record, &outcome).await?
        } else {
            false
        };

        Ok(UpdateReport {
            record,
            outcome,
            notified,
        })
    }

    /// Remove the request's record
    pub async fn delete(&self, request: &DeleteRequest) -> Result<()> {
        self.store
            .delete(&request.domain, request.record_type.code())
            .await
    }

    async fn notify_change(&self, record: &ResourceRecord, outcome: &UpsertOutcome) -> Result<bool> {
        let (Some(callback), Some(notifier)) = (&self.config.callback, &self.notifier) else {
            return Ok(false);
        };

        let change = AddressChange::new(
            callback.api_key.clone(),
            outcome.previous_address(),
            record.address(),
        );

        match notifier.notify(&change).await {
            Ok(()) => {
                info!(
                    "Callback delivered to {} for {}: '{}' -> '{}'",
                    notifier.target(),
                    record.name(),
                    change.old_ip,
                    change.new_ip
                );
                Ok(true)
            }
            Err(e) => {
                warn!(
                    "Record {} committed but callback to {} failed: {}",
                    record.name(),
                    notifier.target(),
                    e
                );
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for ControlPlane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlPlane")
            .field("store", &self.store)
            .field("config", &self.config)
            .field("callbacks_enabled", &self.callbacks_enabled())
            .finish()
    }
}

/// Address an update should bind
///
/// IPv4-mapped IPv6 callers (dual-stack sockets) are reported as IPv4.
fn resolve_target(explicit: Option<&str>, caller: IpAddr) -> Result<IpAddr> {
    match explicit.map(str::trim).filter(|ip| !ip.is_empty()) {
        Some(ip) => ip
            .parse::<IpAddr>()
            .map_err(|_| Error::invalid_address(ip.to_string())),
        None => Ok(caller.to_canonical()),
    }
}
