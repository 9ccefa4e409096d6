// # ddns-core
//
// Core library for the DDNS authority.
//
// ## Architecture Overview
//
// This library holds every piece of record logic; the DNS and HTTP crates
// only translate their wire formats into calls on these types:
//
// - **key**: Storage key derivation (reversed labels + record type)
// - **record**: Address records and their presentation form
// - **RecordStore**: The lock-guarded mapping served to DNS and control
// - **RecordLog**: Trait for snapshot persistence (file and memory logs)
// - **CallbackNotifier**: Trait for address-change webhooks
// - **ControlPlane**: Update/delete semantics behind the control API
//
// ## Data Flow
//
// ```text
// control request ─► ControlPlane ─► RecordStore ─► RecordLog::flush
//                          │
//                          └─► CallbackNotifier (address changed)
//
// DNS query ─► RecordStore::lookup
// ```

pub mod config;
pub mod control;
pub mod error;
pub mod key;
pub mod persist;
pub mod record;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use config::{ApiKeyTable, CallbackConfig, ControlConfig, Permission, StoreConfig};
pub use control::{ControlPlane, DeleteRequest, UpdateReport, UpdateRequest};
pub use error::{Error, Result};
pub use persist::{FileRecordLog, MemoryRecordLog};
pub use record::{RecordData, RecordType, ResourceRecord};
pub use store::{RecordStore, UpsertOutcome};
pub use traits::{AddressChange, CallbackNotifier, RecordLog};
