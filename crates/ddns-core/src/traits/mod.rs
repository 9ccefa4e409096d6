//! Core traits for the DDNS authority
//!
//! This module defines the abstract interfaces at the edges of the core.
//!
//! - [`RecordLog`]: Snapshot persistence of the record store
//! - [`CallbackNotifier`]: Push address changes to an operator webhook

pub mod record_log;
pub mod notifier;

pub use record_log::{RecordLog, RecordStream};
pub use notifier::{AddressChange, CallbackNotifier};
