//! Test doubles and common utilities for contract tests
//!
//! This module provides minimal test doubles for the core's seams: a
//! notifier that records what it was asked to send and a record log whose
//! flushes can be made to fail.

#![allow(dead_code)]

use ddns_core::error::{Error, Result};
use ddns_core::traits::{AddressChange, CallbackNotifier, RecordLog, RecordStream};
use ddns_core::{
    ApiKeyTable, CallbackConfig, ControlConfig, ControlPlane, MemoryRecordLog, Permission,
    RecordStore, ResourceRecord, StoreConfig,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const UPDATE_KEY: &str = "test-update-key";
pub const DELETE_KEY: &str = "test-delete-key";
pub const CALLBACK_KEY: &str = "test-callback-key";

/// A notifier that records every change it is asked to deliver
pub struct RecordingNotifier {
    /// Call counter for notify()
    call_count: Arc<AtomicUsize>,
    /// Changes received, in order
    changes: Arc<Mutex<Vec<AddressChange>>>,
    /// When set, notify() fails after recording
    fail: Arc<AtomicBool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            call_count: Arc::new(AtomicUsize::new(0)),
            changes: Arc::new(Mutex::new(Vec::new())),
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A notifier whose every delivery fails
    pub fn failing() -> Self {
        let notifier = Self::new();
        notifier.fail.store(true, Ordering::SeqCst);
        notifier
    }

    /// Get the number of times notify() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Get the changes received so far
    pub fn changes(&self) -> Vec<AddressChange> {
        self.changes.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CallbackNotifier for RecordingNotifier {
    async fn notify(&self, change: &AddressChange) -> Result<()> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.changes.lock().unwrap().push(change.clone());

        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::callback("Callback failed with status code: 503 Service Unavailable"));
        }
        Ok(())
    }

    fn target(&self) -> &str {
        "recording"
    }
}

/// A record log that delegates to memory but can be switched to fail
#[derive(Clone)]
pub struct FlakyRecordLog {
    inner: MemoryRecordLog,
    fail: Arc<AtomicBool>,
    flush_count: Arc<AtomicUsize>,
}

impl FlakyRecordLog {
    pub fn new() -> Self {
        Self {
            inner: MemoryRecordLog::new(),
            fail: Arc::new(AtomicBool::new(false)),
            flush_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Get the number of times flush() was called
    pub fn flush_count(&self) -> usize {
        self.flush_count.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Option<Vec<String>> {
        self.inner.snapshot()
    }
}

#[async_trait::async_trait]
impl RecordLog for FlakyRecordLog {
    async fn load(&self) -> Result<RecordStream> {
        self.inner.load().await
    }

    async fn flush(&self, records: &[String]) -> Result<()> {
        self.flush_count.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::persistence("disk full"));
        }
        self.inner.flush(records).await
    }

    fn describe(&self) -> String {
        "flaky".to_string()
    }
}

/// Helper to build an address record
pub fn address(name: &str, ip: &str) -> ResourceRecord {
    ResourceRecord::address_record(name, ip.parse().unwrap()).unwrap()
}

/// Helper to create the API key table used across tests
pub fn test_keys() -> ApiKeyTable {
    ApiKeyTable::new()
        .with_key(UPDATE_KEY, Permission::Update)
        .unwrap()
        .with_key(DELETE_KEY, Permission::Delete)
        .unwrap()
}

/// Helper to open a store over a fresh memory log
pub async fn memory_store() -> Arc<RecordStore> {
    Arc::new(RecordStore::open(Box::new(MemoryRecordLog::new()), StoreConfig::default()).await.unwrap())
}

/// Helper to create a control plane, optionally with callbacks
pub async fn control_plane(notifier: Option<Arc<RecordingNotifier>>) -> ControlPlane {
    let store = memory_store().await;
    let mut config = ControlConfig::new(test_keys());

    if notifier.is_some() {
        config = config.with_callback(CallbackConfig::new(
            "https://hooks.example.com/ddns",
            CALLBACK_KEY,
        ));
    }

    let plane = ControlPlane::new(store, config).expect("control plane construction succeeds");
    match notifier {
        Some(notifier) => plane.with_notifier(notifier),
        None => plane,
    }
}
