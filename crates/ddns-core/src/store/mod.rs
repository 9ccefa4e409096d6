//! Record store
//!
//! The single mutable mapping from storage key to serialized record that
//! both the DNS data plane and the control plane share.
//!
//! ## Locking
//!
//! One exclusive lock covers every operation, reads included. A DNS
//! lookup waits behind a control-plane mutation and vice versa. There is
//! no reader/writer split and no per-key locking; given low query and
//! mutation rates the simpler ordering is worth more than the throughput.
//!
//! ## Persistence
//!
//! Every upsert and delete flushes the full snapshot to the [`RecordLog`]
//! before the lock is released, so a mutation is complete only once the
//! write has returned. What a failed flush means depends on
//! [`StoreConfig::durable`]:
//!
//! - `false`: the failure is logged and the in-memory mutation stands
//! - `true`: the mutation is rolled back and the error is returned

use std::collections::BTreeMap;
use std::net::IpAddr;
use tokio::sync::Mutex;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::key::derive_key;
use crate::record::ResourceRecord;
use crate::traits::RecordLog;
use crate::{Error, Result};

/// Result of an upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No record existed for the key
    Created,
    /// A record with a different address was replaced
    Updated {
        /// The record that was replaced
        previous: ResourceRecord,
    },
    /// The stored record already had this address
    Unchanged,
}

impl UpsertOutcome {
    /// True when the served address differs from before the upsert
    pub fn changed(&self) -> bool {
        !matches!(self, UpsertOutcome::Unchanged)
    }

    /// Address served before the upsert, if one was served
    pub fn previous_address(&self) -> Option<IpAddr> {
        match self {
            UpsertOutcome::Updated { previous } => Some(previous.address()),
            _ => None,
        }
    }
}

/// The process-wide record store
///
/// Construct once at startup with [`RecordStore::open`] and share it
/// behind an `Arc` with every listener.
pub struct RecordStore {
    entries: Mutex<BTreeMap<String, String>>,
    log: Box<dyn RecordLog>,
    config: StoreConfig,
}

impl RecordStore {
    /// Materialize a store from `log`
    ///
    /// Consumes the log's record stream once. Records that fail key
    /// derivation are skipped; later lines win over earlier ones with the
    /// same key. A log that exists but can not be read fails the open, so
    /// the first flush never replaces records that were not loaded.
    pub async fn open(log: Box<dyn RecordLog>, config: StoreConfig) -> Result<Self> {
        let mut entries = BTreeMap::new();
        let mut records = log.load().await?;

        while let Some(record) = records.next().await {
            match record.key() {
                Ok(key) => {
                    entries.insert(key, record.to_string());
                }
                Err(e) => warn!("Skipping stored record {}: {}", record.name(), e),
            }
        }

        info!(
            "Record store loaded from {}: {} records (durable={})",
            log.describe(),
            entries.len(),
            config.durable
        );

        Ok(Self {
            entries: Mutex::new(entries),
            log,
            config,
        })
    }

    /// Look up the record for (name, type)
    ///
    /// # Returns
    ///
    /// - `Ok(Some(record))`: Record present
    /// - `Ok(None)`: No record, or the stored value is empty
    /// - `Err(Error::InvalidDomain)`: `name` is not a valid domain name
    /// - `Err(Error::InvalidRecord)`: Stored text no longer parses
    pub async fn lookup(&self, name: &str, rtype: u16) -> Result<Option<ResourceRecord>> {
        let entries = self.entries.lock().await;
        let key = derive_key(name, rtype)?;

        match entries.get(&key) {
            Some(value) if !value.is_empty() => Ok(Some(value.parse()?)),
            _ => {
                debug!("Record not found, key: {}", key);
                Ok(None)
            }
        }
    }

    /// Insert or overwrite the record for the record's (name, type)
    ///
    /// Reports what was there before so callers can tell a real address
    /// change from a re-assertion of the same address.
    pub async fn upsert(&self, record: ResourceRecord) -> Result<UpsertOutcome> {
        let mut entries = self.entries.lock().await;
        let key = record.key()?;

        let outcome = match entries
            .get(&key)
            .filter(|value| !value.is_empty())
            .and_then(|value| value.parse::<ResourceRecord>().ok())
        {
            None => UpsertOutcome::Created,
            Some(previous) if previous.address() == record.address() => UpsertOutcome::Unchanged,
            Some(previous) => UpsertOutcome::Updated { previous },
        };

        let replaced = entries.insert(key.clone(), record.to_string());

        if let Err(e) = self.flush_locked(&entries).await {
            if !self.config.durable {
                warn!("Record {} kept in memory but not persisted: {}", record.name(), e);
            } else {
                match replaced {
                    Some(old) => entries.insert(key, old),
                    None => entries.remove(&key),
                };
                return Err(e);
            }
        }

        info!(
            "Upsert record - {} {} {} ({})",
            record.name(),
            record.record_type(),
            record.address(),
            match &outcome {
                UpsertOutcome::Created => "created",
                UpsertOutcome::Updated { .. } => "updated",
                UpsertOutcome::Unchanged => "unchanged",
            }
        );

        Ok(outcome)
    }

    /// Remove the record for (name, type)
    ///
    /// Fails with [`Error::RecordNotFound`] and leaves the store untouched
    /// when no entry exists for the key.
    pub async fn delete(&self, name: &str, rtype: u16) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let key = derive_key(name, rtype)?;

        let Some(removed) = entries.remove(&key) else {
            return Err(Error::not_found(format!(
                "Delete record failed for domain: {}",
                name
            )));
        };

        if let Err(e) = self.flush_locked(&entries).await {
            if !self.config.durable {
                warn!("Deletion of {} not persisted: {}", name, e);
            } else {
                entries.insert(key, removed);
                return Err(e);
            }
        }

        info!("Delete record - {}", name);
        Ok(())
    }

    /// All stored (key, serialized record) pairs, ordered by key
    pub async fn entries(&self) -> Vec<(String, String)> {
        let entries = self.entries.lock().await;
        entries
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Number of stored entries
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub fn config(&self) -> StoreConfig {
        self.config
    }

    /// Write the snapshot; caller holds the lock
    async fn flush_locked(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let snapshot: Vec<String> = entries
            .values()
            .filter(|value| !value.is_empty())
            .cloned()
            .collect();

        self.log.flush(&snapshot).await.map_err(|e| match e {
            Error::Persistence(_) => e,
            other => Error::persistence(other.to_string()),
        })
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("log", &self.log.describe())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryRecordLog;
    use crate::record::RecordType;

    fn a_record(name: &str, ip: &str) -> ResourceRecord {
        ResourceRecord::address_record(name, ip.parse().unwrap()).unwrap()
    }

    async fn empty_store() -> RecordStore {
        RecordStore::open(Box::new(MemoryRecordLog::new()), StoreConfig::default()).await.unwrap()
    }

    #[tokio::test]
    async fn test_upsert_then_lookup() {
        let store = empty_store().await;
        let record = a_record("a.example.com", "1.2.3.4");

        assert_eq!(store.upsert(record.clone()).await.unwrap(), UpsertOutcome::Created);

        let found = store
            .lookup("a.example.com.", RecordType::A.code())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, record);
    }

    #[tokio::test]
    async fn test_upsert_reports_change() {
        let store = empty_store().await;
        store.upsert(a_record("a.example.com", "1.2.3.4")).await.unwrap();

        let same = store.upsert(a_record("a.example.com", "1.2.3.4")).await.unwrap();
        assert_eq!(same, UpsertOutcome::Unchanged);
        assert!(!same.changed());

        let moved = store.upsert(a_record("a.example.com", "5.6.7.8")).await.unwrap();
        assert!(moved.changed());
        assert_eq!(moved.previous_address(), Some("1.2.3.4".parse().unwrap()));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_a_and_aaaa_are_separate() {
        let store = empty_store().await;
        store.upsert(a_record("a.example.com", "1.2.3.4")).await.unwrap();
        store.upsert(a_record("a.example.com", "2001:db8::1")).await.unwrap();

        assert_eq!(store.len().await, 2);
        let v6 = store
            .lookup("a.example.com", RecordType::Aaaa.code())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(v6.address(), "2001:db8::1".parse::<IpAddr>().unwrap());
    }

    #[tokio::test]
    async fn test_lookup_invalid_and_absent() {
        let store = empty_store().await;
        assert!(matches!(
            store.lookup("bad name", 1).await,
            Err(Error::InvalidDomain(_))
        ));
        assert!(store.lookup("missing.example.com", 1).await.unwrap().is_none());
        // Unsupported types simply have no record
        assert!(store.lookup("missing.example.com", 15).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tombstone_reads_as_absent() {
        let store = empty_store().await;
        store
            .entries
            .lock()
            .await
            .insert("com.example.gone_1".to_string(), String::new());

        assert!(store.lookup("gone.example.com", 1).await.unwrap().is_none());

        // An upsert over a tombstone counts as a creation
        let outcome = store.upsert(a_record("gone.example.com", "1.1.1.1")).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Created);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = empty_store().await;
        store.upsert(a_record("a.example.com", "1.2.3.4")).await.unwrap();

        assert!(matches!(
            store.delete("b.example.com", 1).await,
            Err(Error::RecordNotFound(_))
        ));
        assert_eq!(store.len().await, 1);

        store.delete("a.example.com", 1).await.unwrap();
        assert!(store.lookup("a.example.com", 1).await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_every_mutation_flushes() {
        let log = MemoryRecordLog::new();
        let store = RecordStore::open(Box::new(log.clone()), StoreConfig::default()).await.unwrap();

        store.upsert(a_record("b.example.com", "2.2.2.2")).await.unwrap();
        store.upsert(a_record("a.example.com", "1.1.1.1")).await.unwrap();
        assert_eq!(
            log.snapshot().unwrap(),
            vec![
                "a.example.com.\t30\tIN\tA\t1.1.1.1".to_string(),
                "b.example.com.\t30\tIN\tA\t2.2.2.2".to_string(),
            ]
        );

        store.delete("a.example.com", 1).await.unwrap();
        store.delete("b.example.com", 1).await.unwrap();
        assert!(log.snapshot().is_none());
    }
}
