// # Record Log Trait
//
// Defines the interface for persisting the record store.
//
// ## Purpose
//
// The store is materialized from the log once at startup and the full
// snapshot is written back after every mutation. The log never sees
// individual changes, only whole snapshots.
//
// ## Implementations
//
// - File-based: one presentation-form record per line (`persist::file`)
// - Memory: snapshot kept in process, for tests and ephemeral deployments

use async_trait::async_trait;
use std::pin::Pin;
use tokio_stream::Stream;

use crate::record::ResourceRecord;

/// Finite stream of records produced by [`RecordLog::load`]
pub type RecordStream = Pin<Box<dyn Stream<Item = ResourceRecord> + Send + 'static>>;

/// Trait for record store persistence
///
/// # Thread Safety
///
/// The store only calls `flush` while holding its lock, so implementations
/// never see two concurrent flushes from the same store.
#[async_trait]
pub trait RecordLog: Send + Sync {
    /// Stream the persisted records
    ///
    /// The stream is finite and consumed once at startup. Lines that do not
    /// parse as records are skipped, not reported. A missing log yields an
    /// empty stream.
    ///
    /// # Returns
    ///
    /// - `Ok(stream)`: Every readable record
    /// - `Err(Error::Persistence)`: The log exists but can not be read
    async fn load(&self) -> Result<RecordStream, crate::Error>;

    /// Replace the persisted snapshot
    ///
    /// # Parameters
    ///
    /// - `records`: Every stored record in presentation form
    ///
    /// An empty slice removes the persisted snapshot entirely.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Snapshot written
    /// - `Err(Error::Persistence)`: Write failed
    async fn flush(&self, records: &[String]) -> Result<(), crate::Error>;

    /// Short description for logs
    fn describe(&self) -> String;
}
