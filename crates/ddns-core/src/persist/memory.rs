// # Memory Record Log
//
// In-memory implementation of RecordLog.
//
// ## Purpose
//
// Keeps the last flushed snapshot in process memory. Stores opened from
// the same log (clones share the snapshot) see what earlier stores
// flushed, which makes restarts cheap to simulate in tests.
//
// ## Crash Behavior
//
// - All records are lost when the process exits
// - No recovery possible (state is in-memory only)

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::Error;
use crate::record::ResourceRecord;
use crate::traits::record_log::{RecordLog, RecordStream};

/// In-memory record log
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordLog {
    lines: Arc<Mutex<Option<Vec<String>>>>,
}

impl MemoryRecordLog {
    /// Create an empty log (nothing has been flushed yet)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log that already holds the given lines
    ///
    /// Lines are taken as-is; malformed ones are skipped on load.
    pub fn with_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: Arc::new(Mutex::new(Some(lines.into_iter().map(Into::into).collect()))),
        }
    }

    /// The last flushed snapshot, `None` if absent or removed
    pub fn snapshot(&self) -> Option<Vec<String>> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl RecordLog for MemoryRecordLog {
    async fn load(&self) -> Result<RecordStream, Error> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        for line in self.snapshot().unwrap_or_default() {
            match line.parse::<ResourceRecord>() {
                Ok(record) => {
                    // Receiver is alive: it is returned below
                    let _ = tx.send(record);
                }
                Err(e) => tracing::warn!("Skipping malformed record: {}", e),
            }
        }

        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    async fn flush(&self, records: &[String]) -> Result<(), Error> {
        let mut guard = self
            .lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = if records.is_empty() {
            None
        } else {
            Some(records.to_vec())
        };
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
