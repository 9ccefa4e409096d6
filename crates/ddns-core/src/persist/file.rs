// # File Record Log
//
// File-based implementation of RecordLog.
//
// ## File Format
//
// One record per line in DNS presentation form:
//
// ```text
// a.example.com.	30	IN	A	1.2.3.4
// b.example.com.	30	IN	AAAA	2001:db8::2
// ```
//
// ## Write Strategy
//
// - Every flush rewrites the full snapshot
// - Writes go to a `.tmp` sibling first, then rename over the real file
// - An empty snapshot deletes the file instead of leaving it empty
//
// ## Load Strategy
//
// - Missing file: empty store, not an error
// - File present but unreadable: `Error::Persistence`, so the store
//   never flushes over records it could not read
// - Blank or malformed lines (invalid UTF-8 included): skipped with a
//   warning, reading continues

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::Error;
use crate::record::ResourceRecord;
use crate::traits::record_log::{RecordLog, RecordStream};

/// Default file name, relative to the working directory
pub const DEFAULT_RECORD_FILE: &str = "ddns.dat";

/// File-backed record log
///
/// # Example
///
/// ```rust,no_run
/// use ddns_core::persist::FileRecordLog;
/// use ddns_core::record::ResourceRecord;
/// use ddns_core::store::RecordStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let log = FileRecordLog::new("/var/lib/ddns/ddns.dat");
///     let store = RecordStore::open(Box::new(log), Default::default()).await?;
///
///     let record = ResourceRecord::address_record("a.example.com", "1.2.3.4".parse()?)?;
///     store.upsert(record).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileRecordLog {
    path: PathBuf,
}

impl FileRecordLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    async fn remove(&self) -> Result<(), Error> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::debug!("Record file removed: {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::persistence(format!(
                "Failed to remove record file {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn write_snapshot(&self, records: &[String]) -> Result<(), Error> {
        let mut contents = records.join("\n");
        contents.push('\n');

        // Write to temporary file first
        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::persistence(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(contents.as_bytes()).await.map_err(|e| {
                Error::persistence(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.flush().await.map_err(|e| {
                Error::persistence(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::persistence(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!(
            "Record file written: {} ({} records)",
            self.path.display(),
            records.len()
        );
        Ok(())
    }
}

#[async_trait]
impl RecordLog for FileRecordLog {
    async fn load(&self) -> Result<RecordStream, Error> {
        let contents = match fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Record file does not exist: {}", self.path.display());
                return Ok(Box::pin(tokio_stream::empty()));
            }
            Err(e) => {
                return Err(Error::persistence(format!(
                    "Failed to read record file {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let mut records = Vec::new();
        for (index, raw) in contents.split(|byte| *byte == b'\n').enumerate() {
            let line_no = index + 1;

            // A line that is not UTF-8 is malformed like any other
            let line = match std::str::from_utf8(raw) {
                Ok(line) => line.trim_end_matches('\r'),
                Err(e) => {
                    tracing::warn!(
                        "Skipping malformed line {} of {}: {}",
                        line_no,
                        self.path.display(),
                        e
                    );
                    continue;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            match line.parse::<ResourceRecord>() {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(
                    "Skipping malformed line {} of {}: {}",
                    line_no,
                    self.path.display(),
                    e
                ),
            }
        }

        Ok(Box::pin(tokio_stream::iter(records)))
    }

    async fn flush(&self, records: &[String]) -> Result<(), Error> {
        if records.is_empty() {
            self.remove().await
        } else {
            self.write_snapshot(records).await
        }
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}
