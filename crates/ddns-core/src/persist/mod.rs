// # Record Log Implementations
//
// This module provides implementations of the RecordLog trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::FileRecordLog;
pub use memory::MemoryRecordLog;
