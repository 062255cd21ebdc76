// Library module for hashlookup-importer
// Re-exports modules for use in the binary and integration tests

pub mod cli;
pub mod config;
pub mod error;
pub mod hash;
pub mod import;
pub mod record;
pub mod sink;

pub use config::{ConflictPolicy, ImportOptions, ParentMeta};
pub use error::ImportError;
pub use import::{FileOutcome, ImportSession, RunSummary};
pub use record::FileRecord;
pub use sink::{JsonLinesSink, MemorySink, RecordSink, SessionConfig};
