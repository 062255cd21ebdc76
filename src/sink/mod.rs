//! Record sinks.
//!
//! A sink receives complete [`FileRecord`]s, one `insert` call per file, and
//! applies the session's [`ConflictPolicy`] when a record with the same
//! primary hash already exists.

pub mod jsonl;
pub mod memory;

use std::fmt;

use serde::Serialize;

use crate::config::{ConflictPolicy, ImportOptions};
use crate::error::Result;
use crate::record::FileRecord;

pub use jsonl::JsonLinesSink;
pub use memory::MemorySink;

/// Settings a sink is constructed with; fixed for the whole session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub policy: ConflictPolicy,
    pub source: String,
    pub publish: bool,
}

impl SessionConfig {
    pub fn from_options(options: &ImportOptions) -> Self {
        Self {
            policy: options.policy,
            source: options.source.clone(),
            publish: options.publish,
        }
    }
}

/// What the sink did with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertAction {
    Inserted,
    Updated,
    Replaced,
    SkippedExisting,
}

impl InsertAction {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Updated => "updated existing record",
            Self::Replaced => "replaced existing record",
            Self::SkippedExisting => "skipped, record already exists",
        }
    }
}

/// Result of one insertion, used for verbose reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertResult {
    pub key: String,
    pub action: InsertAction,
}

impl fmt::Display for InsertResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.action.description())
    }
}

/// Destination for import records.
pub trait RecordSink {
    /// Informational version string, shown in the verbose banner.
    fn version(&self) -> String;

    fn session(&self) -> &SessionConfig;

    /// Submit one complete record.
    fn insert(&mut self, record: &FileRecord) -> Result<InsertResult>;

    /// Flush buffered output. Called once at the end of a run.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Decide the action for a record given whether its key already exists.
pub(crate) fn resolve_action(policy: ConflictPolicy, exists: bool) -> InsertAction {
    match (exists, policy) {
        (false, _) => InsertAction::Inserted,
        (true, ConflictPolicy::Skip) => InsertAction::SkippedExisting,
        (true, ConflictPolicy::Update) => InsertAction::Updated,
        (true, ConflictPolicy::Replace) => InsertAction::Replaced,
    }
}
