//! In-process sink. Backs `--dry-run` and the test suite.

use std::collections::BTreeMap;

use super::{resolve_action, InsertAction, InsertResult, RecordSink, SessionConfig};
use crate::error::{ImportError, Result};
use crate::record::FileRecord;

/// A record as held by the sink, with the session attributes applied.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub record: FileRecord,
    pub source: String,
    pub published: bool,
}

/// Keeps records in memory, keyed by SHA-1.
#[derive(Debug)]
pub struct MemorySink {
    session: SessionConfig,
    records: BTreeMap<String, StoredRecord>,
    /// Every insert call in order, including skipped and replaced ones
    history: Vec<(FileRecord, InsertResult)>,
}

impl MemorySink {
    pub fn new(session: SessionConfig) -> Self {
        Self {
            session,
            records: BTreeMap::new(),
            history: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, sha1: &str) -> Option<&StoredRecord> {
        self.records.get(sha1)
    }

    pub fn records(&self) -> impl Iterator<Item = &StoredRecord> {
        self.records.values()
    }

    pub fn history(&self) -> &[(FileRecord, InsertResult)] {
        &self.history
    }
}

impl RecordSink for MemorySink {
    fn version(&self) -> String {
        format!("memory sink {}", env!("CARGO_PKG_VERSION"))
    }

    fn session(&self) -> &SessionConfig {
        &self.session
    }

    fn insert(&mut self, record: &FileRecord) -> Result<InsertResult> {
        let key = record
            .primary_key()
            .ok_or_else(|| ImportError::SinkRejected {
                key: record.file_name().unwrap_or("<unnamed>").to_string(),
                reason: "record has no SHA-1".to_string(),
            })?
            .to_string();

        let action = resolve_action(self.session.policy, self.records.contains_key(&key));
        match action {
            InsertAction::SkippedExisting => {}
            InsertAction::Updated => {
                if let Some(stored) = self.records.get_mut(&key) {
                    stored.record.merge(record);
                    stored.source.clone_from(&self.session.source);
                    stored.published |= self.session.publish;
                }
            }
            InsertAction::Inserted | InsertAction::Replaced => {
                self.records.insert(
                    key.clone(),
                    StoredRecord {
                        record: record.clone(),
                        source: self.session.source.clone(),
                        published: self.session.publish,
                    },
                );
            }
        }

        let result = InsertResult { key, action };
        self.history.push((record.clone(), result.clone()));
        Ok(result)
    }
}
