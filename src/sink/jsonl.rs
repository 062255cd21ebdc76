//! Append-only JSON Lines sink.
//!
//! Each insert writes one line: the record plus `action`, `source` and
//! `published`, flushed before `insert` returns. Opening an existing file
//! indexes the SHA-1 keys already in it, so the conflict policy applies
//! across runs.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use super::{resolve_action, InsertAction, InsertResult, RecordSink, SessionConfig};
use crate::error::{ImportError, Result};
use crate::hash::HashType;
use crate::record::FileRecord;

#[derive(Serialize)]
struct SinkEntry<'a> {
    action: InsertAction,
    source: &'a str,
    published: bool,
    #[serde(flatten)]
    record: &'a FileRecord,
}

pub struct JsonLinesSink<W: Write = BufWriter<File>> {
    session: SessionConfig,
    writer: W,
    path: Option<PathBuf>,
    known: HashSet<String>,
}

impl JsonLinesSink<BufWriter<File>> {
    /// Open `path` for appending, indexing any records it already holds.
    pub fn open(path: &Path, session: SessionConfig) -> Result<Self> {
        let known = if path.exists() {
            Self::index_existing(path)?
        } else {
            HashSet::new()
        };
        tracing::debug!(path = %path.display(), existing = known.len(), "opened JSON Lines sink");

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| ImportError::sink_io(e, &format!("opening {}", path.display())))?;

        Ok(Self {
            session,
            writer: BufWriter::new(file),
            path: Some(path.to_path_buf()),
            known,
        })
    }

    fn index_existing(path: &Path) -> Result<HashSet<String>> {
        let file = File::open(path)
            .map_err(|e| ImportError::sink_io(e, &format!("reading {}", path.display())))?;
        let mut known = HashSet::new();

        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line
                .map_err(|e| ImportError::sink_io(e, &format!("reading {}", path.display())))?;
            if line.trim().is_empty() {
                continue;
            }
            match key_of_line(&line) {
                Some(key) => {
                    known.insert(key);
                }
                None => {
                    tracing::warn!(
                        path = %path.display(),
                        line = index + 1,
                        "ignoring unreadable line in existing output"
                    );
                }
            }
        }
        Ok(known)
    }
}

impl<W: Write> JsonLinesSink<W> {
    /// Write to an arbitrary writer, starting with no known records.
    pub fn from_writer(writer: W, session: SessionConfig) -> Self {
        Self {
            session,
            writer,
            path: None,
            known: HashSet::new(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn known_records(&self) -> usize {
        self.known.len()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn version(&self) -> String {
        match &self.path {
            Some(path) => format!(
                "jsonl sink {} ({})",
                env!("CARGO_PKG_VERSION"),
                path.display()
            ),
            None => format!("jsonl sink {}", env!("CARGO_PKG_VERSION")),
        }
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

        let action = resolve_action(self.session.policy, self.known.contains(&key));
        if action != InsertAction::SkippedExisting {
            let entry = SinkEntry {
                action,
                source: &self.session.source,
                published: self.session.publish,
                record,
            };
            serde_json::to_writer(&mut self.writer, &entry)?;
            self.writer
                .write_all(b"\n")
                .and_then(|_| self.writer.flush())
                .map_err(|e| ImportError::sink_io(e, "writing record"))?;
            self.known.insert(key.clone());
        }

        Ok(InsertResult { key, action })
    }

    fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| ImportError::sink_io(e, "flushing output"))
    }
}

fn key_of_line(line: &str) -> Option<String> {
    let value: Value = serde_json::from_str(line).ok()?;
    value
        .get("hashes")?
        .get(HashType::Sha1.tag())?
        .as_str()
        .map(str::to_string)
}
