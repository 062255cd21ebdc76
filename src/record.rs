//! The per-file record handed to a sink.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hash::{FileDigest, HashType};

pub const META_FILE_NAME: &str = "FileName";
pub const META_FILE_SIZE: &str = "FileSize";
pub const META_MIMETYPE: &str = "mimetype";

/// One annotation describing the parent artifact rather than the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentAnnotation {
    pub parent: String,
    pub key: String,
    pub value: String,
}

/// Hashes and metadata for one file, built in full before submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub hashes: BTreeMap<HashType, String>,
    pub meta: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parent_meta: Vec<ParentAnnotation>,
}

impl FileRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a record from a finished digest. Absent fuzzy hashes are left out.
    pub fn from_digest(file_name: &str, digest: &FileDigest) -> Self {
        let mut record = Self::new();
        for (algorithm, outcome) in &digest.hashes {
            if let Some(value) = outcome.digest() {
                record.add_hash(value, *algorithm);
            }
        }
        record.add_meta(META_FILE_NAME, file_name);
        record.add_meta(META_FILE_SIZE, digest.size);
        if let Some(mimetype) = &digest.mimetype {
            record.add_meta(META_MIMETYPE, mimetype.as_str());
        }
        record
    }

    pub fn add_hash(&mut self, value: impl Into<String>, hash_type: HashType) {
        self.hashes.insert(hash_type, value.into());
    }

    pub fn add_meta(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.meta.insert(key.into(), value.into());
    }

    pub fn add_parent(&mut self, value: impl Into<String>) {
        self.parent = Some(value.into());
    }

    pub fn add_parent_meta(
        &mut self,
        parent: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.parent_meta.push(ParentAnnotation {
            parent: parent.into(),
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn hash(&self, hash_type: HashType) -> Option<&str> {
        self.hashes.get(&hash_type).map(String::as_str)
    }

    /// The key sinks match existing records on (SHA-1).
    pub fn primary_key(&self) -> Option<&str> {
        self.hash(HashType::Sha1)
    }

    pub fn file_name(&self) -> Option<&str> {
        self.meta.get(META_FILE_NAME).and_then(Value::as_str)
    }

    pub fn file_size(&self) -> Option<u64> {
        self.meta.get(META_FILE_SIZE).and_then(Value::as_u64)
    }

    /// Fold another record for the same content into this one.
    pub fn merge(&mut self, other: &FileRecord) {
        for (k, v) in &other.hashes {
            self.hashes.insert(*k, v.clone());
        }
        for (k, v) in &other.meta {
            self.meta.insert(k.clone(), v.clone());
        }
        if other.parent.is_some() {
            self.parent.clone_from(&other.parent);
        }
        for annotation in &other.parent_meta {
            if !self.parent_meta.contains(annotation) {
                self.parent_meta.push(annotation.clone());
            }
        }
    }
}
