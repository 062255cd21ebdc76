//! Import configuration.
//!
//! Options come from the command line, optionally layered over a TOML file.
//! Everything here is validated before the first file is opened.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{ImportError, Result};

/// Source label used when none is configured.
pub const DEFAULT_SOURCE: &str = "hashlookup-import";

/// Output file used by the JSON Lines sink when none is configured.
pub const DEFAULT_OUTPUT: &str = "hashlookup-import.jsonl";

/// What the sink does when a record with the same primary hash already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Delete the existing record and insert the new one (default).
    #[default]
    Replace,
    /// Merge the new hashes and metadata into the existing record.
    Update,
    /// Leave the existing record alone and skip the file.
    Skip,
}

impl ConflictPolicy {
    /// Build the policy from the two CLI switches.
    pub fn from_flags(update: bool, skip_existing: bool) -> Self {
        match (update, skip_existing) {
            (_, true) => Self::Skip,
            (true, false) => Self::Update,
            (false, false) => Self::Replace,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Replace => "delete and reinsert existing records",
            Self::Update => "update existing records",
            Self::Skip => "skip existing records",
        }
    }
}

/// A `key,value` annotation attached to the parent link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentMeta {
    pub key: String,
    pub value: String,
}

impl FromStr for ParentMeta {
    type Err = ImportError;

    fn from_str(entry: &str) -> Result<Self> {
        let (key, value) = entry
            .split_once(',')
            .ok_or_else(|| ImportError::InvalidParentMeta {
                entry: entry.to_string(),
                reason: "missing ',' separator".to_string(),
            })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ImportError::InvalidParentMeta {
                entry: entry.to_string(),
                reason: "empty key".to_string(),
            });
        }
        Ok(Self {
            key: key.to_string(),
            value: value.trim().to_string(),
        })
    }
}

/// Parse every `--parent-meta` entry, failing on the first malformed one.
pub fn parse_parent_meta<S: AsRef<str>>(entries: &[S]) -> Result<Vec<ParentMeta>> {
    entries.iter().map(|e| e.as_ref().parse()).collect()
}

/// Validate a parent SHA-1 and normalize it to uppercase.
pub fn normalize_parent_hash(value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.len() != 40 || !trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ImportError::InvalidParentHash {
            value: value.to_string(),
        });
    }
    Ok(trimmed.to_ascii_uppercase())
}

/// Values read from a `--config` TOML file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub source: Option<String>,
    pub update: Option<bool>,
    pub skip_exists: Option<bool>,
    pub publish: Option<bool>,
    pub parent: Option<String>,
    #[serde(default)]
    pub parent_meta: Vec<String>,
    pub output: Option<PathBuf>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| ImportError::InvalidConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml(path, &text)
    }

    pub fn from_toml(path: &Path, text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ImportError::InvalidConfigFile {
            path: path.to_path_buf(),
            reason: e.message().to_string(),
        })
    }
}

/// Fully validated options for one import run.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOptions {
    pub root: PathBuf,
    pub source: String,
    pub policy: ConflictPolicy,
    pub publish: bool,
    pub parent: Option<String>,
    pub parent_meta: Vec<ParentMeta>,
    pub verbose: bool,
    pub detect_mime: bool,
    pub fuzzy: bool,
    /// A file to leave out of the walk, typically the sink's own output.
    pub exclude: Option<PathBuf>,
}

impl ImportOptions {
    /// Options with defaults for everything but the root directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            source: DEFAULT_SOURCE.to_string(),
            policy: ConflictPolicy::default(),
            publish: true,
            parent: None,
            parent_meta: Vec::new(),
            verbose: false,
            detect_mime: true,
            fuzzy: true,
            exclude: None,
        }
    }

    pub fn with_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Link every record to a parent artifact, with optional annotations.
    pub fn with_parent(mut self, parent: &str, meta: Vec<ParentMeta>) -> Result<Self> {
        self.parent = Some(normalize_parent_hash(parent)?);
        self.parent_meta = meta;
        Ok(self)
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_exclude(mut self, exclude: Option<PathBuf>) -> Self {
        self.exclude = exclude;
        self
    }

    /// Check the root directory and parent settings.
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(ImportError::MissingRequiredArgument {
                argument: "--dir".to_string(),
            });
        }
        let metadata = fs::metadata(&self.root).map_err(|e| {
            ImportError::from_io_error(e, "opening directory", Some(self.root.clone()))
        })?;
        if !metadata.is_dir() {
            return Err(ImportError::NotADirectory {
                path: self.root.clone(),
            });
        }
        if !self.parent_meta.is_empty() && self.parent.is_none() {
            return Err(ImportError::ParentMetaWithoutParent);
        }
        Ok(())
    }
}
