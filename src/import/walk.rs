// Directory enumeration module
// Walks the root depth-first in a stable order and classifies each entry

use std::fmt;
use std::fs::{self, FileType};
use std::io;
use std::path::{Path, PathBuf};

use jwalk::{Parallelism, WalkDir};

/// Filesystem entry types the importer distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Regular,
    Directory,
    Socket,
    CharDevice,
    BlockDevice,
    Fifo,
    Other,
}

impl EntryKind {
    /// Classify a file type as returned by a metadata call that follows symlinks
    pub fn from_file_type(file_type: &FileType) -> Self {
        if file_type.is_file() {
            return EntryKind::Regular;
        }
        if file_type.is_dir() {
            return EntryKind::Directory;
        }
        Self::special(file_type)
    }

    #[cfg(unix)]
    fn special(file_type: &FileType) -> Self {
        use std::os::unix::fs::FileTypeExt;

        if file_type.is_socket() {
            EntryKind::Socket
        } else if file_type.is_char_device() {
            EntryKind::CharDevice
        } else if file_type.is_block_device() {
            EntryKind::BlockDevice
        } else if file_type.is_fifo() {
            EntryKind::Fifo
        } else {
            EntryKind::Other
        }
    }

    #[cfg(not(unix))]
    fn special(_file_type: &FileType) -> Self {
        EntryKind::Other
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntryKind::Regular => "regular file",
            EntryKind::Directory => "directory",
            EntryKind::Socket => "socket",
            EntryKind::CharDevice => "character device",
            EntryKind::BlockDevice => "block device",
            EntryKind::Fifo => "named pipe",
            EntryKind::Other => "special file",
        };
        f.write_str(name)
    }
}

/// Why an entry was not hashed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Directory,
    /// Gone between enumeration and processing (or a dangling symlink)
    Vanished,
    Unsupported(EntryKind),
    Excluded,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Directory => f.write_str("directory"),
            SkipReason::Vanished => f.write_str("vanished before processing"),
            SkipReason::Unsupported(kind) => write!(f, "unsupported entry type ({kind})"),
            SkipReason::Excluded => f.write_str("excluded"),
        }
    }
}

/// Result of the eligibility filter for one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    Skip(SkipReason),
}

/// Decide whether `path` should be hashed, looking at it as it is now.
/// Symlinks are followed: a link to a regular file is eligible.
pub fn check_eligibility(path: &Path) -> io::Result<Eligibility> {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok(Eligibility::Skip(SkipReason::Vanished))
        }
        Err(e) => return Err(e),
    };

    Ok(match EntryKind::from_file_type(&metadata.file_type()) {
        EntryKind::Regular => Eligibility::Eligible,
        EntryKind::Directory => Eligibility::Skip(SkipReason::Directory),
        other => Eligibility::Skip(SkipReason::Unsupported(other)),
    })
}

/// Sequential, sorted, depth-unbounded walker over one root
pub struct Walker {
    root: PathBuf,
    exclude: Option<PathBuf>,
}

impl Walker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            exclude: None,
        }
    }

    /// Leave one file out of the walk (compared by canonical path)
    pub fn with_exclude(mut self, exclude: Option<&Path>) -> Self {
        self.exclude = exclude.and_then(|p| p.canonicalize().ok());
        self
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        match &self.exclude {
            Some(excluded) => path
                .canonicalize()
                .map(|canonical| &canonical == excluded)
                .unwrap_or(false),
            None => false,
        }
    }

    /// Every entry below the root, in walk order. The root itself is not yielded.
    /// Unreadable directories are logged and their contents skipped.
    pub fn entries(&self) -> impl Iterator<Item = PathBuf> + '_ {
        WalkDir::new(&self.root)
            .parallelism(Parallelism::Serial)
            .sort(true)
            .skip_hidden(false)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry_result| match entry_result {
                Ok(entry) if entry.depth == 0 => None,
                Ok(entry) => Some(entry.path()),
                Err(e) => {
                    tracing::warn!("error walking directory: {}", e);
                    None
                }
            })
    }
}
