// Hash computation module
// Provides the hash algorithm registry and single-pass multi-algorithm file hashing

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use md5::{Digest as Md5Digest, Md5};
use serde::{Deserialize, Serialize};
use sha1::{Digest as Sha1Digest, Sha1};
use sha2::{Digest as Sha2Digest, Sha256, Sha512};

use super::fuzzy::{SsdeepWrapper, TlshWrapper};
use super::mime;
use crate::error::{ImportError, Result};

/// Read size shared by every active algorithm (64 KiB)
pub const BUF_SIZE: usize = 64 * 1024;

/// Hash algorithm tags understood by the hashlookup sink.
/// Declaration order is the order hashes appear in a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HashType {
    #[serde(rename = "MD5")]
    Md5,
    #[serde(rename = "SHA-1")]
    Sha1,
    #[serde(rename = "SHA-256")]
    Sha256,
    #[serde(rename = "SHA-512")]
    Sha512,
    #[serde(rename = "TLSH")]
    Tlsh,
    #[serde(rename = "SSDEEP")]
    Ssdeep,
}

impl HashType {
    /// Digests computed for every file, no matter the options
    pub const CRYPTOGRAPHIC: [HashType; 4] =
        [HashType::Md5, HashType::Sha1, HashType::Sha256, HashType::Sha512];

    /// Best-effort similarity digests
    pub const FUZZY: [HashType; 2] = [HashType::Tlsh, HashType::Ssdeep];

    pub fn tag(&self) -> &'static str {
        match self {
            HashType::Md5 => "MD5",
            HashType::Sha1 => "SHA-1",
            HashType::Sha256 => "SHA-256",
            HashType::Sha512 => "SHA-512",
            HashType::Tlsh => "TLSH",
            HashType::Ssdeep => "SSDEEP",
        }
    }

    /// The active set for a run: the cryptographic digests, plus fuzzy ones if enabled
    pub fn active_set(fuzzy: bool) -> Vec<HashType> {
        let mut set = Self::CRYPTOGRAPHIC.to_vec();
        if fuzzy {
            set.extend_from_slice(&Self::FUZZY);
        }
        set
    }
}

impl fmt::Display for HashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Result of finalizing one algorithm
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashOutcome {
    Present(String),
    /// The algorithm could not produce a digest for this input
    Absent,
}

impl HashOutcome {
    pub fn digest(&self) -> Option<&str> {
        match self {
            HashOutcome::Present(d) => Some(d),
            HashOutcome::Absent => None,
        }
    }
}

/// Trait for incremental hash contexts
pub trait Hasher {
    fn algorithm(&self) -> HashType;

    /// Feed the next chunk of input
    fn update(&mut self, data: &[u8]);

    /// Finalize the context
    fn finalize(self: Box<Self>) -> HashOutcome;
}

pub struct Md5Wrapper(Md5);

impl Hasher for Md5Wrapper {
    fn algorithm(&self) -> HashType {
        HashType::Md5
    }

    fn update(&mut self, data: &[u8]) {
        Md5Digest::update(&mut self.0, data);
    }

    fn finalize(self: Box<Self>) -> HashOutcome {
        HashOutcome::Present(bytes_to_upper_hex(&Md5Digest::finalize(self.0)))
    }
}

pub struct Sha1Wrapper(Sha1);

impl Hasher for Sha1Wrapper {
    fn algorithm(&self) -> HashType {
        HashType::Sha1
    }

    fn update(&mut self, data: &[u8]) {
        Sha1Digest::update(&mut self.0, data);
    }

    fn finalize(self: Box<Self>) -> HashOutcome {
        HashOutcome::Present(bytes_to_upper_hex(&Sha1Digest::finalize(self.0)))
    }
}

pub struct Sha256Wrapper(Sha256);

impl Hasher for Sha256Wrapper {
    fn algorithm(&self) -> HashType {
        HashType::Sha256
    }

    fn update(&mut self, data: &[u8]) {
        Sha2Digest::update(&mut self.0, data);
    }

    fn finalize(self: Box<Self>) -> HashOutcome {
        HashOutcome::Present(bytes_to_upper_hex(&Sha2Digest::finalize(self.0)))
    }
}

pub struct Sha512Wrapper(Sha512);

impl Hasher for Sha512Wrapper {
    fn algorithm(&self) -> HashType {
        HashType::Sha512
    }

    fn update(&mut self, data: &[u8]) {
        Sha2Digest::update(&mut self.0, data);
    }

    fn finalize(self: Box<Self>) -> HashOutcome {
        HashOutcome::Present(bytes_to_upper_hex(&Sha2Digest::finalize(self.0)))
    }
}

/// Registry for hash algorithms
pub struct HashRegistry;

impl HashRegistry {
    /// Get a fresh context for the specified algorithm
    pub fn get_hasher(algorithm: HashType) -> Box<dyn Hasher> {
        match algorithm {
            HashType::Md5 => Box::new(Md5Wrapper(Md5Digest::new())),
            HashType::Sha1 => Box::new(Sha1Wrapper(Sha1Digest::new())),
            HashType::Sha256 => Box::new(Sha256Wrapper(Sha2Digest::new())),
            HashType::Sha512 => Box::new(Sha512Wrapper(Sha2Digest::new())),
            HashType::Tlsh => Box::new(TlshWrapper::new()),
            HashType::Ssdeep => Box::new(SsdeepWrapper::new()),
        }
    }
}

/// Everything learned about one file in a single read pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    pub size: u64,
    pub hashes: Vec<(HashType, HashOutcome)>,
    pub mimetype: Option<String>,
}

impl FileDigest {
    pub fn get(&self, algorithm: HashType) -> Option<&str> {
        self.hashes
            .iter()
            .find(|(a, _)| *a == algorithm)
            .and_then(|(_, outcome)| outcome.digest())
    }
}

/// Hash computer with streaming I/O
pub struct HashComputer {
    buffer_size: usize,
    algorithms: Vec<HashType>,
    detect_mime: bool,
}

impl HashComputer {
    /// All six algorithms with content type detection and a 64 KiB buffer
    pub fn new() -> Self {
        Self {
            buffer_size: BUF_SIZE,
            algorithms: HashType::active_set(true),
            detect_mime: true,
        }
    }

    /// Cryptographic digests are always kept, whatever `algorithms` holds
    pub fn with_algorithms(mut self, algorithms: &[HashType]) -> Self {
        let mut set = HashType::CRYPTOGRAPHIC.to_vec();
        for a in algorithms {
            if !set.contains(a) {
                set.push(*a);
            }
        }
        set.sort();
        self.algorithms = set;
        self
    }

    pub fn with_mime_detection(mut self, detect_mime: bool) -> Self {
        self.detect_mime = detect_mime;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    pub fn algorithms(&self) -> &[HashType] {
        &self.algorithms
    }

    /// Hash a file in one pass. The handle is closed before returning.
    pub fn compute_file(&self, path: &Path) -> Result<FileDigest> {
        let file = File::open(path)
            .map_err(|e| ImportError::from_io_error(e, "opening", Some(path.to_path_buf())))?;
        let size = file
            .metadata()
            .map_err(|e| ImportError::from_io_error(e, "reading metadata", Some(path.to_path_buf())))?
            .len();

        let mut digest = self.compute_reader(file).map_err(|e| match e {
            ImportError::Io { source, operation, .. } => {
                ImportError::from_io_error(source, &operation, Some(path.to_path_buf()))
            }
            other => other,
        })?;
        digest.size = size;
        Ok(digest)
    }

    /// Hash any reader in one pass; `size` is the number of bytes read
    pub fn compute_reader<R: Read>(&self, mut reader: R) -> Result<FileDigest> {
        let mut hashers: Vec<Box<dyn Hasher>> = self
            .algorithms
            .iter()
            .map(|a| HashRegistry::get_hasher(*a))
            .collect();

        let mut buffer = vec![0u8; self.buffer_size];
        let mut header: Vec<u8> = Vec::new();
        let mut total = 0u64;

        loop {
            let bytes_read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ImportError::from_io_error(e, "reading", None)),
            };
            let chunk = &buffer[..bytes_read];

            if self.detect_mime && header.len() < mime::HEADER_LEN {
                let wanted = (mime::HEADER_LEN - header.len()).min(chunk.len());
                header.extend_from_slice(&chunk[..wanted]);
            }

            for hasher in hashers.iter_mut() {
                hasher.update(chunk);
            }
            total += bytes_read as u64;
        }

        let hashes = hashers
            .into_iter()
            .map(|h| (h.algorithm(), h.finalize()))
            .collect();

        Ok(FileDigest {
            size: total,
            hashes,
            mimetype: self.detect_mime.then(|| mime::detect(&header)),
        })
    }
}

impl Default for HashComputer {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert bytes to an uppercase hexadecimal string
pub fn bytes_to_upper_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}
