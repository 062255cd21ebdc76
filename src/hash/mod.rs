// Hashing module
// Single-pass cryptographic and fuzzy hashing plus content type detection

pub mod fuzzy;
pub mod hash;
pub mod mime;

pub use hash::{
    bytes_to_upper_hex, FileDigest, HashComputer, HashOutcome, HashRegistry, HashType, Hasher,
    BUF_SIZE,
};
