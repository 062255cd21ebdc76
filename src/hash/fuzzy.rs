//! Fuzzy (similarity-preserving) hash contexts.
//!
//! TLSH needs at least 50 bytes with enough variation to produce a digest;
//! anything less finalizes to [`HashOutcome::Absent`]. SSDEEP always produces
//! a digest, even for empty input.

use fuzzyhash::FuzzyHash;
use tlsh2::TlshDefaultBuilder;

use super::hash::{HashOutcome, HashType, Hasher};

pub struct TlshWrapper(TlshDefaultBuilder);

impl TlshWrapper {
    pub fn new() -> Self {
        Self(TlshDefaultBuilder::new())
    }
}

impl Default for TlshWrapper {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for TlshWrapper {
    fn algorithm(&self) -> HashType {
        HashType::Tlsh
    }

    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finalize(self: Box<Self>) -> HashOutcome {
        match self.0.build() {
            Some(tlsh) => HashOutcome::Present(String::from_utf8_lossy(&tlsh.hash()).into_owned()),
            None => HashOutcome::Absent,
        }
    }
}

pub struct SsdeepWrapper(FuzzyHash);

impl SsdeepWrapper {
    pub fn new() -> Self {
        Self(FuzzyHash::default())
    }
}

impl Default for SsdeepWrapper {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for SsdeepWrapper {
    fn algorithm(&self) -> HashType {
        HashType::Ssdeep
    }

    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finalize(mut self: Box<Self>) -> HashOutcome {
        self.0.finalize();
        HashOutcome::Present(self.0.to_string())
    }
}
