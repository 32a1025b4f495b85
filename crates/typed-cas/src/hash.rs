//! Key derivation: hash algorithms, accumulators and the content key type.
//!
//! The key of a record is the raw digest of the whole record, header and
//! content-type included, not just the body. An adversary looking for a
//! colliding payload must also match its type and length fields.

use serde::{Deserialize, Serialize};
use sha1::Digest;
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;
use thiserror::Error;

/// Digest used for key derivation, chosen once when a store is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// 160-bit SHA-1.
    #[default]
    Sha1,
    Sha256,
    Blake3,
}

impl HashAlgorithm {
    /// Digest length in bytes.
    pub fn output_size(&self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Blake3 => blake3::OUT_LEN,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Blake3 => "blake3",
        }
    }

    /// A fresh accumulator in its initial state.
    pub fn accumulator(&self) -> Accumulator {
        let inner = match self {
            HashAlgorithm::Sha1 => Inner::Sha1(sha1::Sha1::new()),
            HashAlgorithm::Sha256 => Inner::Sha256(sha2::Sha256::new()),
            HashAlgorithm::Blake3 => Inner::Blake3(Box::new(blake3::Hasher::new())),
        };
        Accumulator { inner }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha1" => Ok(HashAlgorithm::Sha1),
            "sha256" => Ok(HashAlgorithm::Sha256),
            "blake3" => Ok(HashAlgorithm::Blake3),
            _ => Err(KeyParseError::UnknownAlgorithm(s.to_string())),
        }
    }
}

enum Inner {
    Sha1(sha1::Sha1),
    Sha256(sha2::Sha256),
    Blake3(Box<blake3::Hasher>),
}

/// Stateful hashing context. Accepts bytes through [`io::Write`].
pub struct Accumulator {
    inner: Inner,
}

impl Accumulator {
    pub fn algorithm(&self) -> HashAlgorithm {
        match self.inner {
            Inner::Sha1(_) => HashAlgorithm::Sha1,
            Inner::Sha256(_) => HashAlgorithm::Sha256,
            Inner::Blake3(_) => HashAlgorithm::Blake3,
        }
    }

    /// Return the digest of everything written so far and reset to the initial state.
    pub fn finalize_reset(&mut self) -> Vec<u8> {
        match &mut self.inner {
            Inner::Sha1(h) => h.finalize_reset().to_vec(),
            Inner::Sha256(h) => h.finalize_reset().to_vec(),
            Inner::Blake3(h) => {
                let out = h.finalize().as_bytes().to_vec();
                h.reset();
                out
            }
        }
    }

    /// Discard everything written so far.
    pub fn reset(&mut self) {
        match &mut self.inner {
            Inner::Sha1(h) => Digest::reset(h),
            Inner::Sha256(h) => Digest::reset(h),
            Inner::Blake3(h) => {
                h.reset();
            }
        }
    }
}

impl Write for Accumulator {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.inner {
            Inner::Sha1(h) => Digest::update(h, buf),
            Inner::Sha256(h) => Digest::update(h, buf),
            Inner::Blake3(h) => {
                h.update(buf);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Debug for Accumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accumulator")
            .field("algorithm", &self.algorithm())
            .finish()
    }
}

/// Raw digest bytes addressing one record. Displayed and serialized as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentKey(Vec<u8>);

/// Errors that can occur when parsing keys or algorithm names.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyParseError {
    #[error("empty key")]
    Empty,

    #[error("invalid hex in key: {0}")]
    InvalidHex(String),

    #[error("unknown hash algorithm: {0}")]
    UnknownAlgorithm(String),
}

impl ContentKey {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Parse a hex-encoded key.
    pub fn from_hex(s: &str) -> Result<Self, KeyParseError> {
        if s.is_empty() {
            return Err(KeyParseError::Empty);
        }
        hex::decode(s)
            .map(Self)
            .map_err(|e| KeyParseError::InvalidHex(e.to_string()))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ContentKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for ContentKey {
    type Error = KeyParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl From<ContentKey> for String {
    fn from(key: ContentKey) -> Self {
        key.to_hex()
    }
}

impl AsRef<[u8]> for ContentKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
