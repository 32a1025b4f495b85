//! Store configuration with environment variable and file-based loading.
//!
//! Environment variables:
//! - `TYPED_CAS_PATH`: Base path for the filesystem backend
//! - `TYPED_CAS_READONLY`: Set to "true" for read-only mode
//! - `TYPED_CAS_HASH`: Key derivation algorithm (`sha1`, `sha256`, `blake3`)
//!
//! Default path: `~/.typed-cas`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::hash::HashAlgorithm;
use crate::pool::DEFAULT_POOL_CAPACITY;

/// Configuration for a [`Store`](crate::Store) backed by [`FsKv`](crate::FsKv).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CasConfig {
    /// Digest used to derive keys. Fixed for the lifetime of the data:
    /// records written under one algorithm are not found under another.
    #[serde(default)]
    pub hash: HashAlgorithm,

    /// Idle hash accumulators kept for reuse.
    #[serde(default = "default_pool_capacity")]
    pub pool_capacity: usize,

    /// Base path for storage.
    /// Records stored in `{base_path}/objects/`, in-flight writes in `{base_path}/staging/`.
    #[serde(default = "default_cas_path")]
    pub base_path: PathBuf,

    /// Read-only mode - every put fails.
    #[serde(default)]
    pub read_only: bool,
}

fn default_pool_capacity() -> usize {
    DEFAULT_POOL_CAPACITY
}

impl Default for CasConfig {
    fn default() -> Self {
        Self {
            hash: HashAlgorithm::default(),
            pool_capacity: DEFAULT_POOL_CAPACITY,
            base_path: default_cas_path(),
            read_only: false,
        }
    }
}

/// Get the default storage path (~/.typed-cas).
fn default_cas_path() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".typed-cas"))
        .unwrap_or_else(|| PathBuf::from(".typed-cas"))
}

impl CasConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let base_path = env::var("TYPED_CAS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_cas_path());

        let read_only = env::var("TYPED_CAS_READONLY")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);

        let hash = match env::var("TYPED_CAS_HASH") {
            Ok(name) => name
                .parse::<HashAlgorithm>()
                .with_context(|| format!("invalid TYPED_CAS_HASH: {name}"))?,
            Err(_) => HashAlgorithm::default(),
        };

        Ok(Self {
            hash,
            pool_capacity: DEFAULT_POOL_CAPACITY,
            base_path,
            read_only,
        })
    }

    /// Load configuration from a TOML file, falling back to environment.
    ///
    /// The file should contain a `[cas]` section:
    /// ```toml
    /// [cas]
    /// hash = "sha1"
    /// base_path = "/var/lib/typed-cas"
    /// read_only = false
    /// ```
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        let table: toml::Table = contents
            .parse()
            .with_context(|| format!("failed to parse TOML: {}", path.display()))?;

        if let Some(cas_section) = table.get("cas") {
            let config: CasConfig = cas_section
                .clone()
                .try_into()
                .context("failed to parse [cas] section")?;
            Ok(config)
        } else {
            Self::from_env()
        }
    }

    /// Create a config with a specific base path.
    pub fn with_base_path(path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: path.into(),
            ..Self::default()
        }
    }

    /// Create a read-only config with a specific base path.
    pub fn read_only(path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: path.into(),
            read_only: true,
            ..Self::default()
        }
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.base_path.join("objects")
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.base_path.join("staging")
    }
}
