//! FsKv: filesystem-backed key-value storage with directory sharding.
//!
//! Layout:
//! ```text
//! {base_path}/
//! ├── objects/
//! │   ├── ab/
//! │   │   └── cde123...   # Committed record (remainder of hex key)
//! │   └── 12/
//! │       └── 3456789...
//! └── staging/
//!     └── 5f0c...-...     # In-flight write, random name
//! ```
//!
//! A sink streams into a staging file. Close flushes, fsyncs and renames it
//! into `objects/`, so a record is either fully present or absent. A sink
//! that saw a write error deletes its staging file instead.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::config::CasConfig;
use crate::kv::{Close, KvBackend, KvReader, KvWriter};

/// Upper bound on the write buffer; larger records stream through it.
const MAX_WRITE_BUFFER: usize = 64 * 1024;

/// Shard for keys with no remainder after the two-character prefix.
/// Never a hex pair, so it cannot clash with a regular shard.
const SHORT_KEY_DIR: &str = "_";

/// Filesystem [`KvBackend`].
#[derive(Debug, Clone)]
pub struct FsKv {
    config: CasConfig,
}

impl FsKv {
    /// Create a new FsKv with the given configuration.
    ///
    /// Creates the objects and staging directories if they don't exist
    /// (unless in read-only mode).
    pub fn new(config: CasConfig) -> Result<Self> {
        if !config.read_only {
            fs::create_dir_all(config.objects_dir())
                .context("failed to create CAS objects directory")?;
            fs::create_dir_all(config.staging_dir())
                .context("failed to create CAS staging directory")?;
        }

        Ok(Self { config })
    }

    pub fn at_path(path: impl Into<PathBuf>) -> Result<Self> {
        Self::new(CasConfig::with_base_path(path))
    }

    pub fn read_only_at(path: impl Into<PathBuf>) -> Result<Self> {
        Self::new(CasConfig::read_only(path))
    }

    pub fn config(&self) -> &CasConfig {
        &self.config
    }

    /// Get the path where a key would be stored.
    ///
    /// Keys too short to shard (0 or 1 bytes) live under `objects/_/`, with a
    /// `_` leading the leaf so the empty key still names a file.
    fn object_path(&self, key: &[u8]) -> PathBuf {
        let hex = hex::encode(key);
        if hex.len() <= 2 {
            return self
                .config
                .objects_dir()
                .join(SHORT_KEY_DIR)
                .join(format!("_{hex}"));
        }
        let (prefix, remainder) = hex.split_at(2);
        self.config.objects_dir().join(prefix).join(remainder)
    }

    /// Filesystem path of a committed record, if present.
    pub fn path(&self, key: &[u8]) -> Option<PathBuf> {
        let path = self.object_path(key);
        if path.exists() {
            Some(path)
        } else {
            None
        }
    }

    pub fn exists(&self, key: &[u8]) -> bool {
        self.object_path(key).exists()
    }
}

impl KvBackend for FsKv {
    fn put(&self, key: &[u8], size_hint: usize) -> Box<dyn KvWriter + '_> {
        let target = self.object_path(key);

        if self.config.read_only {
            return Box::new(FsWriter::refused(
                target,
                io::Error::new(io::ErrorKind::PermissionDenied, "CAS is in read-only mode"),
            ));
        }

        let staging = self.config.staging_dir().join(Uuid::new_v4().to_string());
        match File::create(&staging) {
            Ok(file) => Box::new(FsWriter {
                target,
                staging,
                file: Some(BufWriter::with_capacity(
                    size_hint.clamp(1, MAX_WRITE_BUFFER),
                    file,
                )),
                pending: None,
                failed: false,
            }),
            Err(e) => Box::new(FsWriter::refused(target, e)),
        }
    }

    fn get(&self, key: &[u8]) -> Box<dyn KvReader + '_> {
        match File::open(self.object_path(key)) {
            Ok(file) => Box::new(FsReader::Open(BufReader::new(file))),
            Err(e) => Box::new(FsReader::Missing(Some(e))),
        }
    }
}

struct FsWriter {
    target: PathBuf,
    staging: PathBuf,
    file: Option<BufWriter<File>>,
    /// Error from opening the sink, surfaced by the first write.
    pending: Option<io::Error>,
    failed: bool,
}

impl FsWriter {
    fn refused(target: PathBuf, err: io::Error) -> Self {
        Self {
            target,
            staging: PathBuf::new(),
            file: None,
            pending: Some(err),
            failed: false,
        }
    }

    fn discard(&mut self) {
        self.file = None;
        if self.staging.as_os_str().is_empty() {
            return;
        }
        if let Err(e) = fs::remove_file(&self.staging) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %self.staging.display(), error = %e, "failed to remove staging file");
            }
        }
    }
}

impl Write for FsWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(e) = self.pending.take() {
            self.failed = true;
            return Err(e);
        }
        if self.failed {
            return Err(io::Error::other("write after failed write"));
        }
        let Some(file) = self.file.as_mut() else {
            return Err(io::Error::other("staging file already closed"));
        };
        match file.write(buf) {
            Ok(n) => Ok(n),
            Err(e) => {
                self.failed = true;
                Err(e)
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl Close for FsWriter {
    fn close(&mut self) -> io::Result<()> {
        // Opened-but-never-written: nothing was committed.
        if let Some(e) = self.pending.take() {
            return Err(e);
        }
        if self.failed {
            self.discard();
            return Ok(());
        }
        let Some(writer) = self.file.take() else {
            return Ok(());
        };

        let synced = writer
            .into_inner()
            .map_err(|e| e.into_error())
            .and_then(|file| file.sync_all());
        if let Err(e) = synced {
            self.discard();
            return Err(e);
        }

        let committed = commit(&self.staging, &self.target);
        if committed.is_err() {
            self.discard();
        }
        committed
    }
}

/// Move a staging file into place. An existing object is kept as-is.
fn commit(staging: &Path, target: &Path) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    if target.exists() {
        // Same key, same bytes.
        return fs::remove_file(staging);
    }

    match fs::rename(staging, target) {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(libc::EXDEV) => copy_then_rename(staging, target),
        Err(e) => Err(e),
    }
}

/// Cross-device commit: copy next to `target`, then rename within its directory.
///
/// `target` never holds a partial copy.
fn copy_then_rename(staging: &Path, target: &Path) -> io::Result<()> {
    let partial = target.with_file_name(format!(".{}.partial", Uuid::new_v4()));
    let moved = fs::copy(staging, &partial)
        .and_then(|_| File::open(&partial)?.sync_all())
        .and_then(|()| fs::rename(&partial, target));
    if let Err(e) = moved {
        if let Err(cleanup) = fs::remove_file(&partial) {
            if cleanup.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %partial.display(), error = %cleanup, "failed to remove partial copy");
            }
        }
        return Err(e);
    }
    fs::remove_file(staging)
}

enum FsReader {
    Open(BufReader<File>),
    Missing(Option<io::Error>),
}

impl Read for FsReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            FsReader::Open(file) => file.read(buf),
            FsReader::Missing(err) => Err(err
                .take()
                .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "key not found"))),
        }
    }
}

impl Close for FsReader {
    fn close(&mut self) -> io::Result<()> {
        if let FsReader::Open(_) = self {
            *self = FsReader::Missing(None);
        }
        Ok(())
    }
}
