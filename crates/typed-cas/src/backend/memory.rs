//! In-process backend. Records live in a shared map and vanish with it.

use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::kv::{Close, KvBackend, KvReader, KvWriter, NotFoundReader};

/// Map-backed [`KvBackend`]. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    entries: Arc<RwLock<HashMap<Vec<u8>, Arc<[u8]>>>>,
    /// Largest value a single sink accepts; writes past it fail.
    quota: Option<usize>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend whose sinks refuse values larger than `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            entries: Arc::default(),
            quota: Some(bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.entries.read().contains_key(key)
    }

    /// The committed bytes under `key`.
    pub fn raw(&self, key: &[u8]) -> Option<Arc<[u8]>> {
        self.entries.read().get(key).cloned()
    }
}

impl KvBackend for MemoryKv {
    fn put(&self, key: &[u8], size_hint: usize) -> Box<dyn KvWriter + '_> {
        Box::new(MemoryWriter {
            kv: self,
            key: key.to_vec(),
            buf: Vec::with_capacity(size_hint),
            failed: false,
        })
    }

    fn get(&self, key: &[u8]) -> Box<dyn KvReader + '_> {
        match self.raw(key) {
            Some(data) => Box::new(MemoryReader(Cursor::new(data))),
            None => Box::new(NotFoundReader),
        }
    }
}

struct MemoryWriter<'a> {
    kv: &'a MemoryKv,
    key: Vec<u8>,
    buf: Vec<u8>,
    failed: bool,
}

impl Write for MemoryWriter<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.failed {
            return Err(io::Error::other("write after failed write"));
        }
        if let Some(quota) = self.kv.quota {
            if self.buf.len() + data.len() > quota {
                self.failed = true;
                return Err(io::Error::other(format!(
                    "memory quota of {quota} bytes exceeded"
                )));
            }
        }
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Close for MemoryWriter<'_> {
    fn close(&mut self) -> io::Result<()> {
        if !self.failed {
            let value: Arc<[u8]> = std::mem::take(&mut self.buf).into();
            self.kv
                .entries
                .write()
                .insert(std::mem::take(&mut self.key), value);
        }
        Ok(())
    }
}

struct MemoryReader(Cursor<Arc<[u8]>>);

impl Read for MemoryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Close for MemoryReader {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}
