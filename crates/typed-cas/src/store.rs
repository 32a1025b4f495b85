//! Store: typed blobs in, content keys out.
//!
//! `put` derives the key by hashing the full record, then streams the same
//! record into a sink obtained from the backend under that key. `get` reads
//! the record back and splits it into content-type and content.

use std::borrow::Cow;
use std::fmt;
use std::io::Read;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::backend::FsKv;
use crate::closer::CloseOnce;
use crate::config::CasConfig;
use crate::error::{CasError, Result, Stage};
use crate::hash::{ContentKey, HashAlgorithm};
use crate::header::{write_record, Header, HEADER_LEN};
use crate::kv::KvBackend;
use crate::pool::{HashPool, DEFAULT_POOL_CAPACITY};

/// Content-addressable store on top of a [`KvBackend`].
///
/// Cheap to clone; clones share the backend and the hash pool.
#[derive(Clone)]
pub struct Store {
    pool: Arc<HashPool>,
    kv: Arc<dyn KvBackend>,
}

/// One construction-time setting, applied in order by [`Store::new`].
pub enum StoreOption {
    Hash(HashAlgorithm),
    Kv(Arc<dyn KvBackend>),
    PoolCapacity(usize),
}

/// Use SHA-1 for key derivation.
pub fn with_sha1() -> StoreOption {
    StoreOption::Hash(HashAlgorithm::Sha1)
}

pub fn with_hash(algorithm: HashAlgorithm) -> StoreOption {
    StoreOption::Hash(algorithm)
}

/// Store records in `kv`.
pub fn with_kv(kv: impl KvBackend + 'static) -> StoreOption {
    StoreOption::Kv(Arc::new(kv))
}

pub fn with_pool_capacity(capacity: usize) -> StoreOption {
    StoreOption::PoolCapacity(capacity)
}

/// Collects options; [`build`](Self::build) checks that nothing required is missing.
pub struct StoreBuilder {
    hash: Option<HashAlgorithm>,
    kv: Option<Arc<dyn KvBackend>>,
    pool_capacity: usize,
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self {
            hash: None,
            kv: None,
            pool_capacity: DEFAULT_POOL_CAPACITY,
        }
    }
}

impl StoreBuilder {
    pub fn option(mut self, option: StoreOption) -> Self {
        match option {
            StoreOption::Hash(algorithm) => self.hash = Some(algorithm),
            StoreOption::Kv(kv) => self.kv = Some(kv),
            StoreOption::PoolCapacity(capacity) => self.pool_capacity = capacity,
        }
        self
    }

    pub fn hash(self, algorithm: HashAlgorithm) -> Self {
        self.option(with_hash(algorithm))
    }

    pub fn sha1(self) -> Self {
        self.option(with_sha1())
    }

    pub fn kv(self, kv: impl KvBackend + 'static) -> Self {
        self.option(with_kv(kv))
    }

    pub fn pool_capacity(self, capacity: usize) -> Self {
        self.option(with_pool_capacity(capacity))
    }

    /// Finalize. The hash function is checked before the backend.
    pub fn build(self) -> Result<Store> {
        let algorithm = self.hash.ok_or(CasError::MissingHashFunc)?;
        let kv = self.kv.ok_or(CasError::MissingKvBackend)?;
        Ok(Store {
            pool: Arc::new(HashPool::new(algorithm, self.pool_capacity)),
            kv,
        })
    }
}

/// A record read back from the store.
///
/// Fields borrow from the caller's buffer when it was large enough, and
/// own a fresh allocation otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob<'a> {
    pub content_type: Cow<'a, [u8]>,
    pub content: Cow<'a, [u8]>,
}

impl Blob<'_> {
    pub fn into_owned(self) -> Blob<'static> {
        Blob {
            content_type: Cow::Owned(self.content_type.into_owned()),
            content: Cow::Owned(self.content.into_owned()),
        }
    }
}

enum Dest<'a> {
    Borrowed(&'a mut [u8]),
    Owned(Vec<u8>),
}

impl<'a> Dest<'a> {
    fn as_mut_slice(&mut self) -> &mut [u8] {
        match self {
            Dest::Borrowed(buf) => &mut buf[..],
            Dest::Owned(buf) => buf.as_mut_slice(),
        }
    }

    fn into_cow(self) -> Cow<'a, [u8]> {
        match self {
            Dest::Borrowed(buf) => Cow::Borrowed(buf),
            Dest::Owned(buf) => Cow::Owned(buf),
        }
    }
}

/// Whether `len` bytes hold both fields. A sum past `usize::MAX` never fits.
fn fits_both(len: usize, type_len: usize, body_len: usize) -> bool {
    type_len
        .checked_add(body_len)
        .is_some_and(|total| len >= total)
}

/// Carve non-overlapping destinations out of `out`, allocating whatever does not fit.
///
/// Content-type takes `out[..type_len]`. Content takes the bytes right after
/// it, only when both fit.
fn destinations(out: &mut [u8], type_len: usize, body_len: usize) -> (Dest<'_>, Dest<'_>) {
    if fits_both(out.len(), type_len, body_len) {
        let (ty, rest) = out.split_at_mut(type_len);
        (Dest::Borrowed(ty), Dest::Borrowed(&mut rest[..body_len]))
    } else if out.len() >= type_len {
        (
            Dest::Borrowed(&mut out[..type_len]),
            Dest::Owned(vec![0; body_len]),
        )
    } else {
        (Dest::Owned(vec![0; type_len]), Dest::Owned(vec![0; body_len]))
    }
}

fn read_header<R: Read + ?Sized>(r: &mut R) -> Result<Header> {
    let mut raw = [0u8; HEADER_LEN];
    r.read_exact(&mut raw).map_err(|source| CasError::Read {
        stage: Stage::Header,
        source,
    })?;
    Ok(Header::decode(&raw))
}

fn read_record<'a, R: Read + ?Sized>(r: &mut R, out: &'a mut [u8]) -> Result<Blob<'a>> {
    let header = read_header(r)?;
    let (mut ty, mut body) = destinations(out, header.type_len(), header.body_len());

    r.read_exact(ty.as_mut_slice())
        .map_err(|source| CasError::Read {
            stage: Stage::ContentType,
            source,
        })?;
    r.read_exact(body.as_mut_slice())
        .map_err(|source| CasError::Read {
            stage: Stage::Body,
            source,
        })?;

    Ok(Blob {
        content_type: ty.into_cow(),
        content: body.into_cow(),
    })
}

impl Store {
    pub fn builder() -> StoreBuilder {
        StoreBuilder::default()
    }

    /// Apply `options` in order, then finalize.
    pub fn new(options: impl IntoIterator<Item = StoreOption>) -> Result<Self> {
        options
            .into_iter()
            .fold(Self::builder(), StoreBuilder::option)
            .build()
    }

    /// SHA-1 keys over `kv`.
    pub fn with_defaults(kv: impl KvBackend + 'static) -> Self {
        Self {
            pool: Arc::new(HashPool::new(HashAlgorithm::Sha1, DEFAULT_POOL_CAPACITY)),
            kv: Arc::new(kv),
        }
    }

    /// Store on the local filesystem as described by `config`.
    pub fn open(config: CasConfig) -> anyhow::Result<Self> {
        let algorithm = config.hash;
        let capacity = config.pool_capacity;
        let kv = FsKv::new(config)?;
        Ok(Self::builder()
            .hash(algorithm)
            .pool_capacity(capacity)
            .kv(kv)
            .build()?)
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.pool.algorithm()
    }

    /// Store a typed blob and return its key.
    ///
    /// The key is the digest of `header || content_type || body`. Lengths
    /// are validated before any hashing or I/O. The sink is closed exactly
    /// once; a failed close is reported as [`CasError::Commit`] and wins over
    /// an earlier write error.
    pub fn put(&self, content_type: &[u8], body: &[u8]) -> Result<ContentKey> {
        let header = Header::for_content(content_type, body)?;
        let key = self.derive_key(&header, content_type, body)?;

        let mut sink = CloseOnce::new(self.kv.put(key.as_bytes(), header.total_size()));
        let written = write_record(&mut sink, &header, content_type, body);
        let closed = sink.close();

        match (written, closed) {
            (_, Err(source)) => Err(CasError::Commit { source }),
            (Err((stage, source)), Ok(())) => Err(CasError::Write { stage, source }),
            (Ok(()), Ok(())) => {
                debug!(key = %key, size = header.total_size(), "stored record");
                Ok(key)
            }
        }
    }

    fn derive_key(&self, header: &Header, content_type: &[u8], body: &[u8]) -> Result<ContentKey> {
        let mut hasher = self.pool.acquire();
        write_record(&mut *hasher, header, content_type, body)
            .map_err(|(stage, source)| CasError::KeyDerivation { stage, source })?;
        Ok(ContentKey::from_bytes(hasher.finalize_reset()))
    }

    /// Read a record into freshly allocated buffers.
    pub fn get(&self, key: &ContentKey) -> Result<Blob<'static>> {
        self.get_into(&mut [], key).map(Blob::into_owned)
    }

    /// Read a record, reusing `out` where it is large enough.
    ///
    /// Content-type lands in `out[..type_len]` when it fits; content lands in
    /// `out[type_len..type_len + body_len]` when both fit. Anything that does
    /// not fit is allocated, so an undersized buffer never fails the read.
    pub fn get_into<'a>(&self, out: &'a mut [u8], key: &ContentKey) -> Result<Blob<'a>> {
        let mut source = CloseOnce::new(self.kv.get(key.as_bytes()));
        let blob = read_record(&mut source, out);
        if let Err(e) = source.close() {
            warn!(key = %key, error = %e, "failed to close record source");
        }

        let blob = blob?;
        debug!(
            key = %key,
            type_len = blob.content_type.len(),
            body_len = blob.content.len(),
            "read record"
        );
        Ok(blob)
    }

    /// Read only the header of a record: its lengths, without the content.
    pub fn inspect(&self, key: &ContentKey) -> Result<Header> {
        let mut source = CloseOnce::new(self.kv.get(key.as_bytes()));
        let header = read_header(&mut source);
        if let Err(e) = source.close() {
            warn!(key = %key, error = %e, "failed to close record source");
        }
        header
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("algorithm", &self.pool.algorithm())
            .field("pool_capacity", &self.pool.capacity())
            .finish_non_exhaustive()
    }
}
