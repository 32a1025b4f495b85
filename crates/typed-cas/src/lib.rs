//! Content Addressable Storage (CAS) for typed blobs.
//!
//! A blob is a content-type tag plus a body. The store derives its key by
//! hashing a self-describing record, and persists that record through any
//! [`KvBackend`]:
//!
//! ```text
//! offset         size       field
//! 0              1          content-type length (0..=127)
//! 1              4          body length, big-endian u32
//! 5              type len   content-type bytes
//! 5 + type len   body len   body bytes
//! ```
//!
//! The key covers the whole record, not just the body. A colliding payload
//! must also carry a valid type and the same length. The digest is a
//! construction-time choice (SHA-1 by default); it is not recorded per record.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use typed_cas::{MemoryKv, Store};
//!
//! let store = Store::builder().sha1().kv(MemoryKv::new()).build().unwrap();
//!
//! let key = store.put(b"text/plain", b"Hello, World!").unwrap();
//! println!("Stored as: {}", key);
//!
//! let blob = store.get(&key).unwrap();
//! assert_eq!(blob.content.as_ref(), b"Hello, World!");
//!
//! // Reuse a buffer across reads
//! let mut buf = vec![0u8; 64];
//! let blob = store.get_into(&mut buf, &key).unwrap();
//! assert_eq!(blob.content_type.as_ref(), b"text/plain");
//! ```
//!
//! # Configuration
//!
//! [`Store::open`] wires a filesystem backend from a [`CasConfig`]:
//! - `TYPED_CAS_PATH`: Base path for storage (default: `~/.typed-cas`)
//! - `TYPED_CAS_READONLY`: Set to "true" for read-only mode
//! - `TYPED_CAS_HASH`: `sha1`, `sha256` or `blake3`
//!
//! # Concurrency
//!
//! A `Store` is `Send + Sync` and cheap to clone. It spawns nothing and
//! imposes no timeouts; every call blocks on the backend. Concurrent puts
//! of the same key are as safe as the backend's own same-key writes.

pub mod backend;
pub mod closer;
pub mod config;
pub mod error;
pub mod hash;
pub mod header;
pub mod kv;
pub mod pool;
pub mod store;

// Re-exports for convenience
pub use backend::{FsKv, MemoryKv};
pub use closer::CloseOnce;
pub use config::CasConfig;
pub use error::{CasError, ErrorKind, Result, Stage};
pub use hash::{Accumulator, ContentKey, HashAlgorithm, KeyParseError};
pub use header::{Header, HEADER_LEN, MAX_BODY_LEN, MAX_CONTENT_TYPE_LEN};
pub use kv::{Close, KvBackend, KvReader, KvWriter, NotFoundReader};
pub use pool::{HashPool, PooledHasher, DEFAULT_POOL_CAPACITY};
pub use store::{with_hash, with_kv, with_pool_capacity, with_sha1, Blob, Store, StoreBuilder, StoreOption};
