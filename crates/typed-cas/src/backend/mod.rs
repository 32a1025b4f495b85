//! Concrete [`KvBackend`](crate::KvBackend) implementations.

pub mod fs;
pub mod memory;

pub use fs::FsKv;
pub use memory::MemoryKv;
