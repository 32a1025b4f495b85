//! Shared-store behavior under parallel callers.

use std::sync::Arc;
use std::thread;

use anyhow::Result;
use tempfile::TempDir;
use typed_cas::{CasConfig, ContentKey, HashAlgorithm, MemoryKv, Store};

#[test]
fn test_concurrent_puts_of_same_blob() -> Result<()> {
    let kv = MemoryKv::new();
    let store = Arc::new(Store::with_defaults(kv.clone()));
    let expected = store.put(b"application/octet-stream", b"Concurrent Data")?;

    let mut handles = vec![];
    for _ in 0..10 {
        let store = store.clone();
        handles.push(thread::spawn(move || {
            store
                .put(b"application/octet-stream", b"Concurrent Data")
                .expect("write failed")
        }));
    }

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
    assert_eq!(kv.len(), 1);
    Ok(())
}

#[test]
fn test_concurrent_distinct_blobs_roundtrip() -> Result<()> {
    let store = Store::builder()
        .hash(HashAlgorithm::Sha256)
        .pool_capacity(4)
        .kv(MemoryKv::new())
        .build()?;

    let handles: Vec<_> = (0..8u32)
        .map(|worker| {
            let store = store.clone();
            thread::spawn(move || -> Vec<(ContentKey, Vec<u8>)> {
                (0..50u32)
                    .map(|i| {
                        let body = format!("worker {worker} item {i}").into_bytes();
                        let key = store.put(b"text/plain", &body).expect("put failed");
                        (key, body)
                    })
                    .collect()
            })
        })
        .collect();

    let mut written = vec![];
    for handle in handles {
        written.extend(handle.join().unwrap());
    }

    let mut buf = vec![0u8; 128];
    for (key, body) in written {
        let blob = store.get_into(&mut buf, &key)?;
        assert_eq!(blob.content_type.as_ref(), b"text/plain");
        assert_eq!(blob.content.as_ref(), body.as_slice());
    }
    Ok(())
}

#[test]
fn test_concurrent_filesystem_writers() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = Store::open(CasConfig::with_base_path(temp_dir.path()))?;

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            thread::spawn(move || store.put(b"audio/wav", &[7u8; 4096]).expect("put failed"))
        })
        .collect();

    let keys: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(keys.windows(2).all(|pair| pair[0] == pair[1]));

    let blob = store.get(&keys[0])?;
    assert_eq!(blob.content.len(), 4096);

    let staging = std::fs::read_dir(temp_dir.path().join("staging"))?.count();
    assert_eq!(staging, 0);
    Ok(())
}
