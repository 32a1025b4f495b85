//! Key-value contract consumed by the store.
//!
//! The store never touches storage media itself. It asks a [`KvBackend`]
//! for a sink to write a record into, or a source to read one back.

use std::io::{self, Read, Write};

/// Resources with an explicit, fallible close.
pub trait Close {
    /// For sinks this is the commit point. Callers invoke it exactly once.
    fn close(&mut self) -> io::Result<()>;
}

impl<C: Close + ?Sized> Close for Box<C> {
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

impl<C: Close + ?Sized> Close for &mut C {
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// Write side of the contract.
pub trait KvWriter: Write + Close {}

impl<T: Write + Close> KvWriter for T {}

/// Read side of the contract.
pub trait KvReader: Read + Close {}

impl<T: Read + Close> KvReader for T {}

/// Byte-keyed storage the store writes records into.
///
/// Implementations must be safe to share between threads; the store calls
/// `put`/`get` from whichever thread its caller runs on.
pub trait KvBackend: Send + Sync {
    /// Open a sink for `key`. The sink MUST accept at least `size_hint` bytes.
    ///
    /// If there is no room the first write fails. Silently truncating is
    /// not allowed.
    ///
    /// Closing commits the bytes under `key` if, and only if, no earlier
    /// write returned an error; commit is all-or-nothing. Close is invoked
    /// exactly once whether or not writes failed, and no writes follow the
    /// first failure.
    fn put(&self, key: &[u8], size_hint: usize) -> Box<dyn KvWriter + '_>;

    /// Open a source for `key`.
    ///
    /// If `key` is absent the first read fails, with
    /// [`io::ErrorKind::NotFound`] or an end-of-data error. The value stays
    /// stable until the source is closed. Close is invoked exactly once
    /// after all reads, regardless of read errors.
    fn get(&self, key: &[u8]) -> Box<dyn KvReader + '_>;
}

impl<B: KvBackend + ?Sized> KvBackend for std::sync::Arc<B> {
    fn put(&self, key: &[u8], size_hint: usize) -> Box<dyn KvWriter + '_> {
        (**self).put(key, size_hint)
    }

    fn get(&self, key: &[u8]) -> Box<dyn KvReader + '_> {
        (**self).get(key)
    }
}

/// Source for a key that does not exist. Every read fails with `NotFound`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotFoundReader;

impl Read for NotFoundReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::NotFound, "key not found"))
    }
}

impl Close for NotFoundReader {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counting {
        closes: usize,
    }

    impl Write for Counting {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Close for Counting {
        fn close(&mut self) -> io::Result<()> {
            self.closes += 1;
            Ok(())
        }
    }

    #[test]
    fn test_boxed_writer_forwards_close() {
        let mut counting = Counting { closes: 0 };
        {
            let mut boxed: Box<dyn KvWriter + '_> = Box::new(&mut counting);
            boxed.write_all(b"data").unwrap();
            boxed.close().unwrap();
        }
        assert_eq!(counting.closes, 1);
    }

    #[test]
    fn test_not_found_reader() {
        let mut reader = NotFoundReader;
        let mut buf = [0u8; 5];
        let err = reader.read_exact(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(reader.close().is_ok());
    }
}
