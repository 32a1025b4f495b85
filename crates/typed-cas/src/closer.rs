//! Scoped close: at most one close per resource, whatever path triggers it.
//!
//! `Store::put` closes its sink explicitly on both the success and failure
//! paths, and the wrapper also closes on drop if neither ran (early return,
//! panic). The underlying `close` runs once; later calls replay the outcome.

use std::io::{self, Read, Write};

use tracing::warn;

use crate::kv::Close;

#[derive(Debug)]
enum Outcome {
    Closed,
    Failed(io::ErrorKind, String),
}

#[derive(Debug)]
pub struct CloseOnce<C: Close> {
    inner: C,
    outcome: Option<Outcome>,
}

impl<C: Close> CloseOnce<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            outcome: None,
        }
    }

    /// Close the wrapped resource, or replay the result of the earlier close.
    pub fn close(&mut self) -> io::Result<()> {
        match &self.outcome {
            Some(Outcome::Closed) => Ok(()),
            Some(Outcome::Failed(kind, message)) => Err(io::Error::new(*kind, message.clone())),
            None => {
                let result = self.inner.close();
                self.outcome = Some(match &result {
                    Ok(()) => Outcome::Closed,
                    Err(e) => Outcome::Failed(e.kind(), e.to_string()),
                });
                result
            }
        }
    }

    /// Whether a close has been attempted.
    pub fn is_closed(&self) -> bool {
        self.outcome.is_some()
    }

    /// `Some(true)` once a close succeeded, `Some(false)` if it failed.
    pub fn succeeded(&self) -> Option<bool> {
        self.outcome
            .as_ref()
            .map(|outcome| matches!(outcome, Outcome::Closed))
    }

    fn closed_error() -> io::Error {
        io::Error::other("resource already closed")
    }
}

impl<C: Close> Drop for CloseOnce<C> {
    fn drop(&mut self) {
        if self.outcome.is_none() {
            if let Err(e) = self.close() {
                warn!(error = %e, "implicit close failed");
            }
        }
    }
}

impl<C: Close + Write> Write for CloseOnce<C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.is_closed() {
            return Err(Self::closed_error());
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.is_closed() {
            return Err(Self::closed_error());
        }
        self.inner.flush()
    }
}

impl<C: Close + Read> Read for CloseOnce<C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.is_closed() {
            return Err(Self::closed_error());
        }
        self.inner.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Probe<'a> {
        closes: &'a Cell<usize>,
        fail: bool,
    }

    impl Close for Probe<'_> {
        fn close(&mut self) -> io::Result<()> {
            self.closes.set(self.closes.get() + 1);
            if self.fail {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "commit refused"))
            } else {
                Ok(())
            }
        }
    }

    impl Write for Probe<'_> {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_close_runs_once() {
        let closes = Cell::new(0);
        let mut closer = CloseOnce::new(Probe {
            closes: &closes,
            fail: false,
        });
        assert!(closer.close().is_ok());
        assert!(closer.close().is_ok());
        drop(closer);
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn test_failed_close_is_replayed() {
        let closes = Cell::new(0);
        let mut closer = CloseOnce::new(Probe {
            closes: &closes,
            fail: true,
        });
        let first = closer.close().unwrap_err();
        let second = closer.close().unwrap_err();
        assert_eq!(first.kind(), io::ErrorKind::PermissionDenied);
        assert_eq!(second.kind(), first.kind());
        assert_eq!(second.to_string(), first.to_string());
        assert_eq!(closer.succeeded(), Some(false));
        drop(closer);
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn test_drop_closes_when_never_closed() {
        let closes = Cell::new(0);
        {
            let closer = CloseOnce::new(Probe {
                closes: &closes,
                fail: false,
            });
            assert!(!closer.is_closed());
            assert_eq!(closer.succeeded(), None);
        }
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn test_write_after_close_fails() {
        let closes = Cell::new(0);
        let mut closer = CloseOnce::new(Probe {
            closes: &closes,
            fail: false,
        });
        closer.write_all(b"ok").unwrap();
        closer.close().unwrap();
        assert_eq!(closer.succeeded(), Some(true));
        assert!(closer.write_all(b"late").is_err());
    }
}
