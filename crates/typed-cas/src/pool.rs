//! Pool of reusable hash accumulators.
//!
//! `acquire` never blocks: an empty pool hands out a freshly built
//! accumulator. Returning happens on drop of the guard, which resets the
//! accumulator before it becomes visible to another caller. Once `capacity`
//! accumulators are idle, further returns are discarded.

use std::ops::{Deref, DerefMut};

use parking_lot::Mutex;
use tracing::trace;

use crate::hash::{Accumulator, HashAlgorithm};

/// Default number of idle accumulators kept around.
pub const DEFAULT_POOL_CAPACITY: usize = 32;

#[derive(Debug)]
pub struct HashPool {
    algorithm: HashAlgorithm,
    capacity: usize,
    idle: Mutex<Vec<Accumulator>>,
}

impl HashPool {
    pub fn new(algorithm: HashAlgorithm, capacity: usize) -> Self {
        Self {
            algorithm,
            capacity,
            idle: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of accumulators currently waiting for reuse.
    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }

    /// Borrow an accumulator in its initial state.
    pub fn acquire(&self) -> PooledHasher<'_> {
        let reused = self.idle.lock().pop();
        let acc = match reused {
            Some(acc) => {
                trace!(algorithm = %self.algorithm, "reusing pooled accumulator");
                acc
            }
            None => {
                trace!(algorithm = %self.algorithm, "allocating accumulator");
                self.algorithm.accumulator()
            }
        };
        PooledHasher {
            pool: self,
            acc: Some(acc),
        }
    }

    fn release(&self, mut acc: Accumulator) {
        // Never reuse mid-state.
        acc.reset();
        let mut idle = self.idle.lock();
        if idle.len() < self.capacity {
            idle.push(acc);
        }
    }
}

/// Exclusive borrow of one accumulator; returns it to the pool on drop.
#[derive(Debug)]
pub struct PooledHasher<'a> {
    pool: &'a HashPool,
    acc: Option<Accumulator>,
}

impl Deref for PooledHasher<'_> {
    type Target = Accumulator;

    fn deref(&self) -> &Accumulator {
        // Only taken in drop.
        self.acc.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for PooledHasher<'_> {
    fn deref_mut(&mut self) -> &mut Accumulator {
        self.acc.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledHasher<'_> {
    fn drop(&mut self) {
        if let Some(acc) = self.acc.take() {
            self.pool.release(acc);
        }
    }
}
