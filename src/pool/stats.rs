//! Pool counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Connections opened for the pool.
    pub created: u64,
    /// Successful acquisitions.
    pub acquired: u64,
    /// Connections given back.
    pub released: u64,
    /// Connections dropped after a failed health check.
    pub discarded: u64,
}

impl PoolStats {
    /// Connections currently held by callers.
    pub fn in_use(&self) -> u64 {
        self.acquired.saturating_sub(self.released)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    created: AtomicU64,
    acquired: AtomicU64,
    released: AtomicU64,
    discarded: AtomicU64,
}

impl Counters {
    pub fn record_create(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_acquire(&self) {
        self.acquired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_release(&self) {
        self.released.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discard(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PoolStats {
        PoolStats {
            created: self.created.load(Ordering::Relaxed),
            acquired: self.acquired.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}
