/*
    ttl.rs - Time-to-live policy

    Expiry is absolute (UNIX seconds), fixed when an entry is created.
    Liveness is only evaluated when an entry is accessed; nothing here
    removes expired entries on its own.
*/

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current time in whole UNIX seconds
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> u64;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        // A clock set before 1970 reads as the epoch
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Manually driven clock for deterministic expiry tests
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_secs: u64) -> Self {
        ManualClock {
            now: AtomicU64::new(start_secs),
        }
    }

    pub fn set(&self, secs: u64) {
        self.now.store(secs, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Absolute expiry for an entry created at `now` with an optional TTL.
///
/// `None` means the entry never expires.
pub fn expiry_from_ttl(now: u64, ttl_secs: Option<u64>) -> Option<u64> {
    ttl_secs.map(|ttl| now.saturating_add(ttl))
}

/// An entry is live iff it has no expiry or `now` is strictly before it.
pub fn is_live(expiry: Option<u64>, now: u64) -> bool {
    match expiry {
        None => true,
        Some(at) => now < at,
    }
}
