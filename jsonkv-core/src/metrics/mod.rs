//! Metrics for store observability
//!
//! Everything goes through the `metrics` facade. Without an installed
//! recorder every call here is a no-op.

use ::metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Instant;

pub const OPS_CREATE: &str = "store.operations.create";
pub const OPS_READ: &str = "store.operations.read";
pub const OPS_DELETE: &str = "store.operations.delete";
pub const OPS_CLEAR: &str = "store.operations.clear";
pub const OPS_LIST: &str = "store.operations.list";
pub const OPS_PURGE: &str = "store.operations.purge";
pub const ERRORS_TOTAL: &str = "store.errors.total";
pub const ENTRIES: &str = "store.entries";
pub const SIZE_BYTES: &str = "store.size.bytes";
pub const PERSIST_DURATION_MS: &str = "store.persist.duration_ms";

/// Register descriptions with the installed recorder
pub fn init_metrics() {
    describe_counter!(OPS_CREATE, "Store create operations");
    describe_counter!(OPS_READ, "Store read operations");
    describe_counter!(OPS_DELETE, "Store delete operations");
    describe_counter!(OPS_CLEAR, "Confirmed store clear operations");
    describe_counter!(OPS_LIST, "Store list operations");
    describe_counter!(OPS_PURGE, "Explicit purges of expired entries");
    describe_counter!(ERRORS_TOTAL, "Failed store operations, labelled by kind");
    describe_gauge!(ENTRIES, "Entries currently in the table");
    describe_gauge!(SIZE_BYTES, "Size of the backing file in bytes");
    describe_histogram!(
        PERSIST_DURATION_MS,
        "Full-table rewrite duration in milliseconds"
    );
}

pub fn record_counter(name: &'static str, value: u64) {
    counter!(name).increment(value);
}

/// Count a failed operation under its error kind
pub fn record_error(kind: &'static str) {
    counter!(ERRORS_TOTAL, "kind" => kind).increment(1);
}

pub fn record_gauge(name: &'static str, value: f64) {
    gauge!(name).set(value);
}

/// Timer for measuring operation duration
pub struct Timer {
    name: &'static str,
    start: Instant,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    /// Stop the timer and record the duration
    pub fn stop(self) {
        let duration = self.start.elapsed();
        histogram!(self.name).record(duration.as_secs_f64() * 1000.0);
    }
}
