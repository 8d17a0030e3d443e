// Per-entry byte accounting shared by every pool type (C1).
//
// A pool tracks a monotonic byte counter that is nudged on every insert and
// removal. Every string-bearing entry contributes its content length plus a
// fixed per-string overhead, modeling the allocator/bookkeeping cost a real
// string carries beyond its bytes.

use std::sync::atomic::{AtomicI64, Ordering};

/// Fixed per-entry overhead added to every tracked string, approximating
/// heap allocator header cost and `String`'s own (ptr, len, cap) triple.
pub const STRING_OVERHEAD_BYTES: i64 = 24;

/// Byte-size contribution of a string-bearing pool entry.
pub fn sized_bytes(content_len: usize) -> i64 {
    content_len as i64 + STRING_OVERHEAD_BYTES
}

/// A monotonic-ish byte counter. Despite the name it can move down as well
/// as up (removals decrement it); "monotonic" refers to the fact that every
/// individual insert/remove pairs with exactly one counter update, so the
/// counter never drifts from the set of entries actually held.
#[derive(Debug, Default)]
pub struct MemoryTracker {
    bytes: AtomicI64,
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self {
            bytes: AtomicI64::new(0),
        }
    }

    pub fn add(&self, delta: i64) {
        self.bytes.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn sub(&self, delta: i64) {
        self.bytes.fetch_sub(delta, Ordering::Relaxed);
    }

    pub fn bytes(&self) -> i64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.bytes.store(0, Ordering::Relaxed);
    }
}
