//! Request sequencing.
//!
//! Every request is stamped before it is sent. A response may only replace
//! the held snapshot if its stamp is newer than the stamp of the snapshot
//! currently held; anything older arrived out of order and is dropped.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Monotonic request stamps plus the last applied stamp.
#[derive(Debug, Default)]
pub struct SequenceGate {
    issued: AtomicU64,
    applied: Mutex<u64>,
}

impl SequenceGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp a new request. Stamps start at 1.
    pub fn issue(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Run `apply` if `seq` is newer than the last applied stamp.
    ///
    /// The comparison and `apply` run under the same lock, so two responses
    /// completing together cannot both pass the check.
    pub fn try_apply(&self, seq: u64, apply: impl FnOnce()) -> bool {
        let mut applied = self.applied.lock();
        if seq <= *applied {
            return false;
        }
        *applied = seq;
        apply();
        true
    }

    /// Stamp of the snapshot currently held (0 before the first apply).
    pub fn last_applied(&self) -> u64 {
        *self.applied.lock()
    }

    /// Highest stamp handed out so far.
    pub fn last_issued(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }
}
