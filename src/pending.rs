//! Pending-LN queue (spec §4.3 step 4c, §4.6 "Pending-LN queue").
//!
//! Entries whose record lock was contended, or whose expiration couldn't be
//! definitively decided, go here instead of being dropped. A periodic sweep
//! re-probes each one; successful probes retry the classification/migration
//! decision, failures leave the entry queued.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::entry::LnPayload;
use crate::lsn::Lsn;

/// One deferred LN, keyed by its original LSN (spec §4.6: "a process-wide
/// map keyed by original LSN").
#[derive(Clone, Debug)]
pub struct PendingLn {
    pub db_id: u32,
    pub payload: LnPayload,
    pub vsn: Option<u64>,
}

/// Process-wide map of deferred LN migrations.
#[derive(Default)]
pub struct PendingLnQueue {
    entries: Mutex<HashMap<Lsn, PendingLn>>,
}

impl PendingLnQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `lsn` for later retry (spec §6 "`addPendingLN(lsn, info)`").
    pub fn add(&self, lsn: Lsn, entry: PendingLn) {
        self.entries.lock().insert(lsn, entry);
    }

    pub fn remove(&self, lsn: Lsn) -> Option<PendingLn> {
        self.entries.lock().remove(&lsn)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Snapshots every currently-queued `(lsn, entry)` pair for a drain
    /// sweep, without removing them — the caller removes each entry only
    /// once it has actually been retried (spec §4.6: "failures leave the
    /// entry for later").
    pub fn snapshot(&self) -> Vec<(Lsn, PendingLn)> {
        self.entries
            .lock()
            .iter()
            .map(|(&lsn, entry)| (lsn, entry.clone()))
            .collect()
    }
}
