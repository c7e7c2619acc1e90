//! Per-file obsolete-offset tracking (spec §3 "Obsolete offset set", §4.3
//! step 1).
//!
//! A packed, sorted set of offsets known obsolete a priori — recorded as
//! application threads overwrite, delete, or supersede entries. Immutable
//! during one file's cleaning pass: the classifier reads it once, advancing
//! monotonically, never backtracking (spec §5 ordering guarantees).

use std::collections::BTreeSet;

use parking_lot::Mutex;

/// Sorted set of obsolete offsets for one file.
///
/// Mutation (recording new obsolete offsets as application threads overwrite
/// records) and the single read-once iteration a cleaning pass performs are
/// both supported, but never concurrently against the same file: a file is
/// only scanned by one cleaner run at a time (spec §4.6 "already in-flight"
/// exclusion).
#[derive(Default)]
pub struct ObsoleteIndex {
    offsets: Mutex<BTreeSet<u32>>,
}

impl ObsoleteIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `offset` as obsolete. An offset may appear at most once
    /// (spec §3 invariants); inserting twice is a no-op, not an error, since
    /// redundant recordings can legitimately happen (e.g. a record
    /// overwritten twice before the cleaner looks at the file).
    pub fn mark_obsolete(&self, offset: u32) {
        self.offsets.lock().insert(offset);
    }

    pub fn is_obsolete(&self, offset: u32) -> bool {
        self.offsets.lock().contains(&offset)
    }

    pub fn len(&self) -> usize {
        self.offsets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.lock().is_empty()
    }

    /// Takes a read-once, ascending-order snapshot for a single cleaning
    /// pass (spec §4.3 step 1, §5 "obsolete-offset lookups can advance
    /// monotonically without backtracking").
    pub fn snapshot(&self) -> ObsoleteCursor {
        ObsoleteCursor {
            sorted: self.offsets.lock().iter().copied().collect(),
            next: 0,
        }
    }
}

/// A single forward pass over a snapshot of obsolete offsets, used by the
/// classifier to check each streamed entry's offset in ascending order.
pub struct ObsoleteCursor {
    sorted: Vec<u32>,
    next: usize,
}

impl ObsoleteCursor {
    /// Advances past any obsolete offsets below `offset`, then reports
    /// whether `offset` itself is the next known-obsolete offset (spec
    /// §4.3 step 1). Entries are always presented in ascending order by the
    /// `LogReader`, so the internal cursor never needs to rewind.
    pub fn advance_and_check(&mut self, offset: u32) -> bool {
        while self.next < self.sorted.len() && self.sorted[self.next] < offset {
            self.next += 1;
        }
        self.next < self.sorted.len() && self.sorted[self.next] == offset
    }
}
