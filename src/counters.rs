//! Per-run and shared cleaner counters (spec §8 invariant 2, DESIGN NOTES
//! §9: "Keep this two-level structure — do not use atomics on the hot
//! per-entry path").
//!
//! `RunCounters` is a plain, thread-confined struct incremented on every
//! classified entry within one file pass; at the end of the pass its totals
//! are folded into `SharedCounters`, which uses atomics because it's read
//! concurrently by other threads (e.g. a metrics exporter).

use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-confined counters accumulated during a single file pass.
#[derive(Clone, Copy, Debug, Default)]
pub struct RunCounters {
    pub ln_obsolete: u64,
    pub ln_migrated: u64,
    pub ln_dead: u64,
    pub ln_locked: u64,
    pub ln_expired: u64,
    pub ln_extinct: u64,
    pub in_obsolete: u64,
    pub in_dirtied: u64,
    pub in_dead: u64,
    pub bin_delta_dirtied: u64,
    pub bin_delta_dead: u64,
    /// DbTree/FileHeader entries: live, never migrated (spec §4.3 step 5;
    /// these categories are deliberately included in
    /// `EntryCategory::is_node_type` and must reach a counted outcome, not
    /// be silently dropped).
    pub other_live: u64,
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total node-type entries this run observed, for spec §8 invariant 2:
    /// "the sum of migrated + dead + obsolete + expired + extinct + locked
    /// equals the total node-type entries in the file."
    pub fn total_node_entries(&self) -> u64 {
        self.ln_obsolete
            + self.ln_migrated
            + self.ln_dead
            + self.ln_locked
            + self.ln_expired
            + self.ln_extinct
            + self.in_obsolete
            + self.in_dirtied
            + self.in_dead
            + self.bin_delta_dirtied
            + self.bin_delta_dead
            + self.other_live
    }
}

/// Process-wide, atomically updated totals folded in from each completed
/// `RunCounters` (spec §5, §9: flushed lazily, never touched per-entry).
#[derive(Default)]
pub struct SharedCounters {
    ln_obsolete: AtomicU64,
    ln_migrated: AtomicU64,
    ln_dead: AtomicU64,
    ln_locked: AtomicU64,
    ln_expired: AtomicU64,
    ln_extinct: AtomicU64,
    in_obsolete: AtomicU64,
    in_dirtied: AtomicU64,
    in_dead: AtomicU64,
    bin_delta_dirtied: AtomicU64,
    bin_delta_dead: AtomicU64,
    other_live: AtomicU64,
    files_cleaned: AtomicU64,
}

impl SharedCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fold_in(&self, run: &RunCounters) {
        self.ln_obsolete.fetch_add(run.ln_obsolete, Ordering::Relaxed);
        self.ln_migrated.fetch_add(run.ln_migrated, Ordering::Relaxed);
        self.ln_dead.fetch_add(run.ln_dead, Ordering::Relaxed);
        self.ln_locked.fetch_add(run.ln_locked, Ordering::Relaxed);
        self.ln_expired.fetch_add(run.ln_expired, Ordering::Relaxed);
        self.ln_extinct.fetch_add(run.ln_extinct, Ordering::Relaxed);
        self.in_obsolete.fetch_add(run.in_obsolete, Ordering::Relaxed);
        self.in_dirtied.fetch_add(run.in_dirtied, Ordering::Relaxed);
        self.in_dead.fetch_add(run.in_dead, Ordering::Relaxed);
        self.bin_delta_dirtied
            .fetch_add(run.bin_delta_dirtied, Ordering::Relaxed);
        self.bin_delta_dead
            .fetch_add(run.bin_delta_dead, Ordering::Relaxed);
        self.other_live.fetch_add(run.other_live, Ordering::Relaxed);
    }

    pub fn note_file_cleaned(&self) {
        self.files_cleaned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn files_cleaned(&self) -> u64 {
        self.files_cleaned.load(Ordering::Relaxed)
    }

    pub fn ln_migrated(&self) -> u64 {
        self.ln_migrated.load(Ordering::Relaxed)
    }

    pub fn ln_obsolete(&self) -> u64 {
        self.ln_obsolete.load(Ordering::Relaxed)
    }

    pub fn ln_dead(&self) -> u64 {
        self.ln_dead.load(Ordering::Relaxed)
    }

    pub fn ln_locked(&self) -> u64 {
        self.ln_locked.load(Ordering::Relaxed)
    }

    pub fn ln_expired(&self) -> u64 {
        self.ln_expired.load(Ordering::Relaxed)
    }

    pub fn ln_extinct(&self) -> u64 {
        self.ln_extinct.load(Ordering::Relaxed)
    }

    pub fn in_obsolete(&self) -> u64 {
        self.in_obsolete.load(Ordering::Relaxed)
    }

    pub fn in_dirtied(&self) -> u64 {
        self.in_dirtied.load(Ordering::Relaxed)
    }

    pub fn in_dead(&self) -> u64 {
        self.in_dead.load(Ordering::Relaxed)
    }

    pub fn bin_delta_dirtied(&self) -> u64 {
        self.bin_delta_dirtied.load(Ordering::Relaxed)
    }

    pub fn bin_delta_dead(&self) -> u64 {
        self.bin_delta_dead.load(Ordering::Relaxed)
    }

    pub fn other_live(&self) -> u64 {
        self.other_live.load(Ordering::Relaxed)
    }
}
