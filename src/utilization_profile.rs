//! Persistent per-file byte counters (spec §3 "File summary", §4 component
//! table), the primary input to [`crate::file_selector::FileSelector`].
//!
//! Application threads increment obsolete counters as they mutate the
//! Btree; the cleaner flushes its own run counters into the same structure
//! once per file pass (spec §5: "The UtilizationProfile's global
//! `TrackedFileSummary` map is CoW and read lock-free"). We approximate that
//! with a `parking_lot::RwLock` over the map (short-held on the read path)
//! and per-file atomics so a single obsolete-offset recording never
//! contends with an unrelated file's cleaning pass.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::lsn::FileNumber;

/// Per-file byte/entry counters (spec §3).
#[derive(Default)]
pub struct FileSummary {
    pub total_count: AtomicU64,
    pub total_size: AtomicU64,
    pub total_ln_count: AtomicU64,
    pub total_ln_size: AtomicU64,
    pub total_in_count: AtomicU64,
    pub total_in_size: AtomicU64,
    pub obsolete_ln_count: AtomicU64,
    pub obsolete_ln_size: AtomicU64,
    pub obsolete_in_count: AtomicU64,
    pub max_ln_size: AtomicU64,
}

/// Point-in-time snapshot of a [`FileSummary`], cheap to copy and compare.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FileSummarySnapshot {
    pub total_count: u64,
    pub total_size: u64,
    pub total_ln_count: u64,
    pub total_ln_size: u64,
    pub total_in_count: u64,
    pub total_in_size: u64,
    pub obsolete_ln_count: u64,
    pub obsolete_ln_size: u64,
    pub obsolete_in_count: u64,
    pub max_ln_size: u64,
}

impl FileSummary {
    pub fn snapshot(&self) -> FileSummarySnapshot {
        FileSummarySnapshot {
            total_count: self.total_count.load(Ordering::Acquire),
            total_size: self.total_size.load(Ordering::Acquire),
            total_ln_count: self.total_ln_count.load(Ordering::Acquire),
            total_ln_size: self.total_ln_size.load(Ordering::Acquire),
            total_in_count: self.total_in_count.load(Ordering::Acquire),
            total_in_size: self.total_in_size.load(Ordering::Acquire),
            obsolete_ln_count: self.obsolete_ln_count.load(Ordering::Acquire),
            obsolete_ln_size: self.obsolete_ln_size.load(Ordering::Acquire),
            obsolete_in_count: self.obsolete_in_count.load(Ordering::Acquire),
            max_ln_size: self.max_ln_size.load(Ordering::Acquire),
        }
    }

    fn bump_max_ln_size(&self, size: u64) {
        let mut current = self.max_ln_size.load(Ordering::Acquire);
        while size > current {
            match self.max_ln_size.compare_exchange_weak(
                current,
                size,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }
}

impl FileSummarySnapshot {
    /// `(totalSize - obsoleteSize - expiredSize) / totalSize` (spec §3).
    /// `expired_bytes` is supplied by the caller since expiration decays
    /// with wall-clock time and isn't itself part of the persisted summary.
    pub fn utilization(&self, expired_bytes: u64) -> f64 {
        if self.total_size == 0 {
            return 1.0;
        }
        let obsolete_size = self.obsolete_ln_size + self.obsolete_in_size_estimate();
        let live = self
            .total_size
            .saturating_sub(obsolete_size)
            .saturating_sub(expired_bytes);
        live as f64 / self.total_size as f64
    }

    /// INs don't track an obsolete byte size directly in the source (spec
    /// §3 lists only `obsoleteINCount`), so we approximate obsolete IN
    /// bytes as the average IN size times the obsolete IN count.
    fn obsolete_in_size_estimate(&self) -> u64 {
        if self.total_in_count == 0 {
            return 0;
        }
        let avg = self.total_in_size / self.total_in_count;
        avg * self.obsolete_in_count
    }
}

/// Global map of per-file counters, the cleaner's view of the whole log's
/// disk-space utilization.
#[derive(Default)]
pub struct UtilizationProfile {
    files: RwLock<HashMap<FileNumber, Arc<FileSummary>>>,
}

impl UtilizationProfile {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, file: FileNumber) -> Arc<FileSummary> {
        if let Some(summary) = self.files.read().get(&file) {
            return Arc::clone(summary);
        }
        Arc::clone(
            self.files
                .write()
                .entry(file)
                .or_insert_with(|| Arc::new(FileSummary::default())),
        )
    }

    pub fn snapshot(&self, file: FileNumber) -> FileSummarySnapshot {
        match self.files.read().get(&file) {
            Some(summary) => summary.snapshot(),
            None => FileSummarySnapshot::default(),
        }
    }

    pub fn all_files(&self) -> Vec<FileNumber> {
        self.files.read().keys().copied().collect()
    }

    pub fn record_new_ln(&self, file: FileNumber, size: u64) {
        let summary = self.entry(file);
        summary.total_count.fetch_add(1, Ordering::AcqRel);
        summary.total_size.fetch_add(size, Ordering::AcqRel);
        summary.total_ln_count.fetch_add(1, Ordering::AcqRel);
        summary.total_ln_size.fetch_add(size, Ordering::AcqRel);
        summary.bump_max_ln_size(size);
    }

    pub fn record_new_in(&self, file: FileNumber, size: u64) {
        let summary = self.entry(file);
        summary.total_count.fetch_add(1, Ordering::AcqRel);
        summary.total_size.fetch_add(size, Ordering::AcqRel);
        summary.total_in_count.fetch_add(1, Ordering::AcqRel);
        summary.total_in_size.fetch_add(size, Ordering::AcqRel);
    }

    pub fn record_new_other(&self, file: FileNumber, size: u64) {
        let summary = self.entry(file);
        summary.total_count.fetch_add(1, Ordering::AcqRel);
        summary.total_size.fetch_add(size, Ordering::AcqRel);
    }

    /// Called by application threads as they overwrite/delete an LN (spec
    /// §5 "application threads interact with [the cleaner] only through the
    /// UtilizationProfile").
    pub fn mark_ln_obsolete(&self, file: FileNumber, size: u64) {
        let summary = self.entry(file);
        summary.obsolete_ln_count.fetch_add(1, Ordering::AcqRel);
        summary.obsolete_ln_size.fetch_add(size, Ordering::AcqRel);
    }

    pub fn mark_in_obsolete(&self, file: FileNumber) {
        let summary = self.entry(file);
        summary.obsolete_in_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Zeroes out `file`'s contribution after a successful clean (spec §3
    /// invariants: "the file's contribution to the UtilizationProfile is
    /// zero").
    pub fn reset_file(&self, file: FileNumber) {
        self.files.write().insert(file, Arc::new(FileSummary::default()));
    }

    pub fn remove_file(&self, file: FileNumber) {
        self.files.write().remove(&file);
    }
}
