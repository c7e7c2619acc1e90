//! Per-file expiration histogram (spec §3, §4.8).
//!
//! Produced during a read-only pass-1 scan: a histogram of bytes that will
//! expire, bucketed by expiration time, so that "bytes expired as of now"
//! can be recomputed cheaply later without re-reading the file (spec §4.8
//! rationale).

use std::collections::BTreeMap;

/// Bucket granularity for the expiration histogram. Expiration times are
/// rounded down to the bucket they fall in; this bounds the histogram's
/// size regardless of how many distinct expiration timestamps a file
/// contains.
const BUCKET_SECS: u64 = 3600;

/// Histogram of bytes-by-expiration-time for one file, merged into the
/// `ExpirationProfile` collaborator once a two-pass scan completes (spec
/// §4.8).
#[derive(Clone, Debug, Default)]
pub struct ExpirationTracker {
    buckets: BTreeMap<u64, u64>,
    total_tracked_bytes: u64,
}

impl ExpirationTracker {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Records that `size` bytes will expire at `expiration_time_secs`.
    pub fn add(&mut self, expiration_time_secs: u64, size: u64) {
        let bucket = expiration_time_secs - (expiration_time_secs % BUCKET_SECS);
        *self.buckets.entry(bucket).or_insert(0) += size;
        self.total_tracked_bytes += size;
    }

    pub fn merge(&mut self, other: &ExpirationTracker) {
        for (&bucket, &size) in &other.buckets {
            *self.buckets.entry(bucket).or_insert(0) += size;
        }
        self.total_tracked_bytes += other.total_tracked_bytes;
    }

    /// Total bytes tracked across all buckets, regardless of whether they
    /// have expired yet.
    pub fn total_tracked_bytes(&self) -> u64 {
        self.total_tracked_bytes
    }

    /// Bytes that have expired as of `now_secs` (spec §4.8: "the tracker's
    /// expired-bytes total as of the current system time").
    pub fn expired_bytes_as_of(&self, now_secs: u64) -> u64 {
        self.buckets
            .range(..=now_secs)
            .map(|(_, &size)| size)
            .sum()
    }
}
