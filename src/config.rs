//! Cleaner configuration (spec §6: "Tuning is via a small set of named
//! configuration options").
//!
//! Follows the teacher's config shape
//! (`disk_v2::common::DiskBufferConfig`/`DiskBufferConfigBuilder`): an
//! explicit `Option<T>`-bearing builder that fills in defaults in `.build()`.
//! Loading these values from a file or environment is a host concern (spec
//! §1 Non-goals); this module only owns the typed, validated struct.

use std::time::Duration;

use serde::Deserialize;

/// Default byte-interval between daemon wake-ups (spec §4.6 wake-up policy).
pub const DEFAULT_BYTES_INTERVAL: u64 = 100 * 1024 * 1024;
/// Default timed wake-up interval.
pub const DEFAULT_WAKEUP_INTERVAL: Duration = Duration::from_secs(30);
/// Default utilization threshold below which a file becomes a clean
/// candidate.
pub const DEFAULT_MIN_UTILIZATION: f64 = 0.5;
/// Default per-file utilization floor used by the two-pass efficiency check.
pub const DEFAULT_MIN_FILE_UTILIZATION: f64 = 0.4;
/// Default look-ahead cache byte budget.
pub const DEFAULT_LOOK_AHEAD_CACHE_SIZE: usize = 8 * 1024 * 1024;
/// Default number of entries processed between `DbCache` releases.
pub const DEFAULT_DB_CACHE_CLEAR_COUNT: u32 = 400;
/// Default read buffer size used by `LogReader`.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 128 * 1024;
/// Default grace period past expiration before an LN is purge-eligible.
pub const DEFAULT_TTL_LN_PURGE_DELAY: Duration = Duration::from_secs(24 * 3600);
/// Default maximum assumed transaction duration (bounds expiration
/// look-back, spec §4.3 step 4c).
pub const DEFAULT_TTL_MAX_TXN_TIME: Duration = Duration::from_secs(24 * 3600);
/// Default allowed clock skew when evaluating expiration.
pub const DEFAULT_TTL_CLOCK_TOLERANCE: Duration = Duration::from_secs(5 * 60);
/// Default number of deadlock-victim retries before giving up on a single
/// migration attempt.
pub const DEFAULT_DEADLOCK_RETRIES: u32 = 3;

/// Validated, immutable cleaner configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct CleanerConfig {
    pub bytes_interval: u64,
    pub wakeup_interval: Duration,
    pub min_utilization: f64,
    pub min_file_utilization: f64,
    pub look_ahead_cache_size: usize,
    pub db_cache_clear_count: u32,
    pub read_buffer_size: usize,
    pub ttl_ln_purge_delay: Duration,
    pub ttl_max_txn_time: Duration,
    pub ttl_clock_tolerance: Duration,
    pub deadlock_retries: u32,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        CleanerConfigBuilder::default().build()
    }
}

/// Host-facing, `serde`-deserializable view of the same options, named after
/// the dotted keys in spec §6 so a host's config file can map directly onto
/// this struct's field names via `#[serde(rename = "...")]`-free snake_case.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CleanerConfigInput {
    pub cleaner_bytes_interval: Option<u64>,
    pub cleaner_wakeup_interval_secs: Option<u64>,
    pub cleaner_min_utilization: Option<f64>,
    pub cleaner_min_file_utilization: Option<f64>,
    pub cleaner_look_ahead_cache_size: Option<usize>,
    pub cleaner_db_cache_clear_count: Option<u32>,
    pub cleaner_read_buffer_size: Option<usize>,
    pub ttl_ln_purge_delay_secs: Option<u64>,
    pub ttl_max_txn_time_secs: Option<u64>,
    pub ttl_clock_tolerance_secs: Option<u64>,
    pub cleaner_deadlock_retries: Option<u32>,
}

impl Default for CleanerConfigInput {
    fn default() -> Self {
        CleanerConfigInput {
            cleaner_bytes_interval: None,
            cleaner_wakeup_interval_secs: None,
            cleaner_min_utilization: None,
            cleaner_min_file_utilization: None,
            cleaner_look_ahead_cache_size: None,
            cleaner_db_cache_clear_count: None,
            cleaner_read_buffer_size: None,
            ttl_ln_purge_delay_secs: None,
            ttl_max_txn_time_secs: None,
            ttl_clock_tolerance_secs: None,
            cleaner_deadlock_retries: None,
        }
    }
}

impl CleanerConfigInput {
    pub fn into_builder(self) -> CleanerConfigBuilder {
        let mut b = CleanerConfigBuilder::default();
        if let Some(v) = self.cleaner_bytes_interval {
            b = b.bytes_interval(v);
        }
        if let Some(v) = self.cleaner_wakeup_interval_secs {
            b = b.wakeup_interval(Duration::from_secs(v));
        }
        if let Some(v) = self.cleaner_min_utilization {
            b = b.min_utilization(v);
        }
        if let Some(v) = self.cleaner_min_file_utilization {
            b = b.min_file_utilization(v);
        }
        if let Some(v) = self.cleaner_look_ahead_cache_size {
            b = b.look_ahead_cache_size(v);
        }
        if let Some(v) = self.cleaner_db_cache_clear_count {
            b = b.db_cache_clear_count(v);
        }
        if let Some(v) = self.cleaner_read_buffer_size {
            b = b.read_buffer_size(v);
        }
        if let Some(v) = self.ttl_ln_purge_delay_secs {
            b = b.ttl_ln_purge_delay(Duration::from_secs(v));
        }
        if let Some(v) = self.ttl_max_txn_time_secs {
            b = b.ttl_max_txn_time(Duration::from_secs(v));
        }
        if let Some(v) = self.ttl_clock_tolerance_secs {
            b = b.ttl_clock_tolerance(Duration::from_secs(v));
        }
        if let Some(v) = self.cleaner_deadlock_retries {
            b = b.deadlock_retries(v);
        }
        b
    }
}

/// Builder for [`CleanerConfig`].
#[derive(Default)]
pub struct CleanerConfigBuilder {
    bytes_interval: Option<u64>,
    wakeup_interval: Option<Duration>,
    min_utilization: Option<f64>,
    min_file_utilization: Option<f64>,
    look_ahead_cache_size: Option<usize>,
    db_cache_clear_count: Option<u32>,
    read_buffer_size: Option<usize>,
    ttl_ln_purge_delay: Option<Duration>,
    ttl_max_txn_time: Option<Duration>,
    ttl_clock_tolerance: Option<Duration>,
    deadlock_retries: Option<u32>,
}

impl CleanerConfigBuilder {
    pub fn bytes_interval(mut self, v: u64) -> Self {
        self.bytes_interval = Some(v);
        self
    }

    pub fn wakeup_interval(mut self, v: Duration) -> Self {
        self.wakeup_interval = Some(v);
        self
    }

    pub fn min_utilization(mut self, v: f64) -> Self {
        self.min_utilization = Some(v);
        self
    }

    pub fn min_file_utilization(mut self, v: f64) -> Self {
        self.min_file_utilization = Some(v);
        self
    }

    pub fn look_ahead_cache_size(mut self, v: usize) -> Self {
        self.look_ahead_cache_size = Some(v);
        self
    }

    pub fn db_cache_clear_count(mut self, v: u32) -> Self {
        self.db_cache_clear_count = Some(v);
        self
    }

    pub fn read_buffer_size(mut self, v: usize) -> Self {
        self.read_buffer_size = Some(v);
        self
    }

    pub fn ttl_ln_purge_delay(mut self, v: Duration) -> Self {
        self.ttl_ln_purge_delay = Some(v);
        self
    }

    pub fn ttl_max_txn_time(mut self, v: Duration) -> Self {
        self.ttl_max_txn_time = Some(v);
        self
    }

    pub fn ttl_clock_tolerance(mut self, v: Duration) -> Self {
        self.ttl_clock_tolerance = Some(v);
        self
    }

    pub fn deadlock_retries(mut self, v: u32) -> Self {
        self.deadlock_retries = Some(v);
        self
    }

    pub fn build(self) -> CleanerConfig {
        CleanerConfig {
            bytes_interval: self.bytes_interval.unwrap_or(DEFAULT_BYTES_INTERVAL),
            wakeup_interval: self.wakeup_interval.unwrap_or(DEFAULT_WAKEUP_INTERVAL),
            min_utilization: self.min_utilization.unwrap_or(DEFAULT_MIN_UTILIZATION),
            min_file_utilization: self
                .min_file_utilization
                .unwrap_or(DEFAULT_MIN_FILE_UTILIZATION),
            look_ahead_cache_size: self
                .look_ahead_cache_size
                .unwrap_or(DEFAULT_LOOK_AHEAD_CACHE_SIZE),
            db_cache_clear_count: self
                .db_cache_clear_count
                .unwrap_or(DEFAULT_DB_CACHE_CLEAR_COUNT),
            read_buffer_size: self.read_buffer_size.unwrap_or(DEFAULT_READ_BUFFER_SIZE),
            ttl_ln_purge_delay: self
                .ttl_ln_purge_delay
                .unwrap_or(DEFAULT_TTL_LN_PURGE_DELAY),
            ttl_max_txn_time: self.ttl_max_txn_time.unwrap_or(DEFAULT_TTL_MAX_TXN_TIME),
            ttl_clock_tolerance: self
                .ttl_clock_tolerance
                .unwrap_or(DEFAULT_TTL_CLOCK_TOLERANCE),
            deadlock_retries: self.deadlock_retries.unwrap_or(DEFAULT_DEADLOCK_RETRIES),
        }
    }
}
