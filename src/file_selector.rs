//! File selection policy (spec §4.6 "Selection policy").
//!
//! Chooses which file the next cleaning run should target: the
//! highest-priority candidate whose adjusted utilization (tracked counters,
//! plus any known expired bytes) falls below the configured threshold,
//! excluding files already in-flight, already cleaned and awaiting
//! checkpoint, or not currently Active.

use std::collections::HashMap;
use std::collections::HashSet;

use parking_lot::Mutex;

use crate::collaborators::ExpirationProfileSink;
use crate::config::CleanerConfig;
use crate::file_protector::FileProtector;
use crate::lsn::FileNumber;
use crate::utilization_profile::UtilizationProfile;

/// A two-pass cleaning request: pass 1 recomputes utilization and compares
/// it against `required_utilization` before committing to a full clean
/// (spec §4.8).
#[derive(Clone, Copy, Debug)]
pub struct TwoPassRequest {
    pub required_utilization: f64,
}

/// One selected candidate.
#[derive(Clone, Copy, Debug)]
pub struct Candidate {
    pub file: FileNumber,
    pub two_pass: Option<TwoPassRequest>,
}

/// Records first/last VSN seen while cleaning a file, passed on to
/// `FileProtector::reserve_file` once the run completes.
#[derive(Clone, Copy, Debug, Default)]
pub struct VsnRange {
    pub first_vsn: Option<u64>,
    pub last_vsn: Option<u64>,
}

pub struct FileSelector {
    in_flight: Mutex<HashSet<FileNumber>>,
    cleaned_awaiting_checkpoint: Mutex<HashMap<FileNumber, VsnRange>>,
}

impl FileSelector {
    pub fn new() -> Self {
        FileSelector {
            in_flight: Mutex::new(HashSet::new()),
            cleaned_awaiting_checkpoint: Mutex::new(HashMap::new()),
        }
    }

    /// Picks the lowest-utilization Active file below `min_utilization`,
    /// excluding files already in-flight or already cleaned and awaiting a
    /// checkpoint (spec §4.6).
    pub fn select_candidate(
        &self,
        utilization: &UtilizationProfile,
        protector: &FileProtector,
        expiration: &dyn ExpirationProfileSink,
        config: &CleanerConfig,
    ) -> Option<Candidate> {
        let in_flight = self.in_flight.lock();
        let awaiting = self.cleaned_awaiting_checkpoint.lock();
        let active_files: HashSet<FileNumber> = protector.active_files().into_iter().collect();

        let mut best: Option<(FileNumber, f64)> = None;
        for file in utilization.all_files() {
            if !active_files.contains(&file) {
                continue;
            }
            if in_flight.contains(&file) || awaiting.contains_key(&file) {
                continue;
            }
            if protector.is_protected(file, false) {
                continue;
            }

            let expired = expiration.expired_bytes(file).unwrap_or(0);
            let snapshot = utilization.snapshot(file);
            let util = snapshot.utilization(expired);
            if util >= config.min_utilization {
                continue;
            }

            match best {
                Some((_, best_util)) if best_util <= util => {}
                _ => best = Some((file, util)),
            }
        }

        best.map(|(file, util)| Candidate {
            file,
            two_pass: two_pass_request(util, config),
        })
    }

    pub fn mark_in_flight(&self, file: FileNumber) {
        self.in_flight.lock().insert(file);
    }

    pub fn unmark_in_flight(&self, file: FileNumber) {
        self.in_flight.lock().remove(&file);
    }

    /// Records that `file` was fully cleaned and is waiting for a
    /// checkpoint before it can be reserved (spec §4.6 step 7: "Mark file
    /// cleaned in FileSelector").
    pub fn mark_cleaned(&self, file: FileNumber, vsn_range: VsnRange) {
        self.unmark_in_flight(file);
        self.cleaned_awaiting_checkpoint
            .lock()
            .insert(file, vsn_range);
    }

    pub fn take_cleaned_vsn_range(&self, file: FileNumber) -> Option<VsnRange> {
        self.cleaned_awaiting_checkpoint.lock().remove(&file)
    }

    pub fn is_in_flight(&self, file: FileNumber) -> bool {
        self.in_flight.lock().contains(&file)
    }
}

impl Default for FileSelector {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a candidate this far below threshold is worth a pass-1 revisal
/// scan first: close to the threshold, a stale estimate is common enough
/// that paying the read-only pass is worth it (spec §4.8 rationale).
fn two_pass_request(observed_utilization: f64, config: &CleanerConfig) -> Option<TwoPassRequest> {
    let margin = config.min_utilization - config.min_file_utilization;
    if margin > 0.0 && observed_utilization >= config.min_file_utilization {
        Some(TwoPassRequest {
            required_utilization: config.min_utilization,
        })
    } else {
        None
    }
}
