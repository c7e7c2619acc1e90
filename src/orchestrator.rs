//! Ties every component into the per-file run lifecycle and the four
//! operations exposed to a host (spec §4.6, §6 "Exposed to collaborators").
//!
//! Grounded on the teacher's top-level `buffer_usage` driver
//! (`disk_v2::Buffer::maintenance`): a small stateful struct owning every
//! collaborator handle plus the process-wide trackers, with one method per
//! externally triggerable action, each of which acquires only what it needs
//! and returns promptly so a host can call it from its own scheduling loop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use crate::collaborators::Collaborators;
use crate::config::CleanerConfig;
use crate::counters::{RunCounters, SharedCounters};
use crate::db_cache::DbCache;
use crate::entry::EntryCategory;
use crate::error::CleanerError;
use crate::expiration_tracker::ExpirationTracker;
use crate::file_protector::FileProtector;
use crate::file_selector::{FileSelector, VsnRange};
use crate::classifier::{Classification, Classifier, DecodedPayload, LiveEntry, ObsoleteReason};
use crate::in_migrator::{InMigrator, InOutcome};
use crate::ln_migrator::{LnMigrator, LnOutcome};
use crate::lookahead_cache::{LookAheadCache, PendingMigration};
use crate::log_reader::{LogReader, PayloadCodec};
use crate::lsn::{FileNumber, Lsn};
use crate::obsolete_index::ObsoleteIndex;
use crate::pending::{PendingLn, PendingLnQueue};
use crate::utilization_profile::UtilizationProfile;

/// Rate-limits the per-file run-summary trace to at most one line per
/// window, folding everything in between into a suppressed-count instead of
/// emitting one trace per classified entry (DESIGN NOTES §9: "rate-limited
/// logging of cleaner traces"). A window is tracked per orchestrator, not
/// per file, since a host cleaning many small files back-to-back is exactly
/// the case this guards against.
pub struct RunTraceCoalescer {
    min_interval: Duration,
    last_emit: Mutex<Option<Instant>>,
    suppressed: AtomicU64,
}

impl RunTraceCoalescer {
    pub fn new(min_interval: Duration) -> Self {
        RunTraceCoalescer {
            min_interval,
            last_emit: Mutex::new(None),
            suppressed: AtomicU64::new(0),
        }
    }

    /// Emits a `tracing::debug!` summary for `file`'s completed run, unless
    /// one was already emitted within `min_interval`, in which case the
    /// summary is silently counted instead.
    pub fn note_run(&self, file: FileNumber, run: &RunCounters) {
        let mut last_emit = self.last_emit.lock();
        let now = Instant::now();
        let should_emit = match *last_emit {
            Some(last) => now.duration_since(last) >= self.min_interval,
            None => true,
        };
        if should_emit {
            let suppressed = self.suppressed.swap(0, Ordering::Relaxed);
            tracing::debug!(
                file,
                migrated = run.ln_migrated,
                dead = run.ln_dead,
                obsolete = run.ln_obsolete,
                expired = run.ln_expired,
                locked = run.ln_locked,
                in_dirtied = run.in_dirtied,
                bin_delta_dirtied = run.bin_delta_dirtied,
                suppressed_traces = suppressed,
                "cleaner run summary"
            );
            *last_emit = Some(now);
        } else {
            self.suppressed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Classifies a `FileManager::read_file` failure as `FileNotFound` when the
/// file vanished out from under the scan, else a generic `Io` error, so
/// `do_clean`'s `ErrorClass::FileMissing` branch actually catches the case it
/// names (spec §8 "Boundary behaviors": file deleted mid-scan).
fn read_error(file: FileNumber, source: std::io::Error) -> crate::error::LogReaderError {
    if source.kind() == std::io::ErrorKind::NotFound {
        crate::error::LogReaderError::FileNotFound { file, source }
    } else {
        crate::error::LogReaderError::Io { file, source }
    }
}

/// Outcome of one `do_clean` invocation, for a host's own logging/metrics.
#[derive(Clone, Copy, Debug, Default)]
pub struct CleanOutcome {
    pub files_cleaned: u32,
}

/// The cleaner's top-level state, generic over the collaborator bundle `C`
/// and the payload codec `D` a host supplies for its own wire format.
pub struct Orchestrator<C: Collaborators, D: PayloadCodec> {
    collaborators: C,
    codec: D,
    config: CleanerConfig,
    utilization: UtilizationProfile,
    selector: FileSelector,
    protector: FileProtector,
    pending: PendingLnQueue,
    counters: SharedCounters,
    trace_coalescer: RunTraceCoalescer,
    obsolete_indexes: RwLock<HashMap<FileNumber, Arc<ObsoleteIndex>>>,
    closing: AtomicBool,
    /// Byte threshold past which `manage_disk_usage` starts condemning
    /// reserved files even if nothing else triggered a clean. Spec §7 names
    /// a `DISK_LIMIT` error class but no config option controls the
    /// threshold that trips it; this field is the implementer's addition
    /// (documented in DESIGN.md).
    disk_limit_bytes: Option<u64>,
}

impl<C: Collaborators, D: PayloadCodec> Orchestrator<C, D> {
    pub fn new(
        collaborators: C,
        codec: D,
        config: CleanerConfig,
        initial_active_files: impl IntoIterator<Item = (FileNumber, u64)>,
        disk_limit_bytes: Option<u64>,
    ) -> Self {
        let trace_coalescer = RunTraceCoalescer::new(Duration::from_secs(60));
        Orchestrator {
            collaborators,
            codec,
            config,
            utilization: UtilizationProfile::new(),
            selector: FileSelector::new(),
            protector: FileProtector::new(initial_active_files),
            pending: PendingLnQueue::new(),
            counters: SharedCounters::new(),
            trace_coalescer,
            obsolete_indexes: RwLock::new(HashMap::new()),
            closing: AtomicBool::new(false),
            disk_limit_bytes,
        }
    }

    pub fn config(&self) -> &CleanerConfig {
        &self.config
    }

    pub fn counters(&self) -> &SharedCounters {
        &self.counters
    }

    pub fn protector(&self) -> &FileProtector {
        &self.protector
    }

    pub fn utilization(&self) -> &UtilizationProfile {
        &self.utilization
    }

    pub fn request_close(&self) {
        self.closing.store(true, Ordering::Release);
    }

    /// Application-thread-facing hook: records that the entry at `(file,
    /// offset)` just became obsolete, updating both the per-file obsolete
    /// index the classifier consults and the persisted utilization counters
    /// (spec §5: "application threads interact with the cleaner only
    /// through the UtilizationProfile").
    pub fn note_obsolete(&self, file: FileNumber, offset: u32, category: EntryCategory, size: u64) {
        self.obsolete_index_for(file).mark_obsolete(offset);
        match category {
            EntryCategory::Ln => self.utilization.mark_ln_obsolete(file, size),
            EntryCategory::In | EntryCategory::BinDelta => self.utilization.mark_in_obsolete(file),
            _ => {}
        }
    }

    fn obsolete_index_for(&self, file: FileNumber) -> Arc<ObsoleteIndex> {
        if let Some(index) = self.obsolete_indexes.read().get(&file) {
            return Arc::clone(index);
        }
        Arc::clone(
            self.obsolete_indexes
                .write()
                .entry(file)
                .or_insert_with(|| Arc::new(ObsoleteIndex::new())),
        )
    }

    /// Spec §6 `addPendingLN(lsn, info)`.
    pub fn add_pending_ln(&self, lsn: Lsn, db_id: u32, payload: crate::entry::LnPayload, vsn: Option<u64>) {
        self.pending.add(lsn, PendingLn { db_id, payload, vsn });
    }

    /// Spec §6 count-only pass used by two-pass cleaning and by hosts
    /// wanting an expiration estimate without committing to a clean.
    pub fn count_expiration(&self, file: FileNumber, now_secs: u64) -> Result<ExpirationTracker, CleanerError> {
        let data = self
            .collaborators
            .file_manager()
            .read_file(file)
            .map_err(|source| CleanerError::from(read_error(file, source)))?;
        let is_tail = self.is_tail_file(file);
        let mut reader = LogReader::new(file, &data, true, is_tail);
        let mut tracker = ExpirationTracker::empty();

        while let Some(raw) = reader.next_entry()? {
            if raw.entry.header.category != EntryCategory::Ln {
                continue;
            }
            if let Ok(ln) = self.codec.decode_ln(raw.payload) {
                if let Some(expiration) = ln.expiration_time {
                    if expiration > now_secs {
                        tracker.add(expiration, ln.last_logged_size as u64);
                    }
                }
            }
        }

        self.collaborators
            .expiration_profile()
            .put_file(file, tracker.clone());
        Ok(tracker)
    }

    fn is_tail_file(&self, file: FileNumber) -> bool {
        self.collaborators
            .file_manager()
            .all_file_numbers()
            .into_iter()
            .max()
            .is_some_and(|tail| tail == file)
    }

    /// Spec §4.6 per-file run lifecycle, steps 1-8. Note: step 4's
    /// "acquire a concurrency permit from the task coordinator" is
    /// deliberately omitted — no such collaborator is named among spec §6's
    /// interfaces, and inventing one would be speculative (documented in
    /// DESIGN.md).
    pub fn do_clean(
        &self,
        clean_multiple: bool,
        force: bool,
        now_secs: u64,
    ) -> Result<CleanOutcome, CleanerError> {
        let mut outcome = CleanOutcome::default();
        loop {
            if self.closing.load(Ordering::Acquire) {
                break;
            }

            self.manage_disk_usage(force)?;
            self.process_pending(now_secs)?;

            let candidate = self.selector.select_candidate(
                &self.utilization,
                &self.protector,
                self.collaborators.expiration_profile(),
                &self.config,
            );
            let Some(candidate) = candidate else {
                break;
            };

            if let Some(two_pass) = candidate.two_pass {
                // Pass 1: a read-only rescan to fold fresh expiration data
                // into the profile before committing to a full clean (spec
                // §4.8). `count_expiration` merges the tracker via
                // `ExpirationProfileSink::put_file` as a side effect, so a
                // file revised away here is naturally excluded from the next
                // `select_candidate` call once its persisted utilization
                // reflects the merge.
                match self.count_expiration(candidate.file, now_secs) {
                    Ok(tracker) => {
                        let expired = tracker.expired_bytes_as_of(now_secs);
                        let snapshot = self.utilization.snapshot(candidate.file);
                        let revised = snapshot.utilization(expired);
                        if revised >= two_pass.required_utilization {
                            tracing::debug!(
                                file = candidate.file,
                                revised_utilization = revised,
                                required = two_pass.required_utilization,
                                "cleaner two-pass revisal: file improved, skipping pass 2"
                            );
                            continue;
                        }
                    }
                    Err(err) if err.class() == crate::error::ErrorClass::FileMissing => {
                        self.utilization.remove_file(candidate.file);
                        self.collaborators
                            .expiration_profile()
                            .remove_file(candidate.file);
                        continue;
                    }
                    Err(err) => return Err(err),
                }
            }

            self.selector.mark_in_flight(candidate.file);
            let result = self.clean_one_file(candidate.file, now_secs);
            match result {
                Ok(vsn_range) => {
                    self.selector.mark_cleaned(candidate.file, vsn_range);
                    self.counters.note_file_cleaned();
                    outcome.files_cleaned += 1;
                }
                Err(err) if err.class() == crate::error::ErrorClass::FileMissing => {
                    // The file vanished out from under us; scrub it and move on
                    // (spec §7, §8 "Boundary behaviors").
                    self.selector.unmark_in_flight(candidate.file);
                    self.utilization.remove_file(candidate.file);
                    self.collaborators
                        .expiration_profile()
                        .remove_file(candidate.file);
                }
                Err(err) => {
                    self.selector.unmark_in_flight(candidate.file);
                    return Err(err);
                }
            }

            if !clean_multiple {
                break;
            }
        }
        Ok(outcome)
    }

    fn clean_one_file(&self, file: FileNumber, now_secs: u64) -> Result<VsnRange, CleanerError> {
        let data = self
            .collaborators
            .file_manager()
            .read_file(file)
            .map_err(|source| CleanerError::from(read_error(file, source)))?;
        let is_tail = self.is_tail_file(file);
        let mut reader = LogReader::new(file, &data, false, is_tail);

        let mut run = RunCounters::new();
        let mut vsn_range = VsnRange::default();
        let mut db_cache = DbCache::new(self.config.db_cache_clear_count as u64);
        let obsolete_index = self.obsolete_index_for(file);
        let mut obsolete_cursor = obsolete_index.snapshot();
        let mut look_ahead = LookAheadCache::new(self.config.look_ahead_cache_size as u64);

        while let Some(raw) = reader.next_entry()? {
            let lsn = raw.entry.lsn;
            let offset = lsn.offset();
            if let Some(vsn) = raw.entry.header.vsn {
                vsn_range.first_vsn.get_or_insert(vsn);
                vsn_range.last_vsn = Some(vsn);
            }

            let category = raw.entry.header.category;
            let decoded = self.decode(category, raw.payload)?;

            let mut classifier = Classifier {
                obsolete_cursor: &mut obsolete_cursor,
                db_cache: &mut db_cache,
                db_directory: self.collaborators.db_directory(),
                extinction_filter: self.collaborators.extinction_filter(),
                lock_manager: self.collaborators.lock_manager(),
                config: &self.config,
            };
            let classification = classifier.classify(lsn, offset, category, &decoded, now_secs)?;

            self.handle_classification(
                lsn,
                category,
                raw.entry.header.vsn,
                classification,
                decoded,
                &mut run,
                &mut look_ahead,
            );

            if look_ahead.is_full() {
                self.drain_look_ahead(file, &mut look_ahead, &mut db_cache, &mut run)?;
            }
        }
        self.drain_look_ahead(file, &mut look_ahead, &mut db_cache, &mut run)?;

        self.counters.fold_in(&run);
        self.trace_coalescer.note_run(file, &run);
        self.utilization.reset_file(file);
        self.protector.reserve_file(file, vsn_range.last_vsn)?;

        Ok(vsn_range)
    }

    fn decode(&self, category: EntryCategory, payload: &[u8]) -> Result<DecodedPayload, CleanerError> {
        let decoded = match category {
            EntryCategory::Ln => DecodedPayload::Ln(self.codec.decode_ln(payload)?),
            EntryCategory::In => DecodedPayload::In(self.codec.decode_in(payload)?),
            EntryCategory::BinDelta => DecodedPayload::BinDelta(self.codec.decode_bin_delta(payload)?),
            _ => DecodedPayload::Other,
        };
        Ok(decoded)
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_classification(
        &self,
        lsn: Lsn,
        category: EntryCategory,
        vsn: Option<u64>,
        classification: Classification,
        decoded: DecodedPayload,
        run: &mut RunCounters,
        look_ahead: &mut LookAheadCache,
    ) {
        match classification {
            Classification::Obsolete(reason) => {
                self.count_obsolete(category, reason, run);
            }
            Classification::ExpiredInexact => {
                run.ln_expired += 1;
            }
            Classification::Pending => {
                run.ln_locked += 1;
                // Only the LN expiration check (spec §4.3 step 4c) ever
                // returns Pending; queue it for the periodic pending sweep.
                if let DecodedPayload::Ln(payload) = decoded {
                    self.pending.add(
                        lsn,
                        PendingLn {
                            db_id: payload.db_id,
                            payload,
                            vsn,
                        },
                    );
                }
            }
            Classification::Live(LiveEntry::Ln(payload)) => {
                look_ahead.push(
                    lsn.offset(),
                    PendingMigration {
                        lsn,
                        db_id: payload.db_id,
                        payload,
                        vsn,
                    },
                );
            }
            Classification::Live(LiveEntry::In(payload)) => {
                let migrator = InMigrator {
                    btree: self.collaborators.btree(),
                };
                match migrator.migrate_full_in(lsn, payload) {
                    InOutcome::Dirtied => run.in_dirtied += 1,
                    InOutcome::Dead => run.in_dead += 1,
                }
            }
            Classification::Live(LiveEntry::BinDelta(payload)) => {
                let migrator = InMigrator {
                    btree: self.collaborators.btree(),
                };
                // BIN-deltas only ever describe leaf-level BINs (entry.rs
                // EntryCategory::BinDelta doc comment), so the level the
                // parent lookup needs is always 0.
                match migrator.migrate_bin_delta(lsn, payload, 0) {
                    InOutcome::Dirtied => run.bin_delta_dirtied += 1,
                    InOutcome::Dead => run.bin_delta_dead += 1,
                }
            }
            Classification::Live(LiveEntry::Other) => {
                // DbTree/FileHeader entries: live, never migrated (spec
                // §4.3 step 5).
                run.other_live += 1;
            }
        }
    }

    fn count_obsolete(&self, category: EntryCategory, reason: ObsoleteReason, run: &mut RunCounters) {
        match (category, reason) {
            (EntryCategory::Ln, ObsoleteReason::Extinct) => run.ln_extinct += 1,
            (EntryCategory::Ln, _) => run.ln_obsolete += 1,
            (EntryCategory::In, _) => run.in_obsolete += 1,
            (EntryCategory::BinDelta, _) => run.bin_delta_dead += 1,
            _ => {}
        }
    }

    fn drain_look_ahead(
        &self,
        file: FileNumber,
        look_ahead: &mut LookAheadCache,
        db_cache: &mut DbCache,
        run: &mut RunCounters,
    ) -> Result<(), CleanerError> {
        while let Some((_, pending)) = look_ahead.pop_lowest() {
            let mut migrator = LnMigrator {
                btree: self.collaborators.btree(),
                log_manager: self.collaborators.log_manager(),
                db_cache,
                db_directory: self.collaborators.db_directory(),
                lock_manager: self.collaborators.lock_manager(),
                current_file: file,
            };
            let (outcome, siblings) = migrator.migrate(
                pending.lsn,
                pending.db_id,
                pending.payload.clone(),
                pending.vsn,
                look_ahead,
            )?;
            match outcome {
                LnOutcome::Migrated => run.ln_migrated += 1,
                LnOutcome::Dead | LnOutcome::DeadSuperseded => run.ln_dead += 1,
                LnOutcome::Pending => {
                    run.ln_locked += 1;
                    self.pending.add(
                        pending.lsn,
                        PendingLn {
                            db_id: pending.db_id,
                            payload: pending.payload,
                            vsn: pending.vsn,
                        },
                    );
                }
            }
            self.fold_sibling_outcomes(siblings, run);
        }
        Ok(())
    }

    /// Folds the look-ahead optimization's sibling migrations into `run`,
    /// re-queuing any that came back contended exactly like the primary
    /// entry would be (spec §4.4 "Look-ahead optimization": a drained
    /// sibling is counted and retried the same way the entry that triggered
    /// the parent lookup is).
    fn fold_sibling_outcomes(&self, siblings: Vec<crate::ln_migrator::SiblingOutcome>, run: &mut RunCounters) {
        for sibling in siblings {
            match sibling.outcome {
                LnOutcome::Migrated => run.ln_migrated += 1,
                LnOutcome::Dead | LnOutcome::DeadSuperseded => run.ln_dead += 1,
                LnOutcome::Pending => {
                    run.ln_locked += 1;
                    self.pending.add(
                        sibling.lsn,
                        PendingLn {
                            db_id: sibling.db_id,
                            payload: sibling.payload,
                            vsn: sibling.vsn,
                        },
                    );
                }
            }
        }
    }

    /// Retries every queued pending LN once (spec §4.6 "Pending-LN queue":
    /// a periodic sweep re-probes each one). Outcomes are folded straight
    /// into `SharedCounters` rather than a per-file `RunCounters`, since a
    /// pending entry's retry is not attributed to any one file pass (spec
    /// §8 S3: "subsequent processPending counts it dead").
    fn process_pending(&self, _now_secs: u64) -> Result<(), CleanerError> {
        let mut run = RunCounters::new();
        for (lsn, entry) in self.pending.snapshot() {
            let mut db_cache = DbCache::new(self.config.db_cache_clear_count as u64);
            let mut look_ahead = LookAheadCache::new(self.config.look_ahead_cache_size as u64);
            let mut migrator = LnMigrator {
                btree: self.collaborators.btree(),
                log_manager: self.collaborators.log_manager(),
                db_cache: &mut db_cache,
                db_directory: self.collaborators.db_directory(),
                lock_manager: self.collaborators.lock_manager(),
                current_file: lsn.file(),
            };
            let (outcome, siblings) = migrator.migrate(
                lsn,
                entry.db_id,
                entry.payload.clone(),
                entry.vsn,
                &mut look_ahead,
            )?;
            match outcome {
                LnOutcome::Migrated => run.ln_migrated += 1,
                LnOutcome::Dead | LnOutcome::DeadSuperseded => run.ln_dead += 1,
                LnOutcome::Pending => {
                    self.fold_sibling_outcomes(siblings, &mut run);
                    continue;
                }
            }
            self.pending.remove(lsn);
            self.fold_sibling_outcomes(siblings, &mut run);
        }
        self.counters.fold_in(&run);
        Ok(())
    }

    /// Spec §6 `manageDiskUsage`: condemns and deletes reserved, unprotected
    /// files once the disk usage threshold is crossed. `force` mirrors spec
    /// §4.6 step 1 / §7: a daemon caller (`force == false`) just stops once
    /// condemnation is exhausted, but an explicit caller (`force == true`)
    /// must fail with `DISK_LIMIT` if the limit is still violated.
    pub fn manage_disk_usage(&self, force: bool) -> Result<(), CleanerError> {
        let Some(limit) = self.disk_limit_bytes else {
            return Ok(());
        };
        let mut last_file = None;
        loop {
            let stats = self.protector.get_log_size_stats();
            let used = stats.active_total + stats.reserved_total - stats.protected_total;
            if used <= limit {
                return Ok(());
            }
            let Some((file, size)) = self.protector.take_next_condemned_file(0) else {
                return if force {
                    Err(CleanerError::DiskLimit {
                        file: last_file.unwrap_or(0),
                    })
                } else {
                    Ok(())
                };
            };
            last_file = Some(file);
            match self.collaborators.file_manager().delete_file(file) {
                Ok(()) => {
                    self.utilization.remove_file(file);
                    self.collaborators.expiration_profile().remove_file(file);
                }
                Err(_) => {
                    // Unlink failed (e.g. Windows-style file locking by an
                    // open reader); reintroduce the file for a later retry.
                    self.protector.put_back_condemned_file(file, size);
                    return if force {
                        Err(CleanerError::DiskLimit { file })
                    } else {
                        Ok(())
                    };
                }
            }
        }
    }
}
