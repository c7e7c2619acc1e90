//! Per-entry classification pipeline (spec §4.3).
//!
//! Mirrors the teacher's `disk_v2::reader` decode-then-dispatch loop, but
//! classifying instead of deserializing: each streamed entry is resolved to
//! exactly one outcome — obsolete (with a sub-reason, for counters),
//! deferred pending a contended lock, or live (to be handed to the LN or IN
//! migrator). Order matters; steps below follow the classification order
//! exactly, each one a short-circuit.

use crate::collaborators::{DbDirectory, ExtinctionFilter, ExtinctionStatus, LockManager, LockRequestOutcome};
use crate::config::CleanerConfig;
use crate::db_cache::DbCache;
use crate::entry::{BinDeltaPayload, EntryCategory, InPayload, LnPayload};
use crate::error::CleanerError;
use crate::lsn::Lsn;
use crate::obsolete_index::ObsoleteCursor;

/// Why an entry was classified obsolete, tracked so per-run counters can
/// break obsolete counts out by sub-category (spec §4.3: "Obsolete entries
/// are counted by sub-category").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObsoleteReason {
    /// Step 1: offset was already known obsolete.
    KnownOffset,
    /// Step 2: not a node-type entry at all.
    NonNodeCategory,
    /// Step 3: the owning DB is deleted or deleting.
    DbDeletedOrDeleting,
    /// Step 4a: LN carries a deletion (tombstone) marker.
    DeletionMarker,
    /// Step 4b: DB is "LNs immediately obsolete", or the LN is embedded in
    /// its parent slot.
    ImmediatelyObsolete,
    /// Step 4d: the extinction filter reported `EXTINCT`.
    Extinct,
}

/// An entry classified as live, carrying its decoded payload for the
/// migrator to act on.
#[derive(Clone, Debug)]
pub enum LiveEntry {
    Ln(LnPayload),
    In(InPayload),
    BinDelta(BinDeltaPayload),
    /// A DbTree/FileHeader entry (spec §4.3 step 2: these categories are
    /// excluded from the non-node-type obsolete filter and reach step 5).
    /// The cleaner never rewrites or migrates these; they're simply counted
    /// as live in place.
    Other,
}

/// The decoded payload of one streamed entry, as produced by the
/// `LogManager`/`LogReader` layer. Entries outside {LN, IN, BIN_DELTA} never
/// reach the classifier with a meaningful payload; `Other` covers them.
#[derive(Clone, Debug)]
pub enum DecodedPayload {
    Ln(LnPayload),
    In(InPayload),
    BinDelta(BinDeltaPayload),
    Other,
}

/// Outcome of classifying one streamed entry.
#[derive(Clone, Debug)]
pub enum Classification {
    Obsolete(ObsoleteReason),
    /// Counted expired inexactly: the entry's bytes are not tracked by
    /// offset, only by count (spec §4.3 step 4c, Open Questions — this
    /// count is never fed back into the persisted UtilizationProfile).
    ExpiredInexact,
    /// A non-blocking lock probe on the LN's LSN was contended; deferred to
    /// the pending-LN queue (spec §4.3 step 4c, §4.6).
    Pending,
    Live(LiveEntry),
}

/// Per-file classification state: the obsolete-offset cursor and DB cache,
/// both thread-confined to one file pass (spec §5).
pub struct Classifier<'a> {
    pub obsolete_cursor: &'a mut ObsoleteCursor,
    pub db_cache: &'a mut DbCache,
    pub db_directory: &'a dyn DbDirectory,
    pub extinction_filter: &'a dyn ExtinctionFilter,
    pub lock_manager: &'a dyn LockManager,
    pub config: &'a CleanerConfig,
}

impl<'a> Classifier<'a> {
    pub fn classify(
        &mut self,
        lsn: Lsn,
        offset: u32,
        category: EntryCategory,
        payload: &DecodedPayload,
        now_secs: u64,
    ) -> Result<Classification, CleanerError> {
        // Step 1: known-obsolete offset.
        if self.obsolete_cursor.advance_and_check(offset) {
            return Ok(Classification::Obsolete(ObsoleteReason::KnownOffset));
        }

        // Step 2: category filter.
        if !category.is_node_type() {
            return Ok(Classification::Obsolete(ObsoleteReason::NonNodeCategory));
        }

        // Step 3: DB deleted/deleting. This is the first of the two checks
        // described in spec §4.2's Open Questions (`DbCache.getDbInfo`); the
        // second, authoritative check happens in the migrator immediately
        // before a migrated copy is actually written, via
        // `DbCache::revalidate`.
        let db_id = match payload {
            DecodedPayload::Ln(ln) => Some(ln.db_id),
            DecodedPayload::In(node) => Some(node.db_id),
            DecodedPayload::BinDelta(delta) => Some(delta.db_id),
            DecodedPayload::Other => None,
        };
        let db_meta = if let Some(db_id) = db_id {
            let info = self.db_cache.get_info(db_id, self.db_directory);
            self.db_cache.note_entry_processed();
            match info {
                Some(info) if info.deleted || info.deleting => {
                    return Ok(Classification::Obsolete(ObsoleteReason::DbDeletedOrDeleting));
                }
                Some(info) => Some(info.meta),
                None => {
                    return Ok(Classification::Obsolete(ObsoleteReason::DbDeletedOrDeleting));
                }
            }
        } else {
            None
        };

        // Step 4: LN-specific checks.
        if let DecodedPayload::Ln(ln) = payload {
            let meta = db_meta.as_ref().expect("LN payload implies a resolved db_id");

            if ln.is_deletion {
                return Ok(Classification::Obsolete(ObsoleteReason::DeletionMarker));
            }

            if meta.lns_immediately_obsolete || ln.embedded {
                return Ok(Classification::Obsolete(ObsoleteReason::ImmediatelyObsolete));
            }

            if let Some(expiration) = ln.expiration_time {
                let purge_delay = self.config.ttl_ln_purge_delay.as_secs();
                let within_purge_window =
                    now_secs >= expiration && now_secs <= expiration.saturating_add(purge_delay);
                if within_purge_window {
                    match self.lock_manager.non_blocking_lock(lsn, meta.db_id, false) {
                        LockRequestOutcome::Denied => {
                            return Ok(Classification::Pending);
                        }
                        LockRequestOutcome::Granted | LockRequestOutcome::AlreadyOwned => {
                            self.lock_manager.release(lsn);
                            return Ok(Classification::ExpiredInexact);
                        }
                    }
                }
            }

            let status = self.extinction_filter.extinction_status(
                &meta.name,
                meta.has_duplicates,
                &ln.key,
            );
            if status == ExtinctionStatus::Extinct {
                return Ok(Classification::Obsolete(ObsoleteReason::Extinct));
            }

            return Ok(Classification::Live(LiveEntry::Ln(ln.clone())));
        }

        // Step 5: live IN/BIN-delta/DbTree/FileHeader.
        match payload {
            DecodedPayload::In(node) => Ok(Classification::Live(LiveEntry::In(node.clone()))),
            DecodedPayload::BinDelta(delta) => {
                Ok(Classification::Live(LiveEntry::BinDelta(delta.clone())))
            }
            DecodedPayload::Other => {
                // DbTree/FileHeader entries carry no migratable payload; the
                // cleaner leaves them in place (they're never rewritten) but
                // still counts them live (spec §4.3 step 5).
                Ok(Classification::Live(LiveEntry::Other))
            }
            DecodedPayload::Ln(_) => unreachable!("handled above"),
        }
    }
}
