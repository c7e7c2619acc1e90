//! LN migration (spec §4.4).
//!
//! Given a live LN, locate its Btree slot, decide dead-vs-migrate by LSN
//! comparison, and if migrating, write a fresh copy at the log tail while
//! holding the parent latch and a non-blocking LSN lock. Also implements the
//! look-ahead optimization: once the parent latch for one slot is held,
//! other queued siblings in the same parent are migrated in the same batch.

use crate::collaborators::btree::{BinParent, Btree, ParentLookup};
use crate::collaborators::log_manager::{LogEntryToWrite, LogManager, ReplicationHint};
use crate::collaborators::{CacheMode, DbDirectory};
use crate::db_cache::DbCache;
use crate::entry::{EntryCategory, LnPayload};
use crate::error::CleanerError;
use crate::lookahead_cache::{LookAheadCache, PendingMigration};
use crate::lsn::Lsn;

/// Outcome of attempting to migrate one LN, for per-run counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LnOutcome {
    /// No parent found at all; the entry is dead.
    Dead,
    /// Parent found, but slot inspection shows this copy is superseded.
    DeadSuperseded,
    /// The record lock was contended; deferred to the pending queue.
    Pending,
    Migrated,
}

/// The outcome of migrating one look-ahead sibling, carried alongside
/// enough of the original entry to re-queue it if the outcome is
/// [`LnOutcome::Pending`] (spec §4.4 "Look-ahead optimization": a sibling
/// drained out of the cache is just as countable, and just as re-defer-able,
/// as the primary entry that triggered the parent lookup).
pub struct SiblingOutcome {
    pub lsn: Lsn,
    pub db_id: u32,
    pub payload: LnPayload,
    pub vsn: Option<u64>,
    pub outcome: LnOutcome,
}

pub struct LnMigrator<'a, B: Btree> {
    pub btree: &'a B,
    pub log_manager: &'a dyn LogManager,
    pub db_cache: &'a mut DbCache,
    pub db_directory: &'a dyn DbDirectory,
    pub lock_manager: &'a dyn crate::collaborators::LockManager,
    pub current_file: u32,
}

impl<'a, B: Btree> LnMigrator<'a, B> {
    /// Migrates (or rejects) one live LN at `log_lsn`, per spec §4.4 steps
    /// 1-5. Also drains look-ahead siblings from `cache` whose offset falls
    /// in the current parent once the parent is located (the "Look-ahead
    /// optimization" paragraph); their outcomes are returned alongside the
    /// primary one so the caller's counters account for every migration
    /// this call actually performed, not just the entry it was asked for.
    pub fn migrate(
        &mut self,
        log_lsn: Lsn,
        db_id: u32,
        payload: LnPayload,
        vsn: Option<u64>,
        cache: &mut LookAheadCache,
    ) -> Result<(LnOutcome, Vec<SiblingOutcome>), CleanerError> {
        let lookup = self
            .btree
            .get_parent_bin_for_child_ln(db_id, &payload.key, CacheMode::EvictIfColdFetch);
        let ParentLookup {
            exact_parent_found,
            parent,
        } = lookup;
        if !exact_parent_found {
            return Ok((LnOutcome::Dead, Vec::new()));
        }
        let mut parent = match parent {
            Some(parent) => parent,
            None => return Ok((LnOutcome::Dead, Vec::new())),
        };
        let fetched_cold = parent.fetched_cold();

        let outcome = self.migrate_against_slot(&mut parent, log_lsn, db_id, &payload, vsn)?;

        // Look-ahead optimization: drain queued siblings that fall in the
        // same parent and the same file (spec §4.4 "Look-ahead
        // optimization").
        let siblings = if matches!(outcome, LnOutcome::Migrated | LnOutcome::DeadSuperseded) {
            self.drain_look_ahead_siblings(&mut parent, cache)?
        } else {
            Vec::new()
        };

        // Eviction hint: `CacheMode::EvictIfColdFetch` passed into the parent
        // lookup above already tells the Btree collaborator to evict this
        // parent once we're done with it if it had to be fetched cold (spec
        // §4.4 "Eviction hint"); `fetched_cold` is otherwise only useful for
        // per-run cache-pollution counters a host may want to track.
        let _ = fetched_cold;

        Ok((outcome, siblings))
    }

    fn drain_look_ahead_siblings(
        &mut self,
        parent: &mut B::BinParent,
        cache: &mut LookAheadCache,
    ) -> Result<Vec<SiblingOutcome>, CleanerError> {
        let candidate_offsets: Vec<u32> = (0..parent.slot_count())
            .filter_map(|i| {
                let lsn = parent.slot_lsn(i);
                if lsn.file() == self.current_file {
                    Some(lsn.offset())
                } else {
                    None
                }
            })
            .collect();

        let mut outcomes = Vec::new();
        for offset in candidate_offsets {
            let Some(PendingMigration {
                lsn: log_lsn,
                db_id,
                payload,
                vsn,
            }) = cache.remove(offset)
            else {
                continue;
            };
            let outcome = self.migrate_against_slot(parent, log_lsn, db_id, &payload, vsn)?;
            outcomes.push(SiblingOutcome {
                lsn: log_lsn,
                db_id,
                payload,
                vsn,
                outcome,
            });
        }
        Ok(outcomes)
    }

    /// Steps 2-5 against an already-located parent: slot inspection,
    /// non-blocking lock, the migration write itself.
    fn migrate_against_slot(
        &mut self,
        parent: &mut B::BinParent,
        log_lsn: Lsn,
        db_id: u32,
        payload: &LnPayload,
        vsn: Option<u64>,
    ) -> Result<LnOutcome, CleanerError> {
        let Some(index) = parent.find_slot(&payload.key) else {
            return Ok(LnOutcome::Dead);
        };

        if parent.slot_known_deleted(index) {
            return Ok(LnOutcome::DeadSuperseded);
        }
        let tree_lsn = parent.slot_lsn(index);
        if tree_lsn.is_null() || tree_lsn != log_lsn {
            return Ok(LnOutcome::DeadSuperseded);
        }

        match self
            .lock_manager
            .non_blocking_lock(tree_lsn, db_id, false)
        {
            crate::collaborators::LockRequestOutcome::Denied => {
                return Ok(LnOutcome::Pending);
            }
            _ => {}
        }

        // Step 3's authoritative re-check of deleted/deleting, bypassing the
        // DbCache, immediately before writing (spec §4.2 Open Questions).
        if let Some(handle) = self.db_cache.revalidate(db_id, self.db_directory) {
            if handle.is_deleted() || handle.is_deleting() {
                self.lock_manager.release(tree_lsn);
                return Ok(LnOutcome::DeadSuperseded);
            }
        }

        if !parent.has_resident_child(index) {
            parent.attach_from_log(index, payload.clone());
        }

        let to_write = LogEntryToWrite {
            category: EntryCategory::Ln,
            db_id,
            key: payload.key.clone(),
            payload: Vec::new(),
            is_deletion: payload.is_deletion,
        };
        let hint = match vsn {
            Some(vsn) => ReplicationHint::PreserveVsn(vsn),
            None => ReplicationHint::Local,
        };
        let new_lsn = self.log_manager.log(to_write, hint)?;

        parent.migrate_slot(index, new_lsn, payload.last_logged_size);
        self.btree.transfer_lockers(tree_lsn, new_lsn);

        if payload.embedded {
            parent.evict_slot(index);
        }

        self.lock_manager.release(tree_lsn);
        Ok(LnOutcome::Migrated)
    }
}
