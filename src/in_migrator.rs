//! Internal node migration (spec §4.5).
//!
//! Internal nodes and BIN-deltas are never rewritten by the cleaner; the
//! in-tree copy is dirtied so the next checkpoint emits a fresh version,
//! which naturally obsoletes the log copy currently being classified. This
//! mirrors the source's "the cleaner never directly rewrites a MapLN; it
//! marks it dirty and defers to the checkpointer" pattern (spec §5, DESIGN
//! NOTES §9), generalized here to every internal-node category.

use crate::collaborators::btree::{Btree, InParent, ParentLookup};
use crate::collaborators::CacheMode;
use crate::entry::{BinDeltaPayload, InPayload};
use crate::lsn::Lsn;

/// Outcome of attempting to dirty an internal node or BIN-delta, for
/// per-run counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InOutcome {
    Dead,
    Dirtied,
}

pub struct InMigrator<'a, B: Btree> {
    pub btree: &'a B,
}

impl<'a, B: Btree> InMigrator<'a, B> {
    /// Spec §4.5 "For a BIN-delta read from the log" steps 1-6.
    pub fn migrate_bin_delta(
        &self,
        log_lsn: Lsn,
        payload: BinDeltaPayload,
        level: u16,
    ) -> InOutcome {
        let ParentLookup {
            exact_parent_found,
            parent,
        } = self.btree.get_parent_in_for_child_in(
            payload.db_id,
            payload.node_id,
            level,
            true,
            false,
            CacheMode::Default,
        );
        if !exact_parent_found {
            return InOutcome::Dead;
        }
        let Some(mut parent) = parent else {
            return InOutcome::Dead;
        };

        let Some(index) = parent.find_slot_by_node_id(payload.node_id) else {
            return InOutcome::Dead;
        };
        if parent.slot_lsn(index) != log_lsn {
            return InOutcome::Dead;
        }

        if !parent.has_resident_child(index) {
            parent.attach_delta_from_log(index, payload, log_lsn);
        }

        parent.mark_child_dirty(index);
        // BIN-deltas naturally obsolete themselves with each new delta; no
        // next-delta prohibition needed here (spec §4.5 step 6).
        InOutcome::Dirtied
    }

    /// Spec §4.5 "For a full IN read from the log" steps 1-4.
    pub fn migrate_full_in(&self, log_lsn: Lsn, payload: InPayload) -> InOutcome {
        if payload.is_root {
            let result = self.btree.with_root_latched(payload.db_id, |root| {
                if root.node_id() == payload.node_id && root.lsn() == log_lsn {
                    root.mark_dirty();
                    root.prohibit_next_delta();
                    InOutcome::Dirtied
                } else {
                    InOutcome::Dead
                }
            });
            return result.unwrap_or(InOutcome::Dead);
        }

        let ParentLookup {
            exact_parent_found,
            parent,
        } = self.btree.get_parent_in_for_child_in(
            payload.db_id,
            payload.node_id,
            payload.level,
            true,
            true,
            CacheMode::Default,
        );
        if !exact_parent_found {
            return InOutcome::Dead;
        }
        let Some(mut parent) = parent else {
            return InOutcome::Dead;
        };

        let Some(index) = parent.find_slot_by_node_id(payload.node_id) else {
            return InOutcome::Dead;
        };

        let tree_lsn = parent.slot_lsn(index);
        if tree_lsn == log_lsn {
            if parent.child_is_delta(index) {
                parent.mutate_child_to_full(index, payload, log_lsn);
            }
            parent.mark_child_dirty(index);
            parent.prohibit_next_delta(index);
            return InOutcome::Dirtied;
        }

        let last_full_lsn = parent.fetch_child_last_full_lsn(index);
        if last_full_lsn == log_lsn && parent.child_is_delta(index) {
            parent.mutate_child_to_full(index, payload, log_lsn);
            parent.mark_child_dirty(index);
            return InOutcome::Dirtied;
        }

        InOutcome::Dead
    }
}
