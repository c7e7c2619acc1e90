//! `Btree` collaborator (spec §6, §4.4, §4.5).
//!
//! The cleaner never implements insert/search/split (spec §1 Non-goals); it
//! only needs: parent lookups for a leaf record or an internal node, slot
//! inspection/mutation on the returned parent, and a way to latch the root.
//! Each returned parent handle is conceptually "latched shared" for the
//! duration the caller holds it, matching the contract in spec §6
//! ("Returns the parent node latched shared on success").

use crate::entry::{BinDeltaPayload, InPayload, LnPayload};
use crate::lsn::Lsn;

use super::CacheMode;

/// Result of a parent lookup. `exact_parent_found = false` means the Btree
/// has no path to a node at the relevant level for this key/node id — the
/// entry being migrated is dead (spec §4.4 step 1, §4.5 step 2).
pub struct ParentLookup<T> {
    pub exact_parent_found: bool,
    pub parent: Option<T>,
}

impl<T> ParentLookup<T> {
    pub fn not_found() -> Self {
        ParentLookup {
            exact_parent_found: false,
            parent: None,
        }
    }

    pub fn found(parent: T) -> Self {
        ParentLookup {
            exact_parent_found: true,
            parent: Some(parent),
        }
    }
}

/// A latched leaf-level (BIN) parent, as returned for an LN's key.
pub trait BinParent: Send {
    fn db_id(&self) -> u32;

    /// Whether this parent had to be fetched from disk/cache cold for this
    /// lookup, i.e. it was not already resident (spec §4.4 "Eviction hint").
    fn fetched_cold(&self) -> bool;

    /// Locates the slot holding `key`, if any.
    fn find_slot(&self, key: &[u8]) -> Option<usize>;

    fn slot_count(&self) -> usize;

    fn slot_known_deleted(&self, index: usize) -> bool;

    fn slot_lsn(&self, index: usize) -> Lsn;

    fn slot_size(&self, index: usize) -> u32;

    fn has_resident_child(&self, index: usize) -> bool;

    /// Attaches the LN read from the log into the slot, used when the slot
    /// has no resident child (spec §4.4 step 4a).
    fn attach_from_log(&mut self, index: usize, payload: LnPayload);

    /// Rewrites the slot's LSN and size after a successful migration write
    /// (spec §4.4 step 4c).
    fn migrate_slot(&mut self, index: usize, new_lsn: Lsn, new_size: u32);

    /// Evicts a slot that was only materialized for migration purposes
    /// (spec §4.4 step 4e).
    fn evict_slot(&mut self, index: usize);
}

/// A latched internal-node (IN) parent, one level up from a full IN or
/// BIN-delta being classified.
pub trait InParent: Send {
    fn slot_count(&self) -> usize;

    /// Locates the slot referencing `node_id`, if any.
    fn find_slot_by_node_id(&self, node_id: u64) -> Option<usize>;

    fn slot_lsn(&self, index: usize) -> Lsn;

    fn child_is_delta(&self, index: usize) -> bool;

    fn has_resident_child(&self, index: usize) -> bool;

    /// Attaches a BIN-delta read from the log, avoiding a fetch of the child
    /// (spec §4.5 step 4).
    fn attach_delta_from_log(&mut self, index: usize, payload: BinDeltaPayload, lsn: Lsn);

    /// Mutates the resident delta child into a full BIN using the log copy
    /// (spec §4.5 "full IN" step 3).
    fn mutate_child_to_full(&mut self, index: usize, payload: InPayload, lsn: Lsn);

    fn mark_child_dirty(&mut self, index: usize);

    /// Forbids writing the next update to this child as a delta (spec §4.5
    /// step 6).
    fn prohibit_next_delta(&mut self, index: usize);

    /// Fetches the resident child (if not already resident) purely to read
    /// its last full LSN (spec §4.5 "full IN" step 4).
    fn fetch_child_last_full_lsn(&self, index: usize) -> Lsn;
}

/// The root node of one DB's tree, latched for the duration of the closure
/// passed to [`Btree::with_root_latched`] (spec §4.5 "full IN" step 1).
pub trait RootNode: Send {
    fn node_id(&self) -> u64;
    fn lsn(&self) -> Lsn;
    fn mark_dirty(&mut self);
    fn prohibit_next_delta(&mut self);
}

/// `getParentBINForChildLN`, `getParentINForChildIN`, and the few other
/// Btree operations the cleaner depends on (spec §6).
pub trait Btree: Send + Sync {
    type BinParent: BinParent;
    type InParent: InParent;
    type Root: RootNode;

    /// Shared-mode, no-split parent lookup for an LN's key.
    fn get_parent_bin_for_child_ln(
        &self,
        db_id: u32,
        key: &[u8],
        cache_mode: CacheMode,
    ) -> ParentLookup<Self::BinParent>;

    /// Parent lookup for an IN/BIN-delta by node id and level.
    fn get_parent_in_for_child_in(
        &self,
        db_id: u32,
        node_id: u64,
        level: u16,
        use_target_level: bool,
        do_fetch: bool,
        cache_mode: CacheMode,
    ) -> ParentLookup<Self::InParent>;

    /// Runs `f` with the root of `db_id`'s tree latched.
    fn with_root_latched<R>(&self, db_id: u32, f: impl FnOnce(&mut Self::Root) -> R) -> Option<R>;

    /// Moves any lockers of `old_lsn` onto `new_lsn` so in-flight
    /// transactions observe a migrated record at its new location (spec
    /// §4.4 step 4d).
    fn transfer_lockers(&self, old_lsn: Lsn, new_lsn: Lsn);
}
