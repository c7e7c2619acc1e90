//! `Checkpointer` collaborator (spec §6).
//!
//! The cleaner never rewrites MapLNs (DB metadata) or internal nodes itself;
//! it marks them dirty and defers to the checkpointer (DESIGN NOTES §9).

/// Outcome of asking the checkpointer to coordinate eviction of a dirtied
/// node with an in-progress checkpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provisional {
    /// The checkpointer has already captured this node; eviction may
    /// proceed immediately.
    No,
    /// Eviction must wait for the current checkpoint to finish with this
    /// node first.
    Yes,
}

pub trait Checkpointer: Send + Sync {
    /// Called on a timed wake-up with no writes since the previous timed
    /// wake-up (spec §4.6 wake-up policy): quiesced systems can still
    /// reclaim disk, so ask the checkpointer to flush dirty nodes.
    fn wakeup_after_no_writes(&self);

    /// Honors dirty flags set by the cleaner (INMigrator) when the cache
    /// wants to evict `db_id`'s node at `target_level` under `parent`.
    fn coordinate_eviction_with_checkpoint(
        &self,
        db_id: u32,
        target_level: u16,
        parent_node_id: u64,
    ) -> Provisional;
}
