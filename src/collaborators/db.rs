//! DB metadata handle, consumed by [`crate::db_cache::DbCache`] (spec §4.2).
//!
//! DESIGN NOTES §9 calls for replacing the source's cyclic in-memory
//! references and GC-era "access latches" with ownership + a generation
//! counter: re-acquiring a fresh handle and comparing generations is how the
//! cleaner detects "this DB was deleted between lookups" without needing a
//! borrow-checker-hostile object graph.

/// Stable (once-loaded) fields of a DB's metadata, snapshotted by
/// [`crate::db_cache::DbCache`].
#[derive(Clone, Debug)]
pub struct DbMetadata {
    pub db_id: u32,
    pub name: String,
    pub has_duplicates: bool,
    pub is_internal: bool,
    pub lns_immediately_obsolete: bool,
}

/// A handle to a DB's live metadata, re-acquired fresh immediately before
/// migration to guard against a concurrent delete (spec §4.2, Open
/// Questions). `generation` increments every time the DB's deleted/deleting
/// state transitions, so a cached `DbMetadata` paired with a stale
/// `DbHandle` can be detected without re-running the whole lookup.
pub trait DbHandle: Send + Sync {
    fn metadata(&self) -> &DbMetadata;
    fn generation(&self) -> u64;
    fn is_deleting(&self) -> bool;
    fn is_deleted(&self) -> bool;
}

/// Acquires fresh [`DbHandle`]s by id. Kept separate from [`super::Btree`]
/// because, unlike tree navigation, DB lookup is not latch-ordered beneath
/// any particular node.
pub trait DbDirectory: Send + Sync {
    fn get_db(&self, db_id: u32) -> Option<std::sync::Arc<dyn DbHandle>>;
}
