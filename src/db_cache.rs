//! Bounded, short-lived DB metadata cache (spec §4.2).
//!
//! Looking up a `DbHandle` for every streamed entry would mean one
//! collaborator call per entry; `DbCache` amortizes that by keeping a small
//! map of already-seen `db_id -> DbMetadata` for the duration of one file's
//! pass, and dropping it wholesale every *N* processed entries so a DB
//! deleted mid-pass is eventually noticed. The stable fields (`name`,
//! `has_duplicates`, ...) remain valid to read from a released entry's last
//! snapshot, but `deleted`/`deleting` are re-checked through a fresh
//! [`DbHandle`] immediately before a migration actually writes anything
//! (spec §4.2, Open Questions).

use std::collections::HashMap;
use std::sync::Arc;

use crate::collaborators::{DbDirectory, DbHandle, DbMetadata};

/// Default release interval, matching the look-ahead batch size order of
/// magnitude used elsewhere in the classify/migrate loop.
pub const DEFAULT_RELEASE_INTERVAL: u64 = 500;

/// A cached snapshot of one DB's metadata plus its deleted/deleting state at
/// the time it was loaded (spec §4.2, Open Questions: this is the
/// `DbCache.getDbInfo` check; [`DbCache::revalidate`] is the second,
/// authoritative check made right before migration).
#[derive(Clone, Debug)]
pub struct CachedDbInfo {
    pub meta: DbMetadata,
    pub deleted: bool,
    pub deleting: bool,
}

pub struct DbCache {
    entries: HashMap<u32, CachedDbInfo>,
    release_interval: u64,
    processed_since_release: u64,
}

impl DbCache {
    pub fn new(release_interval: u64) -> Self {
        DbCache {
            entries: HashMap::new(),
            release_interval: release_interval.max(1),
            processed_since_release: 0,
        }
    }

    /// Returns cached info for `db_id`, loading and caching it via
    /// `directory` on a miss. `None` means the DB no longer exists.
    pub fn get_info(&mut self, db_id: u32, directory: &dyn DbDirectory) -> Option<CachedDbInfo> {
        if let Some(info) = self.entries.get(&db_id) {
            return Some(info.clone());
        }
        let handle = directory.get_db(db_id)?;
        let info = CachedDbInfo {
            meta: handle.metadata().clone(),
            deleted: handle.is_deleted(),
            deleting: handle.is_deleting(),
        };
        self.entries.insert(db_id, info.clone());
        Some(info)
    }

    /// Returns just the cached metadata for `db_id`, loading it on a miss.
    pub fn get(&mut self, db_id: u32, directory: &dyn DbDirectory) -> Option<DbMetadata> {
        self.get_info(db_id, directory).map(|info| info.meta)
    }

    /// Call once per classified entry; releases the whole cache every
    /// `release_interval` calls (spec §4.2: "explicitly released every *N*
    /// processed entries").
    pub fn note_entry_processed(&mut self) {
        self.processed_since_release += 1;
        if self.processed_since_release >= self.release_interval {
            self.release();
        }
    }

    pub fn release(&mut self) {
        self.entries.clear();
        self.processed_since_release = 0;
    }

    /// Re-acquires a fresh handle, bypassing the cache entirely. The
    /// migrators call this immediately before writing a migrated copy, so a
    /// delete that raced with a stale cached entry is never acted on (spec
    /// §4.2 Open Questions: "the migration-time check is authoritative").
    pub fn revalidate(
        &self,
        db_id: u32,
        directory: &dyn DbDirectory,
    ) -> Option<Arc<dyn DbHandle>> {
        directory.get_db(db_id)
    }
}
