//! External collaborator interfaces (spec §6).
//!
//! The cleaner treats the Btree, lock manager, checkpointer, file/log
//! managers, extinction filter, and expiration profile as external
//! collaborators, specified only at their interface — exactly as spec §1 and
//! §6 describe. Each is modeled here as a Rust trait, the same way the
//! teacher abstracts over storage backends with its `Filesystem` trait
//! (`disk_v2::Filesystem`, implemented once for real `tokio::fs` and once for
//! an in-memory test double). Production code is generic over these traits;
//! `tests/support` supplies single-process, fully in-memory implementations
//! sufficient to drive the scenarios in spec §8.

pub mod btree;
pub mod checkpointer;
pub mod db;
pub mod expiration_profile;
pub mod extinction_filter;
pub mod file_manager;
pub mod lock_manager;
pub mod log_manager;

pub use btree::Btree;
pub use checkpointer::Checkpointer;
pub use db::{DbDirectory, DbHandle, DbMetadata};
pub use expiration_profile::ExpirationProfileSink;
pub use extinction_filter::{ExtinctionFilter, ExtinctionStatus};
pub use file_manager::FileManager;
pub use lock_manager::{LockManager, LockRequestOutcome};
pub use log_manager::LogManager;

/// Cache-fetch hint passed into Btree parent lookups (DESIGN NOTES §9:
/// abstracts the "fetched cold" eviction hint as a flag rather than a
/// concrete cache implementation).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheMode {
    /// Use the Btree's normal LRU policy.
    Default,
    /// If this fetch has to go to disk, evict the node again once the
    /// caller is done with it, to avoid polluting the cache with nodes that
    /// exist only for migration bookkeeping.
    EvictIfColdFetch,
}

/// Umbrella trait bundling every collaborator the cleaner needs, so that
/// `Orchestrator<C>` and friends can be generic over a single type parameter
/// instead of six.
pub trait Collaborators: Send + Sync + 'static {
    type FileManager: FileManager;
    type LogManager: LogManager;
    type Btree: Btree;
    type LockManager: LockManager;
    type Checkpointer: Checkpointer;
    type ExtinctionFilter: ExtinctionFilter;
    type DbDirectory: db::DbDirectory;
    type ExpirationProfile: ExpirationProfileSink;

    fn file_manager(&self) -> &Self::FileManager;
    fn log_manager(&self) -> &Self::LogManager;
    fn btree(&self) -> &Self::Btree;
    fn lock_manager(&self) -> &Self::LockManager;
    fn checkpointer(&self) -> &Self::Checkpointer;
    fn extinction_filter(&self) -> &Self::ExtinctionFilter;
    fn db_directory(&self) -> &Self::DbDirectory;
    fn expiration_profile(&self) -> &Self::ExpirationProfile;
}
