//! `LogManager` collaborator (spec §6).

use crate::entry::EntryCategory;
use crate::error::CleanerError;
use crate::lsn::Lsn;

/// Whether a migrated entry should be tagged for replication, mirroring the
/// `replicationHint` argument of the source's `log()` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplicationHint {
    /// Preserve the VSN of the original entry (the "migration" hint of spec
    /// §4.4 step 4b).
    PreserveVsn(u64),
    /// Assign a fresh VSN as a normal local write would.
    Local,
}

/// One entry handed to the log for appending.
#[derive(Clone, Debug)]
pub struct LogEntryToWrite {
    pub category: EntryCategory,
    pub db_id: u32,
    pub key: Vec<u8>,
    pub payload: Vec<u8>,
    pub is_deletion: bool,
}

/// Appends atomically; returns the durable LSN on return (spec §6 contract).
pub trait LogManager: Send + Sync {
    fn log(
        &self,
        entry: LogEntryToWrite,
        replication_hint: ReplicationHint,
    ) -> Result<Lsn, CleanerError>;

    fn flush_sync(&self) -> Result<(), CleanerError>;

    fn flush_no_sync(&self) -> Result<(), CleanerError>;
}
