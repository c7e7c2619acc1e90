//! `ExtinctionFilter` collaborator (spec §6, §4.3 step 5d).

/// Extinction status for a `(db name, key)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtinctionStatus {
    Extinct,
    MaybeExtinct,
    NotExtinct,
}

/// Host-provided callback declaring certain keys dead without a further
/// Btree check. Any implementation error is treated as `MaybeExtinct` by the
/// classifier (spec §6 contract), never as `Extinct` — extinction can only
/// ever make an entry *more* likely to be treated as live-but-uncertain, not
/// silently dropped.
pub trait ExtinctionFilter: Send + Sync {
    fn extinction_status(&self, db_name: &str, has_duplicates: bool, key: &[u8]) -> ExtinctionStatus;
}

/// An extinction filter that never declares anything extinct, for hosts
/// that don't implement this feature.
pub struct NeverExtinct;

impl ExtinctionFilter for NeverExtinct {
    fn extinction_status(&self, _db_name: &str, _has_duplicates: bool, _key: &[u8]) -> ExtinctionStatus {
        ExtinctionStatus::NotExtinct
    }
}
