//! `LockManager` collaborator (spec §6, §5).
//!
//! Non-blocking only: the cleaner must never suspend on an LN record lock
//! (spec §5 "It never blocks on an LN record lock").

use crate::lsn::Lsn;

/// Outcome of a non-blocking lock request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockRequestOutcome {
    Granted,
    Denied,
    /// The calling context already owns the lock.
    AlreadyOwned,
}

pub trait LockManager: Send + Sync {
    /// Whether the given LSN's lock currently has no contending holders.
    fn is_lock_uncontended(&self, lsn: Lsn) -> bool;

    /// Attempts to acquire a non-blocking read lock on `lsn`. Never
    /// suspends the caller.
    fn non_blocking_lock(
        &self,
        lsn: Lsn,
        db_id: u32,
        jump_ahead_of_waiters: bool,
    ) -> LockRequestOutcome;

    /// Releases a lock previously granted by [`non_blocking_lock`].
    fn release(&self, lsn: Lsn);
}
