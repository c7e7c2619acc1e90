//! Error taxonomy for the cleaner (spec §7).
//!
//! Mirrors the teacher's per-component `snafu` error enums
//! (`disk_v2::reader::ReaderError`, `disk_v2::writer::WriterError`,
//! `variants::disk_v2::ledger::LedgerLoadCreateError`): each component has its
//! own error type with a human `#[snafu(display)]` message, and a thin
//! classification method maps concrete variants onto the handling strategy
//! the Orchestrator actually dispatches on.

use std::io;

use snafu::Snafu;

use crate::lsn::FileNumber;

/// How the Orchestrator should react to an error (spec §7).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Local retry or defer via the pending queue; never propagated.
    Transient,
    /// The file was deleted out from under the cleaner; scrub it from all
    /// metadata and move on.
    FileMissing,
    /// Disk usage limit violated; abort the current file, propagate only to
    /// explicit (non-daemon) callers.
    DiskLimit,
    /// Checksum mismatch, VSN ordering violation, or an invariant violation;
    /// never swallowed, always propagated and the environment is marked
    /// invalid.
    Integrity,
    /// The cleaner thread was interrupted while waiting; re-flag and abort
    /// the current file.
    Interrupted,
}

/// Error produced while streaming a single log file (spec §4.1).
#[derive(Debug, Snafu)]
pub enum LogReaderError {
    #[snafu(display("checksum mismatch in file {file:08x} at offset {offset}"))]
    Checksum { file: FileNumber, offset: u32 },

    #[snafu(display("log integrity violation in file {file:08x} at offset {offset}: {reason}"))]
    Integrity {
        file: FileNumber,
        offset: u32,
        reason: String,
    },

    #[snafu(display("log file {file:08x} not found: {source}"))]
    FileNotFound { file: FileNumber, source: io::Error },

    #[snafu(display("I/O error reading file {file:08x}: {source}"))]
    Io { file: FileNumber, source: io::Error },
}

impl LogReaderError {
    pub fn class(&self) -> ErrorClass {
        match self {
            LogReaderError::Checksum { .. } | LogReaderError::Integrity { .. } => {
                ErrorClass::Integrity
            }
            LogReaderError::FileNotFound { .. } => ErrorClass::FileMissing,
            LogReaderError::Io { .. } => ErrorClass::Integrity,
        }
    }

    pub fn file(&self) -> FileNumber {
        match self {
            LogReaderError::Checksum { file, .. }
            | LogReaderError::Integrity { file, .. }
            | LogReaderError::FileNotFound { file, .. }
            | LogReaderError::Io { file, .. } => *file,
        }
    }
}

/// Errors that can surface from a single per-file cleaning run (spec §4.6).
#[derive(Debug, Snafu)]
pub enum CleanerError {
    #[snafu(display("{source}"))]
    Reader { source: LogReaderError },

    #[snafu(display("disk usage limit exceeded while cleaning file {file:08x}"))]
    DiskLimit { file: FileNumber },

    #[snafu(display("cleaner thread interrupted while waiting on file {file:08x}"))]
    Interrupted { file: FileNumber },

    #[snafu(display(
        "invariant violation: {reason} (attempted on file {file:08x})"
    ))]
    InvariantViolation { file: FileNumber, reason: String },
}

impl CleanerError {
    pub fn class(&self) -> ErrorClass {
        match self {
            CleanerError::Reader { source } => source.class(),
            CleanerError::DiskLimit { .. } => ErrorClass::DiskLimit,
            CleanerError::Interrupted { .. } => ErrorClass::Interrupted,
            CleanerError::InvariantViolation { .. } => ErrorClass::Integrity,
        }
    }

    pub fn file(&self) -> FileNumber {
        match self {
            CleanerError::Reader { source } => source.file(),
            CleanerError::DiskLimit { file }
            | CleanerError::Interrupted { file }
            | CleanerError::InvariantViolation { file, .. } => *file,
        }
    }
}

impl From<LogReaderError> for CleanerError {
    fn from(source: LogReaderError) -> Self {
        CleanerError::Reader { source }
    }
}
