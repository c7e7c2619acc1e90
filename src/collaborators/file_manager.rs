//! `FileManager` collaborator (spec §6).

use std::io;
use std::path::PathBuf;

use crate::lsn::{FileNumber, Lsn};

/// Numeric file identifiers; no gaps below the tail (spec §6 contract).
pub trait FileManager: Send + Sync {
    /// The LSN the next entry written to the log would receive.
    fn next_lsn(&self) -> Lsn;

    /// Every file number currently known to exist, ascending.
    fn all_file_numbers(&self) -> Vec<FileNumber>;

    /// The on-disk path for a given file number.
    fn full_file_name(&self, file: FileNumber) -> PathBuf;

    /// Whether `file` is present and of a supported log version.
    fn is_file_valid(&self, file: FileNumber) -> bool;

    /// Reads a file's full contents for scanning. The cleaner never keeps
    /// more than one file's bytes resident at a time, so a whole-file buffer
    /// is simpler than threading an incremental reader through every
    /// collaborator boundary; hosts backing very large files may want a
    /// memory-mapped implementation instead.
    fn read_file(&self, file: FileNumber) -> io::Result<Vec<u8>>;

    /// Unlinks a condemned file. May fail under Windows-style file locking
    /// if a reader still has it open; the caller (`manage_disk_usage`) puts
    /// the file back on the condemned list on failure (spec §4.7, §9
    /// "Two-phase reservation/condemnation").
    fn delete_file(&self, file: FileNumber) -> io::Result<()>;

    /// The highest file number that is not the current tail.
    fn last_file_before_tail(&self) -> Option<FileNumber> {
        let mut files = self.all_file_numbers();
        files.pop();
        files.into_iter().max()
    }
}
