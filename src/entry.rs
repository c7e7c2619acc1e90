//! Log entry framing.
//!
//! Every entry in the log is a self-describing `(header, payload)` pair. This
//! module only models what the cleaner needs to read: the header fields
//! listed in spec §3, and the small set of category-specific payload fields
//! the classifier and migrators inspect. Full wire-format serialization of
//! every entry type is out of scope (spec §1) and is a collaborator concern
//! (`LogManager`/`Btree`); what's here is just enough to validate a checksum
//! and dispatch on entry category.
//!
//! # Warning
//!
//! As in the teacher's own framed records (`disk_v2::record::Record`): do not
//! reorder or change the types of [`EntryHeader`] fields without also
//! updating [`EntryHeader::checksum_bytes`], or checksums computed by
//! historical writers will stop matching.

use crc32fast::Hasher;

use crate::lsn::Lsn;

/// The category of a log entry, as classified purely from its type code.
///
/// This is the cleaner's view of entry types; it collapses everything the
/// cleaner doesn't specifically special-case into [`EntryCategory::Other`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryCategory {
    /// Leaf record: user or internal-database key/value or tombstone.
    Ln,
    /// Full internal node, including leaf-level BINs.
    In,
    /// Incremental update to a leaf-level internal node.
    BinDelta,
    /// Root of the DB-id-to-metadata catalog.
    DbTree,
    /// First entry of a file.
    FileHeader,
    /// Tombstoned entry; offset preserved, not live.
    Erased,
    /// Checkpoints, transaction end markers, traces, etc.
    Other,
}

impl EntryCategory {
    /// Node-type entries are the ones the cleaner ever classifies as
    /// anything other than immediately obsolete (spec §4.3 step 2).
    pub fn is_node_type(self) -> bool {
        matches!(
            self,
            EntryCategory::Ln
                | EntryCategory::In
                | EntryCategory::BinDelta
                | EntryCategory::DbTree
                | EntryCategory::FileHeader
        )
    }
}

bitflags::bitflags! {
    /// Header flags, spec §3: replicated, invisible, variable-length,
    /// checksum-present.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct EntryFlags: u8 {
        const REPLICATED      = 0b0000_0001;
        const INVISIBLE       = 0b0000_0010;
        const VARIABLE_LENGTH = 0b0000_0100;
        const HAS_CHECKSUM    = 0b0000_1000;
    }
}

/// Framed log entry header, as read by [`crate::log_reader::LogReader`].
#[derive(Clone, Debug)]
pub struct EntryHeader {
    pub category: EntryCategory,
    pub version: u16,
    pub flags: EntryFlags,
    /// Byte offset of the previous entry in the same file; used to detect
    /// truncation/corruption while scanning backwards during recovery.
    pub prev_offset: u32,
    /// Versioned sequence number, present only on replicated entries.
    pub vsn: Option<u64>,
    pub payload_size: u32,
    pub checksum: u32,
}

impl EntryHeader {
    /// Recomputes the checksum over the header fields (other than the
    /// checksum itself) plus the payload, matching the teacher's approach of
    /// hashing a big-endian encoding of the metadata fields ahead of the
    /// payload bytes (`disk_v2::record::generate_checksum`).
    pub fn compute_checksum(&self, payload: &[u8]) -> u32 {
        let mut hasher = Hasher::new();
        hasher.update(&(self.category as u8 as u32).to_be_bytes());
        hasher.update(&self.version.to_be_bytes());
        hasher.update(&self.flags.bits().to_be_bytes());
        hasher.update(&self.prev_offset.to_be_bytes());
        hasher.update(&self.vsn.unwrap_or(0).to_be_bytes());
        hasher.update(&self.payload_size.to_be_bytes());
        hasher.update(payload);
        hasher.finalize()
    }

    pub fn verify_checksum(&self, payload: &[u8]) -> bool {
        self.compute_checksum(payload) == self.checksum
    }
}

/// Decoded leaf-record (`LN`) payload fields the cleaner inspects.
///
/// Value bytes and any DB-specific interpretation are intentionally not
/// modeled; the cleaner only ever compares keys, checks the tombstone bit,
/// and reads timestamps.
#[derive(Clone, Debug)]
pub struct LnPayload {
    pub db_id: u32,
    pub key: Vec<u8>,
    pub is_deletion: bool,
    pub embedded: bool,
    pub expiration_time: Option<u64>,
    pub modification_time: u64,
    pub last_logged_size: u32,
}

/// Decoded internal-node (`IN`) payload fields the cleaner inspects.
#[derive(Clone, Debug)]
pub struct InPayload {
    pub db_id: u32,
    pub node_id: u64,
    pub level: u16,
    pub is_root: bool,
}

/// Decoded `BIN_DELTA` payload fields the cleaner inspects.
#[derive(Clone, Debug)]
pub struct BinDeltaPayload {
    pub db_id: u32,
    pub node_id: u64,
}

/// One entry as produced by [`crate::log_reader::LogReader`], carrying its
/// own LSN for convenience.
#[derive(Clone, Debug)]
pub struct StreamedEntry {
    pub lsn: Lsn,
    pub header: EntryHeader,
    pub size: u32,
}
