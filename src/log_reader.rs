//! Forward log-file scanning (spec §4.1 "LogReader").
//!
//! Streams `(header, offset, size, category)` tuples from a single log
//! file in ascending-offset order, the same buffered-scan shape as the
//! teacher's `disk_v2::reader::Reader`, adapted from an async byte stream to
//! a synchronous in-memory/mmap-style slice since the cleaner never awaits
//! here (spec §5: cleaner threads are plain blocking threads). Checksums are
//! verified unless the reader was constructed in count-only mode (spec §4.8
//! pass 1). VSNs, where present, must be strictly increasing; a torn write
//! at the very end of the file is tolerated only if this is the current
//! tail file.

use crate::entry::{BinDeltaPayload, EntryCategory, EntryFlags, EntryHeader, InPayload, LnPayload, StreamedEntry};
use crate::error::LogReaderError;
use crate::lsn::{FileNumber, Lsn};

/// Decodes category-specific payload bytes into the small set of fields the
/// cleaner inspects. The concrete on-disk encoding of LN/IN/BIN_DELTA
/// payloads is a collaborator concern (spec §1 Non-goals: "Log record
/// serialization formats beyond what the cleaner must read"); this trait is
/// the seam.
pub trait PayloadCodec: Send + Sync {
    fn decode_ln(&self, payload: &[u8]) -> Result<LnPayload, LogReaderError>;
    fn decode_in(&self, payload: &[u8]) -> Result<InPayload, LogReaderError>;
    fn decode_bin_delta(&self, payload: &[u8]) -> Result<BinDeltaPayload, LogReaderError>;
}

/// One raw framed entry: its header and undecoded payload bytes.
pub struct RawEntry<'a> {
    pub entry: StreamedEntry,
    pub payload: &'a [u8],
}

const HEADER_FIXED_LEN: usize = 1 /* category */
    + 2 /* version */
    + 1 /* flags */
    + 4 /* prev_offset */
    + 1 /* vsn present */
    + 4 /* payload_size */
    + 4 /* checksum */;
const VSN_LEN: usize = 8;

fn category_from_byte(byte: u8) -> Option<EntryCategory> {
    match byte {
        0 => Some(EntryCategory::Ln),
        1 => Some(EntryCategory::In),
        2 => Some(EntryCategory::BinDelta),
        3 => Some(EntryCategory::DbTree),
        4 => Some(EntryCategory::FileHeader),
        5 => Some(EntryCategory::Erased),
        6 => Some(EntryCategory::Other),
        _ => None,
    }
}

/// Scans one log file's bytes in ascending-offset order.
pub struct LogReader<'a> {
    file: FileNumber,
    data: &'a [u8],
    offset: u32,
    prev_offset: u32,
    last_vsn: Option<u64>,
    /// Count-only mode (spec §4.8 pass 1): skip checksum verification,
    /// never used for migration.
    pub count_only: bool,
    /// Whether `file` is the current tail file; a torn write at EOF is only
    /// tolerable here (spec §8 "Boundary behaviors").
    pub is_tail_file: bool,
}

impl<'a> LogReader<'a> {
    pub fn new(file: FileNumber, data: &'a [u8], count_only: bool, is_tail_file: bool) -> Self {
        LogReader {
            file,
            data,
            offset: 0,
            prev_offset: 0,
            last_vsn: None,
            count_only,
            is_tail_file,
        }
    }

    pub fn current_offset(&self) -> u32 {
        self.offset
    }

    /// Reads the next framed entry, or `Ok(None)` at a clean end-of-file (or
    /// a tolerated torn write in the tail file).
    pub fn next_entry(&mut self) -> Result<Option<RawEntry<'a>>, LogReaderError> {
        if self.offset as usize >= self.data.len() {
            return Ok(None);
        }
        match self.try_read_one() {
            Ok(entry) => Ok(Some(entry)),
            Err(err) if self.is_tail_file && matches!(err, LogReaderError::Integrity { .. }) => {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Skips past the next entry's bytes without verifying its checksum or
    /// decoding its payload, used by callers that already know an offset is
    /// obsolete (spec §4.1 `skipEntry`).
    pub fn skip_entry(&mut self) -> Result<bool, LogReaderError> {
        let start = self.offset as usize;
        if start >= self.data.len() {
            return Ok(false);
        }
        let (header, total_len) = self.parse_header(start)?;
        self.prev_offset = self.offset;
        self.offset += total_len as u32;
        let _ = header;
        Ok(true)
    }

    fn try_read_one(&mut self) -> Result<RawEntry<'a>, LogReaderError> {
        let start = self.offset as usize;
        let (header, total_len) = self.parse_header(start)?;
        let payload_start = start + HEADER_FIXED_LEN + header.vsn.map_or(0, |_| VSN_LEN);
        let payload_end = payload_start + header.payload_size as usize;
        let payload = &self.data[payload_start..payload_end];

        if !self.count_only && header.flags.contains(EntryFlags::HAS_CHECKSUM)
            && !header.verify_checksum(payload)
        {
            return crate::error::ChecksumSnafu {
                file: self.file,
                offset: self.offset,
            }
            .fail();
        }

        if let Some(vsn) = header.vsn {
            if let Some(last) = self.last_vsn {
                if vsn <= last {
                    return crate::error::IntegritySnafu {
                        file: self.file,
                        offset: self.offset,
                        reason: format!("VSN {} did not increase past previous VSN {}", vsn, last),
                    }
                    .fail();
                }
            }
            self.last_vsn = Some(vsn);
        }

        let lsn = Lsn::new(self.file, self.offset);
        let entry = StreamedEntry {
            lsn,
            header,
            size: total_len as u32,
        };

        self.prev_offset = self.offset;
        self.offset += total_len as u32;

        Ok(RawEntry { entry, payload })
    }

    fn parse_header(&self, start: usize) -> Result<(EntryHeader, usize), LogReaderError> {
        let remaining = self.data.len() - start;
        if remaining < HEADER_FIXED_LEN {
            return crate::error::IntegritySnafu {
                file: self.file,
                offset: start as u32,
                reason: "truncated entry header at end of file".to_string(),
            }
            .fail();
        }

        let bytes = &self.data[start..];
        let category_byte = bytes[0];
        let category = category_from_byte(category_byte).ok_or_else(|| {
            LogReaderError::Integrity {
                file: self.file,
                offset: start as u32,
                reason: format!("unknown entry category byte {category_byte}"),
            }
        })?;
        let version = u16::from_be_bytes([bytes[1], bytes[2]]);
        let flags = EntryFlags::from_bits_truncate(bytes[3]);
        let prev_offset = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let vsn_present = bytes[8] != 0;

        let mut cursor = 9;
        let vsn = if vsn_present {
            if remaining < cursor + VSN_LEN + 8 {
                return crate::error::IntegritySnafu {
                    file: self.file,
                    offset: start as u32,
                    reason: "truncated entry header (vsn) at end of file".to_string(),
                }
                .fail();
            }
            let v = u64::from_be_bytes(bytes[cursor..cursor + 8].try_into().unwrap());
            cursor += VSN_LEN;
            Some(v)
        } else {
            None
        };

        if remaining < cursor + 8 {
            return crate::error::IntegritySnafu {
                file: self.file,
                offset: start as u32,
                reason: "truncated entry header (size/checksum) at end of file".to_string(),
            }
            .fail();
        }
        let payload_size = u32::from_be_bytes(bytes[cursor..cursor + 4].try_into().unwrap());
        cursor += 4;
        let checksum = u32::from_be_bytes(bytes[cursor..cursor + 4].try_into().unwrap());
        cursor += 4;

        let total_len = cursor + payload_size as usize;
        if remaining < total_len {
            return crate::error::IntegritySnafu {
                file: self.file,
                offset: start as u32,
                reason: "truncated entry payload at end of file".to_string(),
            }
            .fail();
        }

        Ok((
            EntryHeader {
                category,
                version,
                flags,
                prev_offset,
                vsn,
                payload_size,
                checksum,
            },
            total_len,
        ))
    }
}
