//! Byte-level framing for synthetic log files, matching the layout
//! `LogReader::parse_header` expects: category byte, big-endian version,
//! flags byte, big-endian prev_offset, a vsn-presence byte (plus an optional
//! big-endian vsn), big-endian payload_size, big-endian checksum, payload.

use logdb_cleaner::{BinDeltaPayload, EntryCategory, EntryFlags, EntryHeader, InPayload, LnPayload};

fn category_to_byte(category: EntryCategory) -> u8 {
    match category {
        EntryCategory::Ln => 0,
        EntryCategory::In => 1,
        EntryCategory::BinDelta => 2,
        EntryCategory::DbTree => 3,
        EntryCategory::FileHeader => 4,
        EntryCategory::Erased => 5,
        EntryCategory::Other => 6,
    }
}

/// Appends one framed entry to `out`, returning the offset it was written at.
pub fn append_entry(
    out: &mut Vec<u8>,
    category: EntryCategory,
    payload: &[u8],
    vsn: Option<u64>,
) -> u32 {
    let offset = out.len() as u32;
    let mut header = EntryHeader {
        category,
        version: 1,
        flags: if vsn.is_some() {
            EntryFlags::HAS_CHECKSUM | EntryFlags::REPLICATED
        } else {
            EntryFlags::HAS_CHECKSUM
        },
        prev_offset: 0,
        vsn,
        payload_size: payload.len() as u32,
        checksum: 0,
    };
    header.checksum = header.compute_checksum(payload);

    out.push(category_to_byte(category));
    out.extend_from_slice(&header.version.to_be_bytes());
    out.push(header.flags.bits());
    out.extend_from_slice(&header.prev_offset.to_be_bytes());
    out.push(if vsn.is_some() { 1 } else { 0 });
    if let Some(v) = vsn {
        out.extend_from_slice(&v.to_be_bytes());
    }
    out.extend_from_slice(&header.payload_size.to_be_bytes());
    out.extend_from_slice(&header.checksum.to_be_bytes());
    out.extend_from_slice(payload);
    offset
}

pub fn encode_ln(p: &LnPayload) -> Vec<u8> {
    let mut b = Vec::new();
    b.extend_from_slice(&p.db_id.to_be_bytes());
    b.extend_from_slice(&(p.key.len() as u32).to_be_bytes());
    b.extend_from_slice(&p.key);
    b.push(p.is_deletion as u8);
    b.push(p.embedded as u8);
    match p.expiration_time {
        Some(t) => {
            b.push(1);
            b.extend_from_slice(&t.to_be_bytes());
        }
        None => b.push(0),
    }
    b.extend_from_slice(&p.modification_time.to_be_bytes());
    b.extend_from_slice(&p.last_logged_size.to_be_bytes());
    b
}

pub fn decode_ln(bytes: &[u8]) -> LnPayload {
    let mut cur = 0usize;
    let db_id = u32::from_be_bytes(bytes[cur..cur + 4].try_into().unwrap());
    cur += 4;
    let key_len = u32::from_be_bytes(bytes[cur..cur + 4].try_into().unwrap()) as usize;
    cur += 4;
    let key = bytes[cur..cur + key_len].to_vec();
    cur += key_len;
    let is_deletion = bytes[cur] != 0;
    cur += 1;
    let embedded = bytes[cur] != 0;
    cur += 1;
    let has_expiration = bytes[cur] != 0;
    cur += 1;
    let expiration_time = if has_expiration {
        let t = u64::from_be_bytes(bytes[cur..cur + 8].try_into().unwrap());
        cur += 8;
        Some(t)
    } else {
        None
    };
    let modification_time = u64::from_be_bytes(bytes[cur..cur + 8].try_into().unwrap());
    cur += 8;
    let last_logged_size = u32::from_be_bytes(bytes[cur..cur + 4].try_into().unwrap());
    LnPayload {
        db_id,
        key,
        is_deletion,
        embedded,
        expiration_time,
        modification_time,
        last_logged_size,
    }
}

pub fn encode_in(p: &InPayload) -> Vec<u8> {
    let mut b = Vec::new();
    b.extend_from_slice(&p.db_id.to_be_bytes());
    b.extend_from_slice(&p.node_id.to_be_bytes());
    b.extend_from_slice(&p.level.to_be_bytes());
    b.push(p.is_root as u8);
    b
}

pub fn decode_in(bytes: &[u8]) -> InPayload {
    let db_id = u32::from_be_bytes(bytes[0..4].try_into().unwrap());
    let node_id = u64::from_be_bytes(bytes[4..12].try_into().unwrap());
    let level = u16::from_be_bytes(bytes[12..14].try_into().unwrap());
    let is_root = bytes[14] != 0;
    InPayload {
        db_id,
        node_id,
        level,
        is_root,
    }
}

pub fn encode_bin_delta(p: &BinDeltaPayload) -> Vec<u8> {
    let mut b = Vec::new();
    b.extend_from_slice(&p.db_id.to_be_bytes());
    b.extend_from_slice(&p.node_id.to_be_bytes());
    b
}

pub fn decode_bin_delta(bytes: &[u8]) -> BinDeltaPayload {
    let db_id = u32::from_be_bytes(bytes[0..4].try_into().unwrap());
    let node_id = u64::from_be_bytes(bytes[4..12].try_into().unwrap());
    BinDeltaPayload { db_id, node_id }
}
