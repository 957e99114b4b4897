// Copyright (C) 2026  winnyboy5
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Git PACK section reader
//!
//! # Format
//!
//! ```text
//! [Header: 12 bytes]
//!   - Signature: "PACK" (4 bytes)
//!   - Version: u32 big-endian (2 or 3)
//!   - Entries: u32 big-endian
//! [Entries: variable]
//!   - type/size varint header
//!   - OFS_DELTA: negative offset varint / REF_DELTA: 20-byte base id
//!   - zlib stream of the (delta) payload
//! [Trailer: 20 bytes]
//!   - SHA-1 of everything above
//! ```
//!
//! Only the header and the entry payloads are read. Delta entries are kept
//! as-is; resolving them needs the base objects, which live upstream.

use crate::error::{ParseError, ParseResult};
use flate2::{Decompress, FlushDecompress, Status};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Pack signature bytes
pub const PACK_SIGNATURE: &[u8; 4] = b"PACK";

/// Size of the fixed pack header
pub const PACK_HEADER_LEN: usize = 12;

const REF_DELTA_BASE_LEN: usize = 20;

/// Upper bound for a single inflated entry, guards against zip bombs
const MAX_INFLATED_SIZE: usize = 512 * 1024 * 1024;

/// Most the inflate buffer reserves up front; the declared size is untrusted
const INITIAL_INFLATE_CAPACITY: usize = 64 * 1024;

/// Pack header metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackMeta {
    /// Signature, always `PACK` once parsed
    pub sig: String,
    /// Pack format version
    pub version: u32,
    /// Number of entries that follow the header
    pub entries: u32,
}

impl PackMeta {
    /// Parse the 12-byte header at the start of `data`
    pub fn parse(data: &[u8]) -> ParseResult<Self> {
        if data.len() < PACK_HEADER_LEN {
            return Err(ParseError::PackTooShort { len: data.len() });
        }

        if &data[0..4] != PACK_SIGNATURE {
            return Err(ParseError::BadSignature {
                found: String::from_utf8_lossy(&data[0..4]).into_owned(),
            });
        }

        let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let entries = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);

        if version != 2 && version != 3 {
            warn!(version, "Unexpected pack version");
        }

        Ok(Self {
            sig: "PACK".to_string(),
            version,
            entries,
        })
    }
}

/// Git object type codes used in pack entry headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectKind {
    /// 1
    Commit,
    /// 2
    Tree,
    /// 3
    Blob,
    /// 4
    Tag,
    /// 6
    OfsDelta,
    /// 7
    RefDelta,
}

impl ObjectKind {
    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ObjectKind::Commit),
            2 => Some(ObjectKind::Tree),
            3 => Some(ObjectKind::Blob),
            4 => Some(ObjectKind::Tag),
            6 => Some(ObjectKind::OfsDelta),
            7 => Some(ObjectKind::RefDelta),
            _ => None,
        }
    }

    /// Wire code of this type
    pub fn code(self) -> u8 {
        match self {
            ObjectKind::Commit => 1,
            ObjectKind::Tree => 2,
            ObjectKind::Blob => 3,
            ObjectKind::Tag => 4,
            ObjectKind::OfsDelta => 6,
            ObjectKind::RefDelta => 7,
        }
    }
}

/// Base reference of a delta entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeltaBase {
    /// Distance back from the entry's own offset
    Offset(u64),
    /// Hex id of the base object
    Id(String),
}

/// One inflated pack entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackEntry {
    /// Position of the entry in the pack
    pub index: u32,
    /// Byte offset of the entry header, relative to the pack start
    pub offset: usize,
    /// Entry type
    pub kind: ObjectKind,
    /// Inflated size declared in the header
    pub size: u64,
    /// Base of a delta entry
    pub base: Option<DeltaBase>,
    /// Inflated payload
    pub data: Vec<u8>,
}

/// A parsed PACK section
#[derive(Debug, Clone)]
pub struct Pack {
    /// Header values
    pub meta: PackMeta,
    /// Entries in pack order
    pub entries: Vec<PackEntry>,
}

impl Pack {
    /// Parse the header and inflate every entry
    pub fn parse(data: &[u8]) -> ParseResult<Self> {
        let meta = PackMeta::parse(data)?;
        let mut entries = Vec::with_capacity(meta.entries.min(4096) as usize);
        let mut offset = PACK_HEADER_LEN;

        for index in 0..meta.entries {
            let (entry, next) = read_entry(data, offset, index)?;
            entries.push(entry);
            offset = next;
        }

        debug!(
            entries = entries.len(),
            consumed = offset,
            "Parsed pack entries"
        );

        Ok(Self { meta, entries })
    }

    /// Entries of the given type
    pub fn of_kind(&self, kind: ObjectKind) -> impl Iterator<Item = &PackEntry> {
        self.entries.iter().filter(move |entry| entry.kind == kind)
    }
}

fn read_entry(data: &[u8], start: usize, index: u32) -> ParseResult<(PackEntry, usize)> {
    let bad_header = || ParseError::InvalidObjectHeader {
        index,
        offset: start,
    };

    let mut pos = start;
    let first = *data.get(pos).ok_or_else(bad_header)?;
    pos += 1;

    let kind = ObjectKind::from_code((first >> 4) & 0x07).ok_or_else(bad_header)?;
    let mut size = u64::from(first & 0x0f);
    let mut shift = 4u32;
    let mut byte = first;

    while byte & 0x80 != 0 {
        byte = *data.get(pos).ok_or_else(bad_header)?;
        pos += 1;
        if shift > 57 {
            return Err(bad_header());
        }
        size |= u64::from(byte & 0x7f) << shift;
        shift += 7;
    }

    let base = match kind {
        ObjectKind::OfsDelta => {
            let (distance, next) = read_offset_varint(data, pos).ok_or_else(bad_header)?;
            pos = next;
            Some(DeltaBase::Offset(distance))
        }
        ObjectKind::RefDelta => {
            let id = data
                .get(pos..pos + REF_DELTA_BASE_LEN)
                .ok_or_else(bad_header)?;
            pos += REF_DELTA_BASE_LEN;
            Some(DeltaBase::Id(hex::encode(id)))
        }
        _ => None,
    };

    let (payload, consumed) = inflate(&data[pos..], size, index, pos)?;

    Ok((
        PackEntry {
            index,
            offset: start,
            kind,
            size,
            base,
            data: payload,
        },
        pos + consumed,
    ))
}

/// OFS_DELTA distance: big-endian base-128 with a +1 bias per continuation
fn read_offset_varint(data: &[u8], mut pos: usize) -> Option<(u64, usize)> {
    let mut byte = *data.get(pos)?;
    pos += 1;
    let mut value = u64::from(byte & 0x7f);

    while byte & 0x80 != 0 {
        byte = *data.get(pos)?;
        pos += 1;
        value = value.checked_add(1)?.checked_mul(128)? | u64::from(byte & 0x7f);
    }

    Some((value, pos))
}

/// Inflate one zlib stream, returning the payload and compressed length
fn inflate(input: &[u8], size: u64, index: u32, offset: usize) -> ParseResult<(Vec<u8>, usize)> {
    let expected = usize::try_from(size).unwrap_or(usize::MAX);
    if expected > MAX_INFLATED_SIZE {
        return Err(ParseError::Inflate {
            index,
            offset,
            reason: format!("declared size {size} exceeds limit"),
        });
    }

    let mut decoder = Decompress::new(true);
    let mut out = Vec::with_capacity(expected.clamp(64, INITIAL_INFLATE_CAPACITY));

    loop {
        if out.len() == out.capacity() {
            out.reserve(out.capacity().max(64));
        }
        let consumed = decoder.total_in() as usize;
        let produced = out.len();
        let status = decoder
            .decompress_vec(&input[consumed..], &mut out, FlushDecompress::None)
            .map_err(|e| ParseError::Inflate {
                index,
                offset,
                reason: e.to_string(),
            })?;

        match status {
            Status::StreamEnd => break,
            Status::Ok | Status::BufError => {
                let stalled = decoder.total_in() as usize == consumed && out.len() == produced;
                if stalled {
                    return Err(ParseError::Inflate {
                        index,
                        offset,
                        reason: "unexpected end of zlib stream".to_string(),
                    });
                }
                if out.len() > MAX_INFLATED_SIZE {
                    return Err(ParseError::Inflate {
                        index,
                        offset,
                        reason: "inflated size exceeds limit".to_string(),
                    });
                }
            }
        }
    }

    if out.len() as u64 != size {
        warn!(
            index,
            declared = size,
            actual = out.len(),
            "Pack entry size mismatch"
        );
    }

    Ok((out, decoder.total_in() as usize))
}

/// Locate the PACK section after the command section of a request body.
///
/// Returns `None` when nothing follows the flush packet (ref deletion).
pub fn locate(body: &[u8], after_flush: usize) -> ParseResult<Option<usize>> {
    let rest = body.get(after_flush..).unwrap_or_default();
    if rest.is_empty() {
        return Ok(None);
    }
    if rest.starts_with(PACK_SIGNATURE) {
        return Ok(Some(after_flush));
    }

    // push-options travel as a second pkt-line section before the pack
    let options = crate::pktline::parse(rest)?;
    let start = after_flush + options.end;
    match body.get(start..) {
        None | Some([]) => Ok(None),
        Some(tail) if tail.starts_with(PACK_SIGNATURE) => Ok(Some(start)),
        Some(tail) => Err(ParseError::BadSignature {
            found: String::from_utf8_lossy(&tail[..tail.len().min(4)]).into_owned(),
        }),
    }
}
