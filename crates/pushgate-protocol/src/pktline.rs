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

//! pkt-line framing
//!
//! ```text
//! [len: 4 ASCII hex digits, counts itself][payload: len - 4 bytes]
//! ...
//! 0000                                    <- flush packet
//! ```
//!
//! Lengths 0001..=0003 are never valid on the receive-pack request path.

use crate::error::{ParseError, ParseResult};

/// Size of the hex length prefix
pub const PREFIX_LEN: usize = 4;

/// The flush packet
pub const FLUSH_PKT: &[u8; 4] = b"0000";

/// Largest length a pkt-line may declare
pub const MAX_PKT_LEN: usize = 0xffff;

/// The pkt-lines that precede the first flush packet of a request body
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PktLines {
    /// Raw payloads, prefix stripped, in wire order
    pub lines: Vec<Vec<u8>>,
    /// Offset of the first byte after the flush packet
    pub end: usize,
}

impl PktLines {
    /// Payloads decoded as UTF-8 (lossy), trailing LF removed
    pub fn texts(&self) -> Vec<String> {
        self.lines
            .iter()
            .map(|line| {
                let text = String::from_utf8_lossy(line);
                text.strip_suffix('\n').unwrap_or(&text).to_string()
            })
            .collect()
    }

    /// Re-encode the lines and the terminating flush packet
    pub fn encode(&self) -> ParseResult<Vec<u8>> {
        let mut out = Vec::with_capacity(self.end);
        for line in &self.lines {
            out.extend_from_slice(&encode(line)?);
        }
        out.extend_from_slice(FLUSH_PKT);
        Ok(out)
    }
}

/// Decode the pkt-lines preceding the first flush packet.
///
/// Nothing is returned on failure; the caller never sees a partial list.
pub fn parse(buf: &[u8]) -> ParseResult<PktLines> {
    let mut lines = Vec::new();
    let mut offset = 0;

    loop {
        if offset == buf.len() {
            return Err(ParseError::MissingFlush { offset });
        }

        let length = read_length(buf, offset)?;
        if length == 0 {
            return Ok(PktLines {
                lines,
                end: offset + PREFIX_LEN,
            });
        }

        let remaining = buf.len() - offset;
        if length > remaining {
            return Err(ParseError::Truncated {
                offset,
                declared: length,
                remaining,
            });
        }

        lines.push(buf[offset + PREFIX_LEN..offset + length].to_vec());
        offset += length;
    }
}

/// Read and validate the length prefix at `offset`
fn read_length(buf: &[u8], offset: usize) -> ParseResult<usize> {
    let remaining = buf.len() - offset;
    if remaining < PREFIX_LEN {
        return Err(ParseError::Truncated {
            offset,
            declared: PREFIX_LEN,
            remaining,
        });
    }

    let prefix = &buf[offset..offset + PREFIX_LEN];
    let invalid = || ParseError::InvalidLengthPrefix {
        offset,
        prefix: String::from_utf8_lossy(prefix).into_owned(),
    };

    // from_str_radix accepts a leading '+', the wire format does not
    if !prefix.iter().all(u8::is_ascii_hexdigit) {
        return Err(invalid());
    }
    let text = std::str::from_utf8(prefix).map_err(|_| invalid())?;
    let length = usize::from_str_radix(text, 16).map_err(|_| invalid())?;

    if length != 0 && length < PREFIX_LEN {
        return Err(ParseError::InvalidLength { offset, length });
    }
    Ok(length)
}

/// Encode a single payload as a pkt-line
pub fn encode(payload: &[u8]) -> ParseResult<Vec<u8>> {
    let length = payload.len() + PREFIX_LEN;
    if length > MAX_PKT_LEN {
        return Err(ParseError::InvalidLength { offset: 0, length });
    }
    let mut out = Vec::with_capacity(length);
    out.extend_from_slice(format!("{length:04x}").as_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}
