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

//! Sideband error reporting
//!
//! A blocked push is answered with band-2 (progress) packets followed by a
//! flush, which `git push` prints as `remote: <msg>`. Messages longer than
//! one packet are split on character boundaries.

use crate::pktline::{FLUSH_PKT, PREFIX_LEN};

/// Band carrying progress and error text
pub const BAND_PROGRESS: u8 = 0x02;

/// Largest packet git accepts on a sideband channel
pub const LARGE_PACKET_MAX: usize = 65520;

/// Message bytes that fit in one sideband packet
const MAX_BAND_DATA: usize = LARGE_PACKET_MAX - PREFIX_LEN - 1;

/// Render `msg` as sideband error packets terminated by a flush.
///
/// The text sent is `\t{msg}\n`. Each packet length counts the prefix, the
/// band byte and its share of that text.
pub fn error_packet(msg: &str) -> String {
    let text = format!("\t{msg}\n");
    let mut out = String::with_capacity(text.len() + PREFIX_LEN * 2 + 1);
    let mut rest = text.as_str();

    while !rest.is_empty() {
        let mut cut = rest.len().min(MAX_BAND_DATA);
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        let (chunk, tail) = rest.split_at(cut);
        out.push_str(&format!("{:04x}", PREFIX_LEN + 1 + chunk.len()));
        out.push(char::from(BAND_PROGRESS));
        out.push_str(chunk);
        rest = tail;
    }

    out.push_str(&String::from_utf8_lossy(FLUSH_PKT));
    out
}
