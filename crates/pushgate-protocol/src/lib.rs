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

//! Git smart-HTTP receive-pack parsing for pushgate
//!
//! This crate decodes the request body of a `git push` far enough to make
//! policy decisions about it:
//! - pkt-line framing up to the first flush packet
//! - ref-update commands and capabilities
//! - the PACK header and the inflated pack entries
//! - commit and annotated-tag metadata
//! - the sideband packet used to report a rejection back to the client
//!
//! Nothing here performs I/O.
//!
//! # Examples
//!
//! ```
//! use pushgate_protocol::{pktline, CommandList};
//!
//! let line = format!("{} {} refs/heads/main\0report-status\n", "0".repeat(40), "a".repeat(40));
//! let mut body = pktline::encode(line.as_bytes()).unwrap();
//! body.extend_from_slice(pktline::FLUSH_PKT);
//!
//! let lines = pktline::parse(&body).unwrap();
//! let commands = CommandList::parse(&lines.texts()).unwrap();
//! assert_eq!(commands.primary().unwrap().short_name(), "main");
//! ```

pub mod commands;
pub mod error;
pub mod object;
pub mod pack;
pub mod pktline;
pub mod sideband;

pub use commands::{is_object_id, is_zero_id, CommandList, RefUpdate, UpdateKind, ZERO_ID};
pub use error::{ParseError, ParseResult};
pub use object::{parse_commit, parse_tag, CommitData, TagData};
pub use pack::{DeltaBase, ObjectKind, Pack, PackEntry, PackMeta, PACK_SIGNATURE};
pub use pktline::PktLines;
pub use sideband::error_packet;
