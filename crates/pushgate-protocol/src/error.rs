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

use thiserror::Error;

/// Result type alias for protocol parsing
pub type ParseResult<T> = Result<T, ParseError>;

/// Errors raised while decoding a smart-HTTP request body
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The request carried no bytes at all
    #[error("empty request body")]
    EmptyBody,

    /// The 4-byte length prefix is not ASCII hex
    #[error("invalid pkt-line length prefix {prefix:?} at offset {offset}")]
    InvalidLengthPrefix { offset: usize, prefix: String },

    /// The declared length is smaller than the prefix itself (and not a flush)
    #[error("invalid pkt-line length {length} at offset {offset}")]
    InvalidLength { offset: usize, length: usize },

    /// The declared length runs past the end of the buffer
    #[error(
        "pkt-line at offset {offset} declares {declared} bytes but only {remaining} remain"
    )]
    Truncated {
        offset: usize,
        declared: usize,
        remaining: usize,
    },

    /// The buffer ended before a flush packet was seen
    #[error("missing flush packet after offset {offset}")]
    MissingFlush { offset: usize },

    /// A ref-update command line could not be parsed
    #[error("invalid ref update command: {line:?}")]
    InvalidCommand { line: String },

    /// The pack section is shorter than its 12-byte header
    #[error("pack header too short: {len} bytes")]
    PackTooShort { len: usize },

    /// The pack section does not start with `PACK`
    #[error("invalid pack signature {found:?}")]
    BadSignature { found: String },

    /// A pack entry header is malformed
    #[error("invalid object header for entry {index} at offset {offset}")]
    InvalidObjectHeader { index: u32, offset: usize },

    /// A pack entry's zlib stream could not be inflated
    #[error("failed to inflate entry {index} at offset {offset}: {reason}")]
    Inflate {
        index: u32,
        offset: usize,
        reason: String,
    },

    /// A commit or tag object is missing required headers
    #[error("invalid {kind} object: {reason}")]
    InvalidObject { kind: &'static str, reason: String },
}

impl ParseError {
    /// Create an InvalidObject error for a commit
    pub fn invalid_commit(reason: impl Into<String>) -> Self {
        ParseError::InvalidObject {
            kind: "commit",
            reason: reason.into(),
        }
    }

    /// Create an InvalidObject error for a tag
    pub fn invalid_tag(reason: impl Into<String>) -> Self {
        ParseError::InvalidObject {
            kind: "tag",
            reason: reason.into(),
        }
    }

    /// Byte offset in the request body that triggered the error, if known
    pub fn offset(&self) -> Option<usize> {
        match self {
            ParseError::InvalidLengthPrefix { offset, .. }
            | ParseError::InvalidLength { offset, .. }
            | ParseError::Truncated { offset, .. }
            | ParseError::MissingFlush { offset }
            | ParseError::InvalidObjectHeader { offset, .. }
            | ParseError::Inflate { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}
