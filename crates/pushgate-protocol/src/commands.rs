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

//! Receive-pack ref-update commands
//!
//! Each pkt-line before the flush packet has the form
//! `<old-oid> SP <new-oid> SP <refname>[NUL <capabilities>]`.
//! Only the first line carries capabilities.

use crate::error::{ParseError, ParseResult};
use serde::{Deserialize, Serialize};

/// The all-zero object id used for ref creation and deletion
pub const ZERO_ID: &str = "0000000000000000000000000000000000000000";

const BRANCH_PREFIX: &str = "refs/heads/";
const TAG_PREFIX: &str = "refs/tags/";

/// What a single ref-update does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateKind {
    /// old is zero, new is not
    Create,
    /// both ids are set
    Update,
    /// new is zero, old is not
    Delete,
}

/// One `<old> <new> <ref>` command sent by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefUpdate {
    /// Object id the ref pointed at before the push
    pub old: String,
    /// Object id the ref should point at after the push
    pub new: String,
    /// Full ref name, e.g. `refs/heads/main`
    pub name: String,
}

impl RefUpdate {
    /// Classify the update from its ids
    pub fn kind(&self) -> UpdateKind {
        match (is_zero_id(&self.old), is_zero_id(&self.new)) {
            (true, _) => UpdateKind::Create,
            (false, true) => UpdateKind::Delete,
            (false, false) => UpdateKind::Update,
        }
    }

    /// True for `refs/tags/*`
    pub fn is_tag(&self) -> bool {
        self.name.starts_with(TAG_PREFIX)
    }

    /// True for `refs/heads/*`
    pub fn is_branch(&self) -> bool {
        self.name.starts_with(BRANCH_PREFIX)
    }

    /// The ref name without its `refs/heads/` or `refs/tags/` prefix
    pub fn short_name(&self) -> &str {
        self.name
            .strip_prefix(BRANCH_PREFIX)
            .or_else(|| self.name.strip_prefix(TAG_PREFIX))
            .unwrap_or(&self.name)
    }
}

/// Parsed command section of a receive-pack request
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommandList {
    /// Updates in the order the client sent them
    pub updates: Vec<RefUpdate>,
    /// Capabilities advertised on the first command line
    pub capabilities: Vec<String>,
}

impl CommandList {
    /// Parse the pre-flush pkt-line payloads of a push
    pub fn parse<S: AsRef<str>>(lines: &[S]) -> ParseResult<Self> {
        let mut list = CommandList::default();

        for raw in lines {
            let line = raw.as_ref().trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                continue;
            }
            // shallow lines carry no ref update
            if line.starts_with("shallow ") {
                continue;
            }

            let (command, caps) = match line.split_once('\0') {
                Some((command, caps)) => (command, Some(caps)),
                None => (line, None),
            };

            if list.updates.is_empty() {
                if let Some(caps) = caps {
                    list.capabilities = caps.split_whitespace().map(str::to_string).collect();
                }
            }

            list.updates.push(parse_command(command)?);
        }

        Ok(list)
    }

    /// The update that drives classification of the push
    pub fn primary(&self) -> Option<&RefUpdate> {
        self.updates.first()
    }

    /// Number of ref updates
    pub fn len(&self) -> usize {
        self.updates.len()
    }

    /// True when the client sent no commands
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

fn parse_command(command: &str) -> ParseResult<RefUpdate> {
    let invalid = || ParseError::InvalidCommand {
        line: command.to_string(),
    };

    let mut parts = command.splitn(3, ' ');
    let old = parts.next().ok_or_else(invalid)?;
    let new = parts.next().ok_or_else(invalid)?;
    let name = parts.next().ok_or_else(invalid)?.trim();

    if !is_object_id(old) || !is_object_id(new) || name.is_empty() {
        return Err(invalid());
    }
    if is_zero_id(old) && is_zero_id(new) {
        return Err(invalid());
    }

    Ok(RefUpdate {
        old: old.to_ascii_lowercase(),
        new: new.to_ascii_lowercase(),
        name: name.to_string(),
    })
}

/// True for a 40 (SHA-1) or 64 (SHA-256) character hex id
pub fn is_object_id(id: &str) -> bool {
    matches!(id.len(), 40 | 64) && id.bytes().all(|b| b.is_ascii_hexdigit())
}

/// True when every character of `id` is `0`
pub fn is_zero_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b == b'0')
}
