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

//! Commit and annotated-tag object decoding

use crate::commands::ZERO_ID;
use crate::error::{ParseError, ParseResult};
use serde::{Deserialize, Serialize};

/// Metadata of one pushed commit
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitData {
    /// Root tree id
    pub tree: String,
    /// First parent, or the zero id for a root commit
    pub parent: String,
    /// Every parent in header order
    #[serde(default)]
    pub parents: Vec<String>,
    /// Author name
    pub author: String,
    /// Committer name
    pub committer: String,
    /// Author email
    pub author_email: String,
    /// Committer email
    pub committer_email: String,
    /// Committer timestamp, seconds since the epoch
    pub commit_timestamp: String,
    /// Full commit message
    pub message: String,
}

/// Metadata of one pushed annotated tag
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagData {
    /// Id of the tagged object
    pub object: String,
    /// Type of the tagged object
    #[serde(rename = "type")]
    pub object_type: String,
    /// Tag name
    pub tag: String,
    /// Tagger name
    pub tagger: String,
    /// Tagger email
    pub tagger_email: String,
    /// Tagger timestamp, seconds since the epoch
    pub timestamp: String,
    /// Tag message
    pub message: String,
}

/// `Name <email> <seconds> <tz>`
#[derive(Debug, PartialEq, Eq)]
struct Identity<'a> {
    name: &'a str,
    email: &'a str,
    timestamp: &'a str,
}

fn parse_identity(value: &str) -> Option<Identity<'_>> {
    let open = value.find('<')?;
    let close = open + value[open..].find('>')?;
    let name = value[..open].trim();
    let email = value[open + 1..close].trim();
    let timestamp = value[close + 1..].split_whitespace().next().unwrap_or("");
    Some(Identity {
        name,
        email,
        timestamp,
    })
}

/// Split an object into `(key, value)` headers and the message body.
///
/// Continuation lines (leading space, e.g. `gpgsig`) are folded into the
/// preceding header and otherwise ignored.
fn split_headers(text: &str) -> (Vec<(&str, &str)>, &str) {
    let (head, message) = match text.split_once("\n\n") {
        Some((head, message)) => (head, message),
        None => (text.trim_end_matches('\n'), ""),
    };

    let headers = head
        .lines()
        .filter(|line| !line.starts_with(' '))
        .filter_map(|line| line.split_once(' '))
        .collect();

    (headers, message)
}

/// Decode the payload of a commit object
pub fn parse_commit(data: &[u8]) -> ParseResult<CommitData> {
    let text = String::from_utf8_lossy(data);
    let (headers, message) = split_headers(&text);

    let mut commit = CommitData {
        message: message.to_string(),
        ..CommitData::default()
    };
    let mut author = None;
    let mut committer = None;

    for (key, value) in headers {
        match key {
            "tree" => commit.tree = value.to_string(),
            "parent" => commit.parents.push(value.to_string()),
            "author" => author = parse_identity(value),
            "committer" => committer = parse_identity(value),
            _ => {}
        }
    }

    if commit.tree.is_empty() {
        return Err(ParseError::invalid_commit("missing tree header"));
    }
    let author = author.ok_or_else(|| ParseError::invalid_commit("missing author header"))?;
    let committer =
        committer.ok_or_else(|| ParseError::invalid_commit("missing committer header"))?;

    commit.parent = commit
        .parents
        .first()
        .cloned()
        .unwrap_or_else(|| ZERO_ID.to_string());
    commit.author = author.name.to_string();
    commit.author_email = author.email.to_string();
    commit.committer = committer.name.to_string();
    commit.committer_email = committer.email.to_string();
    commit.commit_timestamp = committer.timestamp.to_string();

    Ok(commit)
}

/// Decode the payload of an annotated tag object
pub fn parse_tag(data: &[u8]) -> ParseResult<TagData> {
    let text = String::from_utf8_lossy(data);
    let (headers, message) = split_headers(&text);

    let mut tag = TagData {
        message: message.to_string(),
        ..TagData::default()
    };

    for (key, value) in headers {
        match key {
            "object" => tag.object = value.to_string(),
            "type" => tag.object_type = value.to_string(),
            "tag" => tag.tag = value.to_string(),
            "tagger" => {
                if let Some(identity) = parse_identity(value) {
                    tag.tagger = identity.name.to_string();
                    tag.tagger_email = identity.email.to_string();
                    tag.timestamp = identity.timestamp.to_string();
                }
            }
            _ => {}
        }
    }

    if tag.object.is_empty() {
        return Err(ParseError::invalid_tag("missing object header"));
    }
    if tag.tag.is_empty() {
        return Err(ParseError::invalid_tag("missing tag header"));
    }

    Ok(tag)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const COMMIT: &str = "tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904
parent 1111111111111111111111111111111111111111
parent 2222222222222222222222222222222222222222
author Jane Doe <jane@example.com> 1700000000 +0100
committer John Roe <john@example.com> 1700000100 +0000
gpgsig -----BEGIN PGP SIGNATURE-----
 iQEzBAABCAAdFiEE
 -----END PGP SIGNATURE-----

Merge feature

Second paragraph.
";

    #[test]
    fn test_parse_commit_headers() {
        let commit = parse_commit(COMMIT.as_bytes()).unwrap();

        assert_eq!(commit.tree, "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
        assert_eq!(commit.parent, "1111111111111111111111111111111111111111");
        assert_eq!(commit.parents.len(), 2);
        assert_eq!(commit.author, "Jane Doe");
        assert_eq!(commit.author_email, "jane@example.com");
        assert_eq!(commit.committer, "John Roe");
        assert_eq!(commit.committer_email, "john@example.com");
        assert_eq!(commit.commit_timestamp, "1700000100");
        assert_eq!(commit.message, "Merge feature\n\nSecond paragraph.\n");
    }

    #[test]
    fn test_root_commit_parent_is_zero() {
        let data = "tree abc\nauthor A <a@x.io> 1 +0000\ncommitter A <a@x.io> 1 +0000\n\nroot\n";
        let commit = parse_commit(data.as_bytes()).unwrap();
        assert_eq!(commit.parent, ZERO_ID);
        assert!(commit.parents.is_empty());
    }

    #[test]
    fn test_commit_without_committer_is_rejected() {
        let data = "tree abc\nauthor A <a@x.io> 1 +0000\n\nmsg\n";
        let err = parse_commit(data.as_bytes()).unwrap_err();
        assert_eq!(err, ParseError::invalid_commit("missing committer header"));
    }

    #[test]
    fn test_commit_data_serializes_camel_case() {
        let commit = parse_commit(COMMIT.as_bytes()).unwrap();
        let json = serde_json::to_value(&commit).unwrap();
        assert_eq!(json["authorEmail"], "jane@example.com");
        assert_eq!(json["commitTimestamp"], "1700000100");
    }

    #[test]
    fn test_parse_annotated_tag() {
        let data = "object 1111111111111111111111111111111111111111
type commit
tag v1.2.0
tagger Rel Eng <release@example.com> 1700000200 +0000

Release 1.2.0
";
        let tag = parse_tag(data.as_bytes()).unwrap();
        assert_eq!(tag.object_type, "commit");
        assert_eq!(tag.tag, "v1.2.0");
        assert_eq!(tag.tagger, "Rel Eng");
        assert_eq!(tag.tagger_email, "release@example.com");
        assert_eq!(tag.timestamp, "1700000200");
        assert_eq!(tag.message, "Release 1.2.0\n");
    }

    #[test]
    fn test_tag_without_object_is_rejected() {
        let err = parse_tag(b"tag v1\n\nmsg").unwrap_err();
        assert!(matches!(err, ParseError::InvalidObject { kind: "tag", .. }));
    }
}
