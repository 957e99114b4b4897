//! Receive-pack request bodies built in memory
//!
//! Object ids are not checked by the parser, so the pack carries the objects
//! without a valid trailer checksum.

use flate2::write::ZlibEncoder;
use flate2::Compression;
use pushgate_protocol::{is_zero_id, pktline, PACK_SIGNATURE};
use std::io::Write;

const TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";
const CAPABILITIES: &str = "report-status side-band-64k agent=git/2.43.0";
const TIMESTAMP: &str = "1700000000 +0000";

const COMMIT: u8 = 1;
const BLOB: u8 = 3;
const TAG: u8 = 4;

/// Builder for a `git-receive-pack` request body.
///
/// # Example
/// ```
/// use pushgate_test_utils::PushBody;
///
/// let body = PushBody::new()
///     .update(&"1".repeat(40), &"2".repeat(40), "refs/heads/main")
///     .commit("Jane <jane@example.com>", "Jane <jane@example.com>", &"1".repeat(40), "Fix\n")
///     .build();
/// assert!(body.windows(4).any(|w| w == b"PACK"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct PushBody {
    updates: Vec<(String, String, String)>,
    objects: Vec<(u8, Vec<u8>)>,
    without_pack: bool,
}

impl PushBody {
    /// Empty body
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a ref-update command
    pub fn update(mut self, old: &str, new: &str, name: &str) -> Self {
        self.updates
            .push((old.to_string(), new.to_string(), name.to_string()));
        self
    }

    /// Add a commit object. Identities are `Name <email>`; a zero parent
    /// makes a root commit.
    pub fn commit(mut self, author: &str, committer: &str, parent: &str, message: &str) -> Self {
        let mut text = format!("tree {TREE}\n");
        if !is_zero_id(parent) {
            text.push_str(&format!("parent {parent}\n"));
        }
        text.push_str(&format!("author {author} {TIMESTAMP}\n"));
        text.push_str(&format!("committer {committer} {TIMESTAMP}\n\n{message}"));
        self.objects.push((COMMIT, text.into_bytes()));
        self
    }

    /// Add an annotated tag object
    pub fn tag(mut self, object: &str, name: &str, tagger: &str, message: &str) -> Self {
        let text = format!(
            "object {object}\ntype commit\ntag {name}\ntagger {tagger} {TIMESTAMP}\n\n{message}"
        );
        self.objects.push((TAG, text.into_bytes()));
        self
    }

    /// Add a blob object
    pub fn blob(mut self, content: &str) -> Self {
        self.objects.push((BLOB, content.as_bytes().to_vec()));
        self
    }

    /// Stop after the flush packet, as a deletion-only push does
    pub fn without_pack(mut self) -> Self {
        self.without_pack = true;
        self
    }

    /// Encode the body
    pub fn build(&self) -> Vec<u8> {
        let mut body = Vec::new();
        for (i, (old, new, name)) in self.updates.iter().enumerate() {
            let line = if i == 0 {
                format!("{old} {new} {name}\0{CAPABILITIES}\n")
            } else {
                format!("{old} {new} {name}\n")
            };
            body.extend(pktline::encode(line.as_bytes()).expect("command fits in a pkt-line"));
        }
        body.extend_from_slice(pktline::FLUSH_PKT);

        if !self.without_pack {
            body.extend(self.pack());
        }
        body
    }

    fn pack(&self) -> Vec<u8> {
        let mut pack = Vec::new();
        pack.extend_from_slice(PACK_SIGNATURE);
        pack.extend_from_slice(&2u32.to_be_bytes());
        pack.extend_from_slice(&(self.objects.len() as u32).to_be_bytes());
        for (kind, data) in &self.objects {
            pack.extend(entry_header(*kind, data.len()));
            pack.extend(deflate(data));
        }
        pack.extend_from_slice(&[0u8; 20]);
        pack
    }
}

fn entry_header(kind: u8, mut size: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut byte = (kind << 4) | (size & 0x0f) as u8;
    size >>= 4;
    while size > 0 {
        out.push(byte | 0x80);
        byte = (size & 0x7f) as u8;
        size >>= 7;
    }
    out.push(byte);
    out
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("write to memory");
    encoder.finish().expect("finish deflate")
}
