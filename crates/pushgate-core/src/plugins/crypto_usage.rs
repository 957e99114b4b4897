//! Hand-rolled cryptography detector
//!
//! Plugins run before the clone exists, so the scan reads the blobs carried
//! in the pushed PACK. Delta entries are not resolved; only whole blobs are
//! scanned.

use crate::action::{Action, Step};
use crate::context::ProxyContext;
use crate::error::ProcessResult;
use crate::processors::Processor;
use crate::request::GitRequest;
use async_trait::async_trait;
use pushgate_protocol::{pack, pktline, ObjectKind, Pack, ParseResult};
use regex_lite::{Regex, RegexBuilder};
use std::fmt;
use tracing::{debug, info};

/// Step name
pub const NAME: &str = "checkCryptoImplementation";

const NON_STANDARD_ALGORITHMS: &[&str] = &[
    r"xor\s*\(",
    "rot13",
    r"caesar\s*cipher",
    r"custom\s*encrypt",
    r"simple\s*encrypt",
    r"homebrew\s*crypto",
    r"custom\s*hash",
];

const SUSPICIOUS_OPERATIONS: &[&str] = &[
    r"bit\s*shift",
    r"bit\s*rotate",
    r"\^=",
    ">>>",
    "<<<",
    r"shuffle\s*bytes",
];

const SUSPICIOUS_VARIABLES: &[&str] = &[
    "cipher",
    "encrypt",
    "decrypt",
    "scramble",
    r"salt\b",
    r"iv\b",
    "nonce",
];

/// How strongly a finding suggests custom crypto
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Crypto-flavoured variable names
    Low,
    /// Bit twiddling
    Medium,
    /// Named non-standard algorithms; blocks the push
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
        }
    }
}

/// One pattern that matched a blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoFinding {
    /// Finding severity
    pub severity: Severity,
    /// Matched text, deduplicated
    pub matches: Vec<String>,
    /// Human-readable description
    pub message: String,
}

/// Blocks pushes containing non-standard encryption algorithms
#[derive(Debug, Clone)]
pub struct CryptoUsage {
    rules: Vec<(Severity, Regex)>,
}

impl Default for CryptoUsage {
    fn default() -> Self {
        Self::new()
    }
}

fn rules<'a>(
    severity: Severity,
    patterns: &'a [&'a str],
) -> impl Iterator<Item = (Severity, Regex)> + 'a {
    patterns.iter().filter_map(move |pattern| {
        RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .ok()
            .map(|regex| (severity, regex))
    })
}

impl CryptoUsage {
    /// Detector with the built-in pattern set
    pub fn new() -> Self {
        let rules = rules(Severity::High, NON_STANDARD_ALGORITHMS)
            .chain(rules(Severity::Medium, SUSPICIOUS_OPERATIONS))
            .chain(rules(Severity::Low, SUSPICIOUS_VARIABLES))
            .collect();
        CryptoUsage { rules }
    }

    /// Findings for one piece of source text
    pub fn analyze(&self, content: &str) -> Vec<CryptoFinding> {
        let mut findings = Vec::new();
        for (severity, regex) in &self.rules {
            let mut matches: Vec<String> = Vec::new();
            for found in regex.find_iter(content) {
                let text = found.as_str().to_string();
                if !matches.contains(&text) {
                    matches.push(text);
                }
            }
            if matches.is_empty() {
                continue;
            }
            let what = match severity {
                Severity::High => "Detected possible non-standard encryption algorithm",
                Severity::Medium => "Detected suspicious cryptographic operation",
                Severity::Low => "Detected potential encryption-related variable",
            };
            findings.push(CryptoFinding {
                severity: *severity,
                message: format!("{what}: {}", matches.join(", ")),
                matches,
            });
        }
        findings
    }
}

/// UTF-8 blobs carried in a receive-pack body
fn pushed_texts(body: &[u8]) -> ParseResult<Vec<String>> {
    let lines = pktline::parse(body)?;
    let Some(offset) = pack::locate(body, lines.end)? else {
        return Ok(Vec::new());
    };
    let pack = Pack::parse(&body[offset..])?;
    Ok(pack
        .of_kind(ObjectKind::Blob)
        .filter(|entry| !entry.data.contains(&0))
        .filter_map(|entry| String::from_utf8(entry.data.clone()).ok())
        .collect())
}

#[async_trait]
impl Processor for CryptoUsage {
    fn name(&self) -> &str {
        NAME
    }

    async fn exec(
        &self,
        _ctx: &ProxyContext,
        req: &GitRequest,
        action: &Action,
    ) -> ProcessResult<Action> {
        let mut action = action.clone();
        let mut step = Step::new(NAME);

        let texts = match pushed_texts(&req.body) {
            Ok(texts) => texts,
            Err(e) => {
                debug!(error = %e, "No readable pack, skipping crypto scan");
                Vec::new()
            }
        };

        let mut blocking = Vec::new();
        for text in &texts {
            for finding in self.analyze(text) {
                step.log(format!("{}: {}", finding.severity, finding.message));
                if finding.severity == Severity::High {
                    blocking.push(format!("- {}: {}", finding.severity, finding.message));
                }
            }
        }

        if blocking.is_empty() {
            step.log(format!("Scanned {} file(s)", texts.len()));
        } else {
            info!(action_id = %action.id, findings = blocking.len(), "Custom crypto detected");
            step.block(format!(
                "\n\nYour push has been blocked.\n\
                 Potential non-standard cryptographic implementations detected:\n\n\
                 {}\n\n\
                 Please use standard cryptographic libraries instead of custom implementations.\n",
                blocking.join("\n")
            ));
        }

        action.add_step(step);
        Ok(action)
    }
}
