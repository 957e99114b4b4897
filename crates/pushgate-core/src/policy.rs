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

//! Compiled commit rules
//!
//! Rules are compiled once at startup from `[commit]` and shared by every
//! chain execution. All matching is case-insensitive. Literals are escaped,
//! so they only ever match themselves.

use pushgate_config::{CommitConfig, ConfigError, ConfigResult};
use regex_lite::{Regex, RegexBuilder};

/// Label of a match produced by a configured diff literal
pub const OFFENDING_LITERAL: &str = "Offending Literal";

/// Label of a match produced by a configured diff pattern
pub const OFFENDING_PATTERN: &str = "Offending Pattern";

fn compile(field: &str, pattern: &str) -> ConfigResult<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| ConfigError::invalid_pattern(field, pattern, e.to_string()))
}

fn compile_literal(literal: &str) -> ConfigResult<Regex> {
    compile("literal", &regex_lite::escape(literal))
}

/// A labelled diff rule
#[derive(Debug, Clone)]
pub struct DiffRule {
    /// `Offending Literal`, `Offending Pattern` or a provider name
    pub label: String,
    /// Compiled expression
    pub regex: Regex,
}

/// Every `[commit]` rule in compiled form
#[derive(Debug, Clone)]
pub struct PolicyRules {
    message_rules: Vec<Regex>,
    email_local_block: Option<Regex>,
    email_domain_allow: Regex,
    diff_rules: Vec<DiffRule>,
    provider_rules: Vec<DiffRule>,
    private_organizations: Vec<String>,
}

impl PolicyRules {
    /// Compile the rules; fails on the first invalid expression
    pub fn compile(commit: &CommitConfig, private_organizations: &[String]) -> ConfigResult<Self> {
        let mut message_rules = Vec::new();
        for literal in &commit.message.block_literals {
            message_rules.push(compile_literal(literal)?);
        }
        for pattern in &commit.message.block_patterns {
            message_rules.push(compile("commit.message.block_patterns", pattern)?);
        }

        let email = &commit.author.email;
        let email_local_block = if email.local_block.is_empty() {
            None
        } else {
            Some(compile("commit.author.email.local_block", &email.local_block)?)
        };
        let email_domain_allow = compile("commit.author.email.domain_allow", &email.domain_allow)?;

        let mut diff_rules = Vec::new();
        for literal in &commit.diff.block_literals {
            diff_rules.push(DiffRule {
                label: OFFENDING_LITERAL.to_string(),
                regex: compile_literal(literal)?,
            });
        }
        for pattern in &commit.diff.block_patterns {
            diff_rules.push(DiffRule {
                label: OFFENDING_PATTERN.to_string(),
                regex: compile("commit.diff.block_patterns", pattern)?,
            });
        }

        let mut provider_rules = Vec::new();
        for (name, pattern) in &commit.diff.providers {
            provider_rules.push(DiffRule {
                label: name.clone(),
                regex: compile(&format!("commit.diff.providers.{name}"), pattern)?,
            });
        }

        Ok(PolicyRules {
            message_rules,
            email_local_block,
            email_domain_allow,
            diff_rules,
            provider_rules,
            private_organizations: private_organizations.to_vec(),
        })
    }

    /// Rules that accept everything
    pub fn permissive() -> ConfigResult<Self> {
        Self::compile(&CommitConfig::default(), &[])
    }

    /// False when the message is empty or matches a block rule
    pub fn message_allowed(&self, message: &str) -> bool {
        if message.is_empty() {
            return false;
        }
        !self.message_rules.iter().any(|rule| rule.is_match(message))
    }

    /// False for malformed addresses and addresses outside the configured rules
    pub fn email_allowed(&self, email: &str) -> bool {
        let Some((local, domain)) = split_email(email) else {
            return false;
        };
        if !self.email_domain_allow.is_match(domain) {
            return false;
        }
        if let Some(block) = &self.email_local_block {
            if block.is_match(local) {
                return false;
            }
        }
        true
    }

    /// Diff rules that apply to `project`; providers are skipped for private organisations
    pub fn diff_rules_for<'a>(&'a self, project: &str) -> impl Iterator<Item = &'a DiffRule> {
        let private = self
            .private_organizations
            .iter()
            .any(|org| org.eq_ignore_ascii_case(project));
        let providers: &[DiffRule] = if private { &[] } else { &self.provider_rules };
        self.diff_rules.iter().chain(providers.iter())
    }
}

/// `local@domain` with a dotted domain and no whitespace
fn split_email(email: &str) -> Option<(&str, &str)> {
    if email.chars().any(char::is_whitespace) {
        return None;
    }
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.contains('@') {
        return None;
    }
    let mut labels = domain.split('.');
    let dotted = domain.contains('.')
        && labels.all(|label| {
            !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        });
    dotted.then_some((local, domain))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn commit() -> CommitConfig {
        let mut commit = CommitConfig::default();
        commit.message.block_literals = vec!["password".to_string(), "a.b".to_string()];
        commit.message.block_patterns = vec![r"https?://\S+".to_string()];
        commit.author.email.domain_allow = r"^example\.com$".to_string();
        commit.author.email.local_block = "^noreply".to_string();
        commit.diff.block_literals = vec!["secret".to_string()];
        commit.diff.providers = BTreeMap::from([("AWS".to_string(), "AKIA[0-9A-Z]{16}".to_string())]);
        commit
    }

    #[test]
    fn test_message_rules() {
        let rules = PolicyRules::compile(&commit(), &[]).unwrap();
        assert!(rules.message_allowed("Fix the build"));
        assert!(!rules.message_allowed("Add PASSWORD to config"));
        assert!(!rules.message_allowed("see http://internal.example"));
        assert!(!rules.message_allowed(""));
    }

    #[test]
    fn test_literals_are_not_patterns() {
        let rules = PolicyRules::compile(&commit(), &[]).unwrap();
        assert!(rules.message_allowed("axb"));
        assert!(!rules.message_allowed("a.b"));
    }

    #[test]
    fn test_email_rules() {
        let rules = PolicyRules::compile(&commit(), &[]).unwrap();
        assert!(rules.email_allowed("jane.doe@example.com"));
        assert!(!rules.email_allowed("jane.doe@other.com"));
        assert!(!rules.email_allowed("noreply@example.com"));
        assert!(!rules.email_allowed("not-an-email"));
        assert!(!rules.email_allowed("a b@example.com"));
        assert!(!rules.email_allowed("a@localhost"));
    }

    #[test]
    fn test_permissive_accepts_valid_email() {
        let rules = PolicyRules::permissive().unwrap();
        assert!(rules.email_allowed("someone@anything.io"));
        assert!(rules.message_allowed("anything"));
    }

    #[test]
    fn test_private_orgs_skip_providers() {
        let rules = PolicyRules::compile(&commit(), &["Internal".to_string()]).unwrap();

        let public: Vec<_> = rules.diff_rules_for("finos").map(|r| r.label.as_str()).collect();
        assert_eq!(public, vec![OFFENDING_LITERAL, "AWS"]);

        let private: Vec<_> = rules
            .diff_rules_for("internal")
            .map(|r| r.label.as_str())
            .collect();
        assert_eq!(private, vec![OFFENDING_LITERAL]);
    }

    #[test]
    fn test_invalid_pattern_names_field() {
        let mut commit = CommitConfig::default();
        commit.message.block_patterns = vec!["(".to_string()];
        let err = PolicyRules::compile(&commit, &[]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }
}
