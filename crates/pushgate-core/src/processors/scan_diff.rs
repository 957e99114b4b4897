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

//! Content scan of added lines
//!
//! Reads the content of the `diff` step and checks every added line against
//! the configured `[commit.diff]` rules. When the diff step errored or left
//! no content there is nothing to scan and the push passes.

use super::{get_diff, Processor};
use crate::action::{Action, Step};
use crate::context::ProxyContext;
use crate::diff;
use crate::error::ProcessResult;
use crate::policy::PolicyRules;
use crate::request::GitRequest;
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::info;

/// Step name
pub const NAME: &str = "scanDiff";

/// One rule hit, grouped by rule, matched text and file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffMatch {
    /// Rule label: `Offending Literal`, `Offending Pattern` or a provider
    pub kind: String,
    /// Matched text
    pub literal: String,
    /// File the match was found in
    pub file: String,
    /// Line numbers in the new file
    pub lines: Vec<u32>,
}

/// Every rule hit in the added lines of `diff`, in first-seen order
pub fn find_matches(diff: &str, rules: &PolicyRules, project: &str) -> Vec<DiffMatch> {
    let mut matches: Vec<DiffMatch> = Vec::new();
    let mut index: HashMap<(String, String, String), usize> = HashMap::new();

    for file in diff::parse(diff) {
        let name = file.name().to_string();
        for added in &file.added {
            for rule in rules.diff_rules_for(project) {
                for found in rule.regex.find_iter(&added.content) {
                    let key = (
                        rule.label.clone(),
                        found.as_str().to_string(),
                        name.clone(),
                    );
                    let slot = *index.entry(key).or_insert_with(|| {
                        matches.push(DiffMatch {
                            kind: rule.label.clone(),
                            literal: found.as_str().to_string(),
                            file: name.clone(),
                            lines: Vec::new(),
                        });
                        matches.len() - 1
                    });
                    matches[slot].lines.push(added.line);
                }
            }
        }
    }
    matches
}

fn format_matches(matches: &[DiffMatch]) -> String {
    matches
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let lines: Vec<String> = m.lines.iter().map(u32::to_string).collect();
            format!(
                "---------------------------------- #{} {} ------------------------------\n    \
                 Policy Exception Type: {}\n    \
                 DETECTED: {} \n    \
                 FILE(S) LOCATED: {}\n    \
                 Line(s) of code: {}",
                i + 1,
                m.kind,
                m.kind,
                m.literal,
                m.file,
                lines.join(",")
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Blocks pushes whose added lines match a diff rule
#[derive(Debug, Default, Clone, Copy)]
pub struct ScanDiff;

#[async_trait]
impl Processor for ScanDiff {
    fn name(&self) -> &str {
        NAME
    }

    async fn exec(
        &self,
        ctx: &ProxyContext,
        _req: &GitRequest,
        action: &Action,
    ) -> ProcessResult<Action> {
        let mut action = action.clone();
        let mut step = Step::new(NAME);

        let diff = action
            .find_step(get_diff::NAME)
            .and_then(|step| step.content.as_str())
            .unwrap_or_default();

        if diff.is_empty() {
            step.log("No commit diff to scan");
            action.add_step(step);
            return Ok(action);
        }

        let matches = find_matches(diff, &ctx.rules, &action.project);
        if matches.is_empty() {
            step.log("No offending content found");
        } else {
            let range = format!(
                "{}:{}",
                action.commit_from.as_deref().unwrap_or_default(),
                action.commit_to.as_deref().unwrap_or_default()
            );
            info!(action_id = %action.id, matches = matches.len(), "Diff is blocked");
            step.log(format!("The following diff is illegal: {range}"));
            step.block(format!(
                "\n\n\n\nYour push has been blocked.\n\n\
                 Please ensure your code does not contain sensitive information or URLs.\n\n\n\
                 {}\n\n",
                format_matches(&matches)
            ));
        }

        action.add_step(step);
        Ok(action)
    }
}
