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

//! Receive-pack payload parsing

use super::Processor;
use crate::action::{Action, ActionType, Step};
use crate::context::ProxyContext;
use crate::error::ProcessResult;
use crate::request::GitRequest;
use async_trait::async_trait;
use pushgate_protocol::{
    is_zero_id, pack, parse_commit, parse_tag, pktline, CommandList, CommitData, ObjectKind, Pack,
    PackMeta, ParseError, ParseResult, TagData,
};
use serde_json::json;
use tracing::debug;

/// Step name
pub const NAME: &str = "parsePush";

const PARSE_FAILURE: &str = "Unable to parse push. Please contact an administrator for support: ";

/// Everything read from one push body
#[derive(Debug, Clone)]
pub struct ParsedPush {
    /// Ref-update commands
    pub commands: CommandList,
    /// Pack header, absent for deletions
    pub meta: Option<PackMeta>,
    /// Pushed commits, pack order (newest first)
    pub commits: Vec<CommitData>,
    /// Pushed annotated tags
    pub tags: Vec<TagData>,
}

/// Decode a receive-pack request body
pub fn parse_body(body: &[u8]) -> ParseResult<ParsedPush> {
    if body.is_empty() {
        return Err(ParseError::EmptyBody);
    }

    let lines = pktline::parse(body)?;
    let commands = CommandList::parse(&lines.texts())?;
    if commands.is_empty() {
        return Err(ParseError::InvalidCommand {
            line: String::new(),
        });
    }

    let Some(offset) = pack::locate(body, lines.end)? else {
        return Ok(ParsedPush {
            commands,
            meta: None,
            commits: Vec::new(),
            tags: Vec::new(),
        });
    };

    let pack = Pack::parse(&body[offset..])?;
    let commits = pack
        .of_kind(ObjectKind::Commit)
        .map(|entry| parse_commit(&entry.data))
        .collect::<ParseResult<Vec<_>>>()?;
    let tags = pack
        .of_kind(ObjectKind::Tag)
        .map(|entry| parse_tag(&entry.data))
        .collect::<ParseResult<Vec<_>>>()?;

    debug!(
        refs = commands.len(),
        entries = pack.meta.entries,
        commits = commits.len(),
        tags = tags.len(),
        "Parsed push body"
    );

    Ok(ParsedPush {
        commands,
        meta: Some(pack.meta),
        commits,
        tags,
    })
}

/// Fills the commit range, ref and pushed object metadata
#[derive(Debug, Default, Clone, Copy)]
pub struct ParsePush;

impl ParsePush {
    fn apply(action: &mut Action, step: &mut Step, parsed: ParsedPush) {
        let ParsedPush {
            commands,
            meta,
            commits,
            tags,
        } = parsed;

        // primary() is Some: parse_body rejects empty command lists
        if let Some(primary) = commands.primary() {
            action.set_commit(primary.old.clone(), primary.new.clone());
            if primary.is_tag() {
                action.action_type = Some(ActionType::Tag);
                action.tag = Some(primary.name.clone());
            } else {
                action.action_type = Some(if primary.is_branch() {
                    ActionType::Branch
                } else {
                    ActionType::Commit
                });
                action.branch = Some(primary.name.clone());
            }
        }

        if action.commit_from.as_deref().is_some_and(is_zero_id) {
            if let Some(oldest) = commits.last() {
                action.commit_from = Some(oldest.parent.clone());
            }
        }

        if let Some(tip) = commits.first() {
            action.user = Some(tip.committer.clone());
            action.user_email = Some(tip.committer_email.clone());
        } else if let Some(tag) = tags.first() {
            action.user = Some(tag.tagger.clone());
            action.user_email = Some(tag.tagger_email.clone());
        }

        if let Some(user) = &action.user {
            step.log(format!("Push Request received from user {user}"));
        }
        if commands.len() > 1 {
            step.log(format!(
                "Push updates {} refs; {} drives the checks",
                commands.len(),
                commands.updates[0].name
            ));
        }

        step.set_content(json!({
            "meta": meta,
            "refUpdates": commands.updates,
        }));

        action.commit_data = commits;
        action.tag_data = tags;
        action.ref_updates = commands.updates;
    }
}

#[async_trait]
impl Processor for ParsePush {
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

        match parse_body(&req.body) {
            Ok(parsed) => Self::apply(&mut action, &mut step, parsed),
            Err(ParseError::EmptyBody) => {
                step.set_error(format!("{PARSE_FAILURE}No body found in request"));
            }
            Err(e) => step.set_error(format!("{PARSE_FAILURE}{e}")),
        }

        action.add_step(step);
        Ok(action)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use crate::store::MemoryStore;
    use http::{HeaderMap, Method};
    use pushgate_config::Config;
    use pushgate_protocol::ZERO_ID;
    use pushgate_test_utils::PushBody;
    use std::sync::Arc;

    const OLD: &str = "1111111111111111111111111111111111111111";
    const NEW: &str = "2222222222222222222222222222222222222222";

    fn ctx() -> ProxyContext {
        ProxyContext::new(Config::default(), Arc::new(MemoryStore::new())).unwrap()
    }

    fn push_action() -> Action {
        Action::new("1", ActionKind::Push, "POST", 1, "https://github.com/o/r.git")
    }

    async fn run(body: Vec<u8>) -> Action {
        let req = GitRequest::new(Method::POST, "/o/r.git/git-receive-pack", HeaderMap::new(), body);
        ParsePush.exec(&ctx(), &req, &push_action()).await.unwrap()
    }

    #[tokio::test]
    async fn test_branch_push() {
        let body = PushBody::new()
            .update(OLD, NEW, "refs/heads/main")
            .commit(
                "Jane <jane@example.com>",
                "John <john@example.com>",
                OLD,
                "Add feature\n",
            )
            .build();
        let action = run(body).await;

        assert!(action.should_continue());
        assert_eq!(action.id, format!("{OLD}__{NEW}"));
        assert_eq!(action.branch.as_deref(), Some("refs/heads/main"));
        assert_eq!(action.action_type, Some(ActionType::Branch));
        assert_eq!(action.commit_data.len(), 1);
        assert_eq!(action.commit_data[0].author_email, "jane@example.com");
        assert_eq!(action.user.as_deref(), Some("John"));
        assert_eq!(action.user_email.as_deref(), Some("john@example.com"));
        assert_eq!(action.steps[0].content["meta"]["entries"], 1);
    }

    #[tokio::test]
    async fn test_new_branch_takes_parent_of_oldest_commit() {
        let body = PushBody::new()
            .update(ZERO_ID, NEW, "refs/heads/feature")
            .commit("A <a@x.io>", "A <a@x.io>", "3333333333333333333333333333333333333333", "second\n")
            .commit("A <a@x.io>", "A <a@x.io>", OLD, "first\n")
            .build();
        let action = run(body).await;

        assert_eq!(action.commit_from.as_deref(), Some(OLD));
        assert_eq!(action.id, format!("{ZERO_ID}__{NEW}"));
    }

    #[tokio::test]
    async fn test_tag_push() {
        let body = PushBody::new()
            .update(ZERO_ID, NEW, "refs/tags/v1.0")
            .tag(OLD, "v1.0", "Rel <rel@example.com>", "Release\n")
            .build();
        let action = run(body).await;

        assert_eq!(action.action_type, Some(ActionType::Tag));
        assert_eq!(action.tag.as_deref(), Some("refs/tags/v1.0"));
        assert_eq!(action.branch, None);
        assert_eq!(action.tag_data[0].tag, "v1.0");
        assert_eq!(action.user_email.as_deref(), Some("rel@example.com"));
    }

    #[tokio::test]
    async fn test_branch_deletion_without_pack() {
        let body = PushBody::new()
            .update(OLD, ZERO_ID, "refs/heads/old")
            .without_pack()
            .build();
        let action = run(body).await;

        assert!(action.should_continue());
        assert!(action.commit_data.is_empty());
        assert_eq!(action.commit_to.as_deref(), Some(ZERO_ID));
    }

    #[tokio::test]
    async fn test_multi_ref_push_uses_first_ref() {
        let body = PushBody::new()
            .update(OLD, NEW, "refs/heads/main")
            .update(ZERO_ID, NEW, "refs/tags/v2")
            .commit("A <a@x.io>", "A <a@x.io>", OLD, "msg\n")
            .build();
        let action = run(body).await;

        assert_eq!(action.branch.as_deref(), Some("refs/heads/main"));
        assert_eq!(action.ref_updates.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_body() {
        let action = run(Vec::new()).await;
        assert!(action.error);
        assert_eq!(
            action.error_message.as_deref(),
            Some("Unable to parse push. Please contact an administrator for support: No body found in request")
        );
    }

    #[tokio::test]
    async fn test_truncated_pkt_line_reports_offset() {
        let action = run(b"00ffshort".to_vec()).await;
        assert!(action.error);
        let message = action.error_message.unwrap();
        assert!(message.starts_with(PARSE_FAILURE));
        assert!(message.contains("offset 0"));
        assert_eq!(action.steps.len(), 1);
    }
}
