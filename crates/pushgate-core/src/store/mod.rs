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

//! Persistence gateway for audit records, decisions, repositories and users
//!
//! The chain only talks to the [`PushStore`] trait. Two implementations ship
//! with the crate:
//! - [`MemoryStore`]: `Arc<RwLock<HashMap>>`, for tests and throwaway runs
//! - [`FileStore`]: one JSON document per push on local disk
//!
//! # Implementing a store
//!
//! Implement the primitive methods. The decision methods
//! (`authorise`, `reject`, `cancel`) and `can_user_push` are provided on top
//! of them.
//!
//! ```rust,no_run
//! use pushgate_core::store::{MemoryStore, PushStore};
//! use pushgate_core::action::Attestation;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = MemoryStore::new();
//! let receipt = store.authorise("a__b", Attestation::by("alice", "alice")).await;
//! assert!(receipt.is_err()); // nothing written yet
//! # Ok(())
//! # }
//! ```

mod error;
pub mod file;
pub mod memory;

pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use memory::MemoryStore;

use crate::action::{Action, ActionKind, Attestation, Decision};
use async_trait::async_trait;
use pushgate_config::{RepoEntry, StoreConfig, UserEntry};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::info;

/// Users attached to a repository
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoUsers {
    /// May push
    #[serde(default)]
    pub can_push: Vec<String>,
    /// May approve pushes (and push)
    #[serde(default)]
    pub can_authorise: Vec<String>,
}

/// A repository known to the proxy
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repo {
    /// Organisation or owner
    pub project: String,
    /// Name without `.git`
    pub name: String,
    /// Upstream URL
    pub url: String,
    /// Access lists
    #[serde(default)]
    pub users: RepoUsers,
}

impl From<&RepoEntry> for Repo {
    fn from(entry: &RepoEntry) -> Self {
        Repo {
            project: entry.project.clone(),
            name: entry.name.clone(),
            url: entry.url.clone(),
            users: RepoUsers {
                can_push: entry.can_push.clone(),
                can_authorise: entry.can_authorise.clone(),
            },
        }
    }
}

/// A proxy user
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Proxy username
    pub username: String,
    /// Commit email
    pub email: String,
    /// Account on the upstream host
    #[serde(default)]
    pub git_account: String,
    /// Administrator flag
    #[serde(default)]
    pub admin: bool,
}

impl From<&UserEntry> for User {
    fn from(entry: &UserEntry) -> Self {
        User {
            username: entry.username.clone(),
            email: entry.email.clone(),
            git_account: entry.git_account.clone(),
            admin: entry.admin,
        }
    }
}

/// Field filter for [`PushStore::list_pushes`]; `None` matches anything
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PushFilter {
    /// Request kind
    #[serde(rename = "type")]
    pub kind: Option<ActionKind>,
    /// `error` flag
    pub error: Option<bool>,
    /// `blocked` flag
    pub blocked: Option<bool>,
    /// `allowPush` flag
    pub allow_push: Option<bool>,
    /// `authorised` flag
    pub authorised: Option<bool>,
    /// `rejected` flag
    pub rejected: Option<bool>,
    /// `canceled` flag
    pub canceled: Option<bool>,
}

impl PushFilter {
    /// Pushes waiting for a reviewer
    pub fn pending() -> Self {
        PushFilter {
            kind: Some(ActionKind::Push),
            error: Some(false),
            blocked: Some(true),
            allow_push: Some(false),
            authorised: Some(false),
            rejected: Some(false),
            canceled: Some(false),
        }
    }

    /// Whether `action` passes every set field
    pub fn matches(&self, action: &Action) -> bool {
        fn check(want: Option<bool>, have: bool) -> bool {
            want.is_none_or(|want| want == have)
        }

        self.kind.is_none_or(|kind| kind == action.kind)
            && check(self.error, action.error)
            && check(self.blocked, action.blocked)
            && check(self.allow_push, action.allow_push)
            && check(self.authorised, action.authorised)
            && check(self.rejected, action.rejected)
            && check(self.canceled, action.canceled)
    }
}

/// Confirmation returned by a decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionReceipt {
    /// e.g. `authorised a__b`
    pub message: String,
}

/// Persistence gateway consumed by the chain and the decision API
#[async_trait]
pub trait PushStore: Send + Sync + Debug {
    /// Insert or replace the audit record of an action, keyed by its id
    async fn write_audit(&self, action: &Action) -> StoreResult<()>;

    /// Audit record by id
    async fn get_push(&self, id: &str) -> StoreResult<Option<Action>>;

    /// Audit records matching `filter`, newest first
    async fn list_pushes(&self, filter: &PushFilter) -> StoreResult<Vec<Action>>;

    /// Repository with this URL, compared case-insensitively
    async fn get_repo_by_url(&self, url: &str) -> StoreResult<Option<Repo>>;

    /// Every known repository
    async fn get_repos(&self) -> StoreResult<Vec<Repo>>;

    /// Users whose email equals `email`, compared case-insensitively
    async fn get_users_by_email(&self, email: &str) -> StoreResult<Vec<User>>;

    /// Insert or replace a repository, keyed by URL
    async fn add_repo(&self, repo: Repo) -> StoreResult<()>;

    /// Insert or replace a user, keyed by username
    async fn add_user(&self, user: User) -> StoreResult<()>;

    /// Load a push, apply `decision` and write it back
    async fn record_decision(
        &self,
        id: &str,
        decision: Decision,
        attestation: Option<Attestation>,
    ) -> StoreResult<Action> {
        let mut action = self
            .get_push(id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("push {id}")))?;
        action.record_decision(decision, attestation);
        self.write_audit(&action).await?;
        info!(action_id = %id, ?decision, "Recorded push decision");
        Ok(action)
    }

    /// Approve a push
    async fn authorise(&self, id: &str, attestation: Attestation) -> StoreResult<DecisionReceipt> {
        self.record_decision(id, Decision::Authorised, Some(attestation))
            .await?;
        Ok(DecisionReceipt {
            message: format!("authorised {id}"),
        })
    }

    /// Refuse a push
    async fn reject(&self, id: &str, attestation: Attestation) -> StoreResult<DecisionReceipt> {
        self.record_decision(id, Decision::Rejected, Some(attestation))
            .await?;
        Ok(DecisionReceipt {
            message: format!("reject {id}"),
        })
    }

    /// Withdraw a push
    async fn cancel(&self, id: &str) -> StoreResult<DecisionReceipt> {
        self.record_decision(id, Decision::Canceled, None).await?;
        Ok(DecisionReceipt {
            message: format!("cancel {id}"),
        })
    }

    /// Whether `username` is in the push or authorise list of the repo at `url`
    async fn can_user_push(&self, url: &str, username: &str) -> StoreResult<bool> {
        let Some(repo) = self.get_repo_by_url(url).await? else {
            return Ok(false);
        };
        Ok(repo
            .users
            .can_push
            .iter()
            .chain(repo.users.can_authorise.iter())
            .any(|user| user.eq_ignore_ascii_case(username)))
    }
}

/// Build the configured store
pub async fn from_config(config: &StoreConfig) -> StoreResult<Arc<dyn PushStore>> {
    let store: Arc<dyn PushStore> = match config {
        StoreConfig::Memory => Arc::new(MemoryStore::new()),
        StoreConfig::File(file) => Arc::new(FileStore::new(&file.path).await?),
    };
    Ok(store)
}

/// Load the configured repositories and users into `store`
pub async fn seed(
    store: &dyn PushStore,
    repos: &[RepoEntry],
    users: &[UserEntry],
) -> StoreResult<()> {
    for repo in repos {
        store.add_repo(Repo::from(repo)).await?;
    }
    for user in users {
        store.add_user(User::from(user)).await?;
    }
    info!(repos = repos.len(), users = users.len(), "Seeded store");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn action(blocked: bool) -> Action {
        let mut action = Action::new(
            "a__b",
            ActionKind::Push,
            "POST",
            1,
            "https://github.com/finos/git-proxy.git",
        );
        action.blocked = blocked;
        action
    }

    #[test]
    fn test_pending_filter() {
        let filter = PushFilter::pending();
        assert!(filter.matches(&action(true)));
        assert!(!filter.matches(&action(false)));

        let mut decided = action(true);
        decided.record_decision(Decision::Rejected, None);
        assert!(!filter.matches(&decided));

        let mut pull = action(true);
        pull.kind = ActionKind::Pull;
        assert!(!filter.matches(&pull));
    }

    #[test]
    fn test_empty_filter_matches_all() {
        assert!(PushFilter::default().matches(&action(false)));
        assert!(PushFilter::default().matches(&action(true)));
    }

    #[tokio::test]
    async fn test_decisions_and_receipts() {
        let store = MemoryStore::new();
        store.write_audit(&action(true)).await.unwrap();

        let receipt = store
            .authorise("a__b", Attestation::by("alice", "alice-gh"))
            .await
            .unwrap();
        assert_eq!(receipt.message, "authorised a__b");

        let stored = store.get_push("a__b").await.unwrap().unwrap();
        assert!(stored.authorised);
        assert!(!stored.blocked);

        let receipt = store.cancel("a__b").await.unwrap();
        assert_eq!(receipt.message, "cancel a__b");
        let stored = store.get_push("a__b").await.unwrap().unwrap();
        assert!(stored.canceled && !stored.authorised);
    }

    #[tokio::test]
    async fn test_decision_on_missing_push() {
        let store = MemoryStore::new();
        let err = store
            .reject("missing", Attestation::automated())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_can_user_push() {
        let store = MemoryStore::new();
        store
            .add_repo(Repo {
                project: "finos".to_string(),
                name: "git-proxy".to_string(),
                url: "https://github.com/finos/git-proxy.git".to_string(),
                users: RepoUsers {
                    can_push: vec!["alice".to_string()],
                    can_authorise: vec!["bob".to_string()],
                },
            })
            .await
            .unwrap();

        let url = "https://github.com/finos/git-proxy.git";
        assert!(store.can_user_push(url, "alice").await.unwrap());
        assert!(store.can_user_push(url, "bob").await.unwrap());
        assert!(!store.can_user_push(url, "eve").await.unwrap());
        assert!(!store
            .can_user_push("https://github.com/other/repo.git", "alice")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_seed() {
        let store = MemoryStore::new();
        let repos = vec![RepoEntry {
            project: "finos".to_string(),
            name: "git-proxy".to_string(),
            url: "https://github.com/finos/git-proxy.git".to_string(),
            can_push: vec!["alice".to_string()],
            can_authorise: Vec::new(),
        }];
        let users = vec![UserEntry {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            ..UserEntry::default()
        }];

        seed(&store, &repos, &users).await.unwrap();
        assert_eq!(store.get_repos().await.unwrap().len(), 1);
        assert_eq!(
            store
                .get_users_by_email("ALICE@example.com")
                .await
                .unwrap()
                .len(),
            1
        );
    }
}
