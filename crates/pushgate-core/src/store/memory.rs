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

//! In-memory store
//!
//! Thread-safe implementation of [`PushStore`] using `Arc<RwLock<HashMap>>`.
//! Nothing survives a restart.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pushgate_core::action::{Action, ActionKind};
//! use pushgate_core::store::{MemoryStore, PushStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = MemoryStore::new();
//!     let action = Action::new("a__b", ActionKind::Push, "POST", 0, "https://github.com/o/r.git");
//!
//!     store.write_audit(&action).await?;
//!     assert!(store.get_push("a__b").await?.is_some());
//!     assert_eq!(store.push_count().await, 1);
//!     Ok(())
//! }
//! ```

use super::{PushFilter, PushStore, Repo, StoreResult, User};
use crate::action::Action;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory store, cheap to clone; clones share state
#[derive(Clone, Default)]
pub struct MemoryStore {
    pushes: Arc<RwLock<HashMap<String, Action>>>,
    repos: Arc<RwLock<HashMap<String, Repo>>>,
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of audit records held
    pub async fn push_count(&self) -> usize {
        self.pushes.read().await.len()
    }

    /// Drop every audit record
    pub async fn clear_pushes(&self) {
        self.pushes.write().await.clear();
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl PushStore for MemoryStore {
    async fn write_audit(&self, action: &Action) -> StoreResult<()> {
        self.pushes
            .write()
            .await
            .insert(action.id.clone(), action.clone());
        Ok(())
    }

    async fn get_push(&self, id: &str) -> StoreResult<Option<Action>> {
        Ok(self.pushes.read().await.get(id).cloned())
    }

    async fn list_pushes(&self, filter: &PushFilter) -> StoreResult<Vec<Action>> {
        let mut found: Vec<Action> = self
            .pushes
            .read()
            .await
            .values()
            .filter(|action| filter.matches(action))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(found)
    }

    async fn get_repo_by_url(&self, url: &str) -> StoreResult<Option<Repo>> {
        Ok(self.repos.read().await.get(&url.to_lowercase()).cloned())
    }

    async fn get_repos(&self) -> StoreResult<Vec<Repo>> {
        let mut repos: Vec<Repo> = self.repos.read().await.values().cloned().collect();
        repos.sort_by(|a, b| a.url.cmp(&b.url));
        Ok(repos)
    }

    async fn get_users_by_email(&self, email: &str) -> StoreResult<Vec<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .filter(|user| user.email.eq_ignore_ascii_case(email))
            .cloned()
            .collect())
    }

    async fn add_repo(&self, repo: Repo) -> StoreResult<()> {
        self.repos
            .write()
            .await
            .insert(repo.url.to_lowercase(), repo);
        Ok(())
    }

    async fn add_user(&self, user: User) -> StoreResult<()> {
        self.users
            .write()
            .await
            .insert(user.username.clone(), user);
        Ok(())
    }
}
