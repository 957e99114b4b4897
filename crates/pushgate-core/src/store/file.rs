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

//! Local filesystem store
//!
//! # Layout
//!
//! ```text
//! {root}/
//!   pushes/{id}.json   one audit record per action
//!   repos.json         array of repositories
//!   users.json         array of users
//! ```
//!
//! # Features
//!
//! - Atomic writes using temp files and atomic rename operations
//! - Writes serialised through one async mutex, so read-modify-write updates
//!   of the array files never interleave
//! - Keys are checked before they become file names

use super::{PushFilter, PushStore, Repo, StoreError, StoreResult, User};
use crate::action::Action;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const PUSHES_DIR: &str = "pushes";
const REPOS_FILE: &str = "repos.json";
const USERS_FILE: &str = "users.json";

/// JSON documents under a root directory
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileStore {
    /// Open (and create) a store rooted at `root`
    pub async fn new<P: AsRef<Path>>(root: P) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(PUSHES_DIR)).await?;
        debug!(root = %root.display(), "Opened file store");
        Ok(FileStore {
            root,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn push_path(&self, id: &str) -> StoreResult<PathBuf> {
        if id.is_empty() || id.contains('/') || id.contains('\\') || id.contains("..") {
            return Err(StoreError::invalid_key(id));
        }
        Ok(self.root.join(PUSHES_DIR).join(format!("{id}.json")))
    }

    async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> StoreResult<()> {
        let data = serde_json::to_vec_pretty(value)?;
        let temp_path = path.with_extension("json.tmp");

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, path).await?;
        Ok(())
    }

    async fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
        match fs::read(path).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_list<T: DeserializeOwned>(&self, name: &str) -> StoreResult<Vec<T>> {
        Ok(Self::read_json(&self.root.join(name))
            .await?
            .unwrap_or_default())
    }
}

#[async_trait]
impl PushStore for FileStore {
    async fn write_audit(&self, action: &Action) -> StoreResult<()> {
        let path = self.push_path(&action.id)?;
        let _guard = self.write_lock.lock().await;
        Self::write_json(&path, action).await
    }

    async fn get_push(&self, id: &str) -> StoreResult<Option<Action>> {
        Self::read_json(&self.push_path(id)?).await
    }

    async fn list_pushes(&self, filter: &PushFilter) -> StoreResult<Vec<Action>> {
        let mut entries = fs::read_dir(self.root.join(PUSHES_DIR)).await?;
        let mut found = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match Self::read_json::<Action>(&path).await {
                Ok(Some(action)) if filter.matches(&action) => found.push(action),
                Ok(_) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable push record"),
            }
        }

        found.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(found)
    }

    async fn get_repo_by_url(&self, url: &str) -> StoreResult<Option<Repo>> {
        Ok(self
            .read_list::<Repo>(REPOS_FILE)
            .await?
            .into_iter()
            .find(|repo| repo.url.eq_ignore_ascii_case(url)))
    }

    async fn get_repos(&self) -> StoreResult<Vec<Repo>> {
        self.read_list(REPOS_FILE).await
    }

    async fn get_users_by_email(&self, email: &str) -> StoreResult<Vec<User>> {
        Ok(self
            .read_list::<User>(USERS_FILE)
            .await?
            .into_iter()
            .filter(|user| user.email.eq_ignore_ascii_case(email))
            .collect())
    }

    async fn add_repo(&self, repo: Repo) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut repos: Vec<Repo> = self.read_list(REPOS_FILE).await?;
        repos.retain(|existing| !existing.url.eq_ignore_ascii_case(&repo.url));
        repos.push(repo);
        Self::write_json(&self.root.join(REPOS_FILE), &repos).await
    }

    async fn add_user(&self, user: User) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut users: Vec<User> = self.read_list(USERS_FILE).await?;
        users.retain(|existing| existing.username != user.username);
        users.push(user);
        Self::write_json(&self.root.join(USERS_FILE), &users).await
    }
}
