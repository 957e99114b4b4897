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

//! Push-action pipeline for pushgate
//!
//! Every proxied git request becomes an [`Action`]. The [`Chain`] runs the
//! action through an ordered list of [`Processor`]s, each of which appends
//! one [`Step`] to the action's decision trail. Pushes that are blocked wait
//! in the [`PushStore`] for a reviewer to authorise, reject or cancel them.
//!
//! # Architecture
//!
//! - [`action`]: the action and step records
//! - [`processors`]: built-in processors, one module each
//! - [`plugins`]: plugin registry and the built-in plugin catalogue
//! - [`chain`]: chain construction, execution and the audit guard
//! - [`store`]: persistence gateway with memory and file backends
//! - [`git`], [`workspace`]: subprocess runner and temporary clones
//! - [`policy`], [`diff`]: compiled commit rules and the diff reader
//!
//! # Example
//!
//! ```rust,no_run
//! use pushgate_config::Config;
//! use pushgate_core::{Chain, GitRequest, MemoryStore, PluginRegistry, ProxyContext};
//! use std::sync::Arc;
//!
//! # async fn example(req: GitRequest) -> anyhow::Result<()> {
//! let ctx = ProxyContext::new(Config::default(), Arc::new(MemoryStore::new()))?;
//! let chain = Chain::new(ctx, &PluginRegistry::new());
//!
//! let execution = chain.execute(&req).await;
//! if !execution.action.should_continue() {
//!     println!("push stopped: {:?}", execution.action.blocked_message);
//! }
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod auto;
pub mod chain;
pub mod context;
pub mod diff;
pub mod error;
pub mod git;
pub mod plugins;
pub mod policy;
pub mod processors;
pub mod request;
pub mod store;
pub mod urls;
pub mod workspace;

pub use action::{Action, ActionKind, ActionType, Attestation, Decision, Reviewer, Step};
pub use chain::{AuditGuard, Chain, Execution};
pub use context::ProxyContext;
pub use error::{ProcessError, ProcessResult};
pub use git::{Git, GitError};
pub use plugins::PluginRegistry;
pub use policy::PolicyRules;
pub use processors::Processor;
pub use request::{Credentials, GitRequest};
pub use store::{
    DecisionReceipt, FileStore, MemoryStore, PushFilter, PushStore, Repo, RepoUsers, StoreError,
    StoreResult, User,
};
pub use workspace::{WorkspaceError, WorkspaceManager};
