//! Error types for processor execution

use crate::git::GitError;
use crate::store::StoreError;
use crate::workspace::WorkspaceError;
use pushgate_protocol::ParseError;
use thiserror::Error;

/// Result type alias for processor operations
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Errors a processor can hit while doing its work.
///
/// Processors normally render these into their step with
/// [`Step::set_error`](crate::action::Step::set_error). Returning one as
/// `Err` is reserved for unexpected failures; the chain records it on the
/// last good action.
#[derive(Error, Debug)]
pub enum ProcessError {
    /// Malformed pkt-line, pack or object data
    #[error("protocol error: {0}")]
    Protocol(#[from] ParseError),

    /// A git subprocess could not run or failed
    #[error("git error: {0}")]
    Git(GitError),

    /// A subprocess exceeded its time limit
    #[error("{operation} timed out after {secs}s")]
    Timeout {
        /// What was running
        operation: String,
        /// Limit that was exceeded
        secs: u64,
    },

    /// Temporary clone directory failure
    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    /// Persistence gateway failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A plugin failed
    #[error("plugin {name} failed: {message}")]
    Plugin {
        /// Plugin name
        name: String,
        /// Failure description
        message: String,
    },

    /// Transparent error delegation for wrapped error types
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<GitError> for ProcessError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::Timeout { program, secs } => ProcessError::Timeout {
                operation: program,
                secs,
            },
            other => ProcessError::Git(other),
        }
    }
}

impl ProcessError {
    /// Create a Plugin error
    pub fn plugin<N: Into<String>, M: Into<String>>(name: N, message: M) -> Self {
        ProcessError::Plugin {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a generic error from any error type that can convert to anyhow::Error
    pub fn other<E: Into<anyhow::Error>>(error: E) -> Self {
        ProcessError::Other(error.into())
    }

    /// True for subprocess and filesystem failures
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            ProcessError::Git(_) | ProcessError::Timeout { .. } | ProcessError::Workspace(_)
        )
    }
}
