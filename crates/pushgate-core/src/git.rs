//! Subprocess runner for git, gitleaks and the pre-receive hook
//!
//! Every call is bounded by a timeout. The child is spawned with
//! `kill_on_drop`, so an elapsed timeout (or a dropped chain future) kills
//! it instead of leaving it running.

use bytes::Bytes;
use pushgate_config::GitConfig;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Errors from running a subprocess
#[derive(Error, Debug)]
pub enum GitError {
    /// The program could not be started
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// The program ran past its time limit and was killed
    #[error("{program} timed out after {secs}s")]
    Timeout {
        /// Program that was killed
        program: String,
        /// Limit that was exceeded
        secs: u64,
    },

    /// The program exited unsuccessfully
    #[error("{program} exited with status {status}: {stderr}")]
    Failed {
        /// Program and subcommand
        program: String,
        /// Exit status, or `signal` when killed by one
        status: String,
        /// Captured standard error
        stderr: String,
    },

    /// I/O error while talking to the child
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Captured result of a finished subprocess
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessOutput {
    /// Exit code, `None` when terminated by a signal
    pub status: Option<i32>,
    /// Standard output, lossily decoded
    pub stdout: String,
    /// Standard error, lossily decoded
    pub stderr: String,
}

impl ProcessOutput {
    /// True when the process exited with status 0
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    fn status_text(&self) -> String {
        self.status
            .map(|code| code.to_string())
            .unwrap_or_else(|| "signal".to_string())
    }
}

/// Options for [`run_process`]
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Working directory
    pub cwd: Option<PathBuf>,
    /// Extra environment variables
    pub env: Vec<(String, String)>,
    /// Bytes written to standard input, which is closed afterwards
    pub stdin: Option<Bytes>,
    /// Kill the process after this long
    pub timeout: Option<Duration>,
}

/// Run `program` to completion and capture its output.
///
/// A non-zero exit is not an error here; callers inspect
/// [`ProcessOutput::status`].
#[instrument(skip(args, options), fields(cwd = ?options.cwd))]
pub async fn run_process<I, S>(
    program: &str,
    args: I,
    options: RunOptions,
) -> Result<ProcessOutput, GitError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(if options.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(cwd) = &options.cwd {
        command.current_dir(cwd);
    }
    for (key, value) in &options.env {
        command.env(key, value);
    }

    let mut child = command.spawn().map_err(|source| GitError::Spawn {
        program: program.to_string(),
        source,
    })?;

    let writer = match (child.stdin.take(), options.stdin) {
        (Some(mut stdin), Some(data)) => Some(tokio::spawn(async move {
            stdin.write_all(&data).await?;
            stdin.shutdown().await
        })),
        _ => None,
    };

    let wait = child.wait_with_output();
    let output = match options.timeout {
        Some(limit) => tokio::time::timeout(limit, wait)
            .await
            .map_err(|_| GitError::Timeout {
                program: program.to_string(),
                secs: limit.as_secs(),
            })??,
        None => wait.await?,
    };

    if let Some(writer) = writer {
        // a child that exits without reading stdin closes the pipe early
        match writer.await {
            Ok(Err(err)) if err.kind() != io::ErrorKind::BrokenPipe => {
                debug!(error = %err, "Failed to write child stdin");
            }
            Err(err) => debug!(error = %err, "stdin writer task failed"),
            _ => {}
        }
    }

    Ok(ProcessOutput {
        status: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// The git CLI with the proxy's `-c` settings applied to every call
#[derive(Debug, Clone)]
pub struct Git {
    binary: String,
    config: Vec<(String, String)>,
    timeout: Duration,
}

impl Git {
    /// git from `PATH` with a five minute timeout
    pub fn new() -> Self {
        Self::from_config(&GitConfig::default())
    }

    /// Build from the `[git]` section
    pub fn from_config(config: &GitConfig) -> Self {
        Git {
            binary: config.binary.clone(),
            config: config
                .config
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Replace the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Timeout applied to each call
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn full_args(&self, args: &[&str]) -> Vec<String> {
        let mut full = Vec::with_capacity(self.config.len() * 2 + args.len());
        for (key, value) in &self.config {
            full.push("-c".to_string());
            full.push(format!("{key}={value}"));
        }
        full.extend(args.iter().map(|arg| arg.to_string()));
        full
    }

    fn options(&self, cwd: Option<&Path>, stdin: Option<Bytes>) -> RunOptions {
        RunOptions {
            cwd: cwd.map(Path::to_path_buf),
            env: vec![("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())],
            stdin,
            timeout: Some(self.timeout),
        }
    }

    /// Run a git command and return its output whatever the exit status
    pub async fn run(&self, cwd: Option<&Path>, args: &[&str]) -> Result<ProcessOutput, GitError> {
        debug!(args = ?args, "Running git");
        run_process(&self.binary, self.full_args(args), self.options(cwd, None)).await
    }

    /// Run a git command with `input` on standard input
    pub async fn run_with_input(
        &self,
        cwd: Option<&Path>,
        args: &[&str],
        input: Bytes,
    ) -> Result<ProcessOutput, GitError> {
        debug!(args = ?args, input_len = input.len(), "Running git with input");
        run_process(
            &self.binary,
            self.full_args(args),
            self.options(cwd, Some(input)),
        )
        .await
    }

    /// Run a git command and return stdout, failing on a non-zero exit
    pub async fn check(&self, cwd: Option<&Path>, args: &[&str]) -> Result<String, GitError> {
        let output = self.run(cwd, args).await?;
        if !output.success() {
            return Err(GitError::Failed {
                program: format!("git {}", args.first().copied().unwrap_or_default()),
                status: output.status_text(),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

impl Default for Git {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_run_process_captures_output() {
        let output = run_process(
            "sh",
            ["-c", "echo out; echo err >&2; exit 3"],
            RunOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(output.status, Some(3));
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_run_process_feeds_stdin() {
        let output = run_process(
            "sh",
            ["-c", "cat"],
            RunOptions {
                stdin: Some(Bytes::from_static(b"a b c \n")),
                ..RunOptions::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(output.stdout, "a b c \n");
    }

    #[tokio::test]
    async fn test_run_process_ignores_unread_stdin() {
        let output = run_process(
            "sh",
            ["-c", "exit 0"],
            RunOptions {
                stdin: Some(Bytes::from(vec![b'x'; 1 << 20])),
                ..RunOptions::default()
            },
        )
        .await
        .unwrap();
        assert!(output.success());
    }

    #[tokio::test]
    async fn test_run_process_timeout() {
        let err = run_process(
            "sh",
            ["-c", "sleep 5"],
            RunOptions {
                timeout: Some(Duration::from_millis(100)),
                ..RunOptions::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GitError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let err = run_process(
            "/definitely/not/a/binary",
            Vec::<String>::new(),
            RunOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GitError::Spawn { .. }));
    }

    #[test]
    fn test_config_pairs_precede_args() {
        let mut config = BTreeMap::new();
        config.insert(
            "url.file:///srv/.insteadOf".to_string(),
            "https://github.com/".to_string(),
        );
        let git = Git::from_config(&GitConfig {
            config,
            ..GitConfig::default()
        });

        assert_eq!(
            git.full_args(&["clone", "--bare"]),
            vec![
                "-c",
                "url.file:///srv/.insteadOf=https://github.com/",
                "clone",
                "--bare"
            ]
        );
    }

    #[tokio::test]
    async fn test_check_reports_failure() {
        let git = Git::new();
        let dir = tempfile::tempdir().unwrap();
        let err = git
            .check(Some(dir.path()), &["rev-parse", "HEAD"])
            .await
            .unwrap_err();
        assert!(matches!(err, GitError::Failed { .. }));
    }
}
