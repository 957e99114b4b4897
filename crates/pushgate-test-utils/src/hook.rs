//! Executable pre-receive hooks

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::path::PathBuf;
use tempfile::TempDir;

/// A shell script written to a temporary directory with mode 0755
pub struct HookScript {
    dir: TempDir,
    path: PathBuf,
}

impl HookScript {
    /// Hook that exits with `code` and prints nothing
    pub fn exiting(code: i32) -> Self {
        Self::with_body(&format!("exit {code}\n"))
    }

    /// Hook that prints `stdout` and exits with `code`
    pub fn printing(code: i32, stdout: &str) -> Self {
        Self::with_body(&format!("printf '%s' '{stdout}'\nexit {code}\n"))
    }

    /// Hook running an arbitrary script body
    pub fn with_body(body: &str) -> Self {
        let dir = TempDir::new().expect("Failed to create hook directory");
        let path = dir.path().join("pre-receive.sh");
        fs::write(&path, format!("#!/bin/sh\n{body}")).expect("Failed to write hook");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("Failed to mark hook executable");
        HookScript { dir, path }
    }

    /// Script path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the script
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}
