//! Real git repositories for integration tests

use pushgate_protocol::pktline;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

/// Author and committer of fixture commits
pub const EMAIL: &str = "dev@example.com";

/// An upstream bare repository plus a working clone.
///
/// The upstream lives at `{root}/remote/{project}/{name}.git`. Pointing the
/// proxy's `url.<base>.insteadOf` at [`GitFixture::insteadof_key`] makes
/// `https://github.com/{project}/{name}.git` resolve to it.
///
/// # Example
/// ```ignore
/// use pushgate_test_utils::GitFixture;
///
/// let repo = GitFixture::new("finos", "demo");
/// let old = repo.head();
/// let new = repo.commit("a.txt", "hello\n", "Add a");
/// let body = repo.push_body(&old, &new, "refs/heads/main");
/// ```
pub struct GitFixture {
    root: TempDir,
    upstream: PathBuf,
    work: PathBuf,
}

/// Run git in `dir` and return trimmed stdout, panicking on failure
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

impl GitFixture {
    /// Upstream with one commit on `main`, and a working clone of it
    pub fn new(project: &str, name: &str) -> Self {
        let root = TempDir::new().expect("Failed to create temp directory");
        let upstream = root
            .path()
            .join("remote")
            .join(project)
            .join(format!("{name}.git"));
        let work = root.path().join("work");
        fs::create_dir_all(&upstream).expect("Failed to create upstream directory");
        fs::create_dir_all(&work).expect("Failed to create work directory");

        git(&upstream, &["init", "--bare", "--initial-branch=main"]);
        git(&work, &["init", "--initial-branch=main"]);
        git(&work, &["config", "user.name", "Dev"]);
        git(&work, &["config", "user.email", EMAIL]);
        git(&work, &["config", "commit.gpgsign", "false"]);
        git(
            &work,
            &["remote", "add", "origin", &upstream.to_string_lossy()],
        );

        let fixture = GitFixture {
            root,
            upstream,
            work,
        };
        fixture.commit("README.md", "# Fixture\n", "Initial commit\n");
        fixture.push_upstream("main");
        fixture
    }

    /// Temporary root holding every repository
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Upstream bare repository
    pub fn upstream(&self) -> &Path {
        &self.upstream
    }

    /// Working clone
    pub fn work(&self) -> &Path {
        &self.work
    }

    /// `url.<key>.insteadOf` key mapping `https://github.com/` onto the fixture
    pub fn insteadof_key(&self) -> String {
        format!("url.file://{}/remote/.insteadOf", self.root.path().display())
    }

    /// Commit id of `HEAD` in the working clone
    pub fn head(&self) -> String {
        git(&self.work, &["rev-parse", "HEAD"])
    }

    /// Write `file` and commit it, returning the new commit id
    pub fn commit(&self, file: &str, content: &str, message: &str) -> String {
        let path = self.work.join(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        fs::write(&path, content).expect("Failed to write file");
        git(&self.work, &["add", file]);
        git(&self.work, &["commit", "-q", "-m", message]);
        self.head()
    }

    /// Create and check out a branch in the working clone
    pub fn checkout_new(&self, branch: &str) {
        git(&self.work, &["checkout", "-q", "-b", branch]);
    }

    /// Push `branch` of the working clone to the upstream directly
    pub fn push_upstream(&self, branch: &str) {
        git(&self.work, &["push", "-q", "origin", branch]);
    }

    /// Receive-pack body updating `name` from `old` to `new`, with the pack
    /// of every object reachable from `new` but not from `old`
    pub fn push_body(&self, old: &str, new: &str, name: &str) -> Vec<u8> {
        let line = format!("{old} {new} {name}\0report-status side-band-64k agent=git/2.43.0\n");
        let mut body = pktline::encode(line.as_bytes()).expect("command fits in a pkt-line");
        body.extend_from_slice(pktline::FLUSH_PKT);
        body.extend(self.pack_objects(new, old));
        body
    }

    fn pack_objects(&self, include: &str, exclude: &str) -> Vec<u8> {
        let mut revs = format!("{include}\n");
        if !exclude.chars().all(|c| c == '0') {
            revs.push_str(&format!("^{exclude}\n"));
        }

        let mut child = Command::new("git")
            .args(["pack-objects", "--stdout", "--revs", "-q"])
            .current_dir(&self.work)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("Failed to spawn git pack-objects");
        child
            .stdin
            .take()
            .expect("stdin is piped")
            .write_all(revs.as_bytes())
            .expect("Failed to write revisions");
        let output = child
            .wait_with_output()
            .expect("Failed to run git pack-objects");
        assert!(
            output.status.success(),
            "git pack-objects failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        output.stdout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pushgate_protocol::Pack;

    #[test]
    fn test_push_body_carries_new_commit() {
        let repo = GitFixture::new("acme", "app");
        let old = repo.head();
        let new = repo.commit("src/lib.rs", "pub fn f() {}\n", "Add lib\n");

        let body = repo.push_body(&old, &new, "refs/heads/main");
        let lines = pktline::parse(&body).unwrap();
        let pack = Pack::parse(&body[lines.end..]).unwrap();
        // commit, two trees, one blob
        assert_eq!(pack.meta.entries, 4);
        assert!(repo.insteadof_key().ends_with("/remote/.insteadOf"));
    }
}
