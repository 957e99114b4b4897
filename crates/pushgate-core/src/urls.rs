//! Proxy URL and git request helpers

use http::header::{HeaderName, ACCEPT, USER_AGENT};
use http::HeaderMap;
use regex_lite::Regex;
use std::sync::OnceLock;
use tracing::warn;

const URL_PATH_PATTERN: &str = r"(.+\.git)(/.*)?";
const GIT_URL_PATTERN: &str = r"(.+://)([^/]+)(/.+\.git)(/.+)*";
const NAME_ORG_PATTERN: &str = r"(.+://)?([^/]+)/(?:(.*)/)?([^/]+\.git)";

fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn url_path_regex() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&CELL, URL_PATH_PATTERN)
}

fn git_url_regex() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&CELL, GIT_URL_PATTERN)
}

fn name_org_regex() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&CELL, NAME_ORG_PATTERN)
}

/// Inbound proxy path split at the `.git` boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPath {
    /// `/github.com/finos/git-proxy.git`
    pub repo_path: String,
    /// `/info/refs?service=git-upload-pack`, or `/`
    pub git_path: String,
}

/// Split a proxied request path such as
/// `/github.com/finos/git-proxy.git/git-receive-pack`.
pub fn process_url_path(request_path: &str) -> Option<UrlPath> {
    let Some(caps) = url_path_regex().and_then(|re| re.captures(request_path)) else {
        warn!(path = request_path, "Failed to parse proxy url path");
        return None;
    };
    Some(UrlPath {
        repo_path: caps.get(1)?.as_str().to_string(),
        git_path: caps
            .get(2)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "/".to_string()),
    })
}

/// An upstream clone URL broken into parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitUrl {
    /// `https://`
    pub protocol: String,
    /// `github.com`
    pub host: String,
    /// `/finos/git-proxy.git`
    pub repo_path: String,
}

/// Split a full repository URL
pub fn process_git_url(url: &str) -> Option<GitUrl> {
    let Some(caps) = git_url_regex().and_then(|re| re.captures(url)) else {
        warn!(url, "Failed to parse git URL");
        return None;
    };
    Some(GitUrl {
        protocol: caps.get(1)?.as_str().to_string(),
        host: caps.get(2)?.as_str().to_string(),
        repo_path: caps.get(3)?.as_str().to_string(),
    })
}

/// Organisation and repository name of a git URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameAndOrg {
    /// Everything between the host and the last segment; absent for a top-level repo
    pub project: Option<String>,
    /// Last path segment, `.git` included
    pub repo_name: String,
}

/// Extract `project` and `repo_name` from a git URL
pub fn name_and_org(url: &str) -> Option<NameAndOrg> {
    let caps = name_org_regex().and_then(|re| re.captures(url))?;
    Some(NameAndOrg {
        project: caps.get(3).map(|m| m.as_str().to_string()),
        repo_name: caps.get(4)?.as_str().to_string(),
    })
}

/// Whether `(git_path, headers)` looks like a request from a git client.
///
/// Ref discovery only carries a `User-Agent`; the pack endpoints must also
/// accept a git content type.
pub fn valid_git_request(git_path: &str, headers: &HeaderMap) -> bool {
    let header = |name: HeaderName| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
    };
    let from_git = header(USER_AGENT).starts_with("git/");

    match git_path {
        "/info/refs?service=git-upload-pack" | "/info/refs?service=git-receive-pack" => from_git,
        "/git-upload-pack" | "/git-receive-pack" => {
            from_git && header(ACCEPT).starts_with("application/x-git-")
        }
        _ => false,
    }
}

/// Strip a trailing `.git` and lowercase, for repository comparisons
pub fn normalise_repo(repo: &str) -> String {
    repo.strip_suffix(".git").unwrap_or(repo).to_lowercase()
}
