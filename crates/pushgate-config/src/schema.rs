use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Top-level configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Listener settings
    pub server: ServerConfig,

    /// Upstream and UI locations
    pub proxy: ProxyConfig,

    /// Repositories seeded into the store at startup
    pub authorised_list: Vec<RepoEntry>,

    /// Users seeded into the store at startup
    pub users: Vec<UserEntry>,

    /// Projects whose diffs skip provider rules
    pub private_organizations: Vec<String>,

    /// Commit message, author and diff rules
    pub commit: CommitConfig,

    /// Pre-receive hook
    pub hooks: HooksConfig,

    /// Git subprocess settings
    pub git: GitConfig,

    /// Temporary clone location
    pub workspace: WorkspaceConfig,

    /// Secret scanning
    pub gitleaks: GitleaksConfig,

    /// Audit and decision persistence
    pub store: StoreConfig,

    /// Optional chain plugins
    pub plugins: PluginsConfig,

    /// Logging settings
    pub observability: ObservabilityConfig,
}

impl Config {
    /// True when `project` is listed in `private_organizations` (case-insensitive)
    pub fn is_private_organization(&self, project: &str) -> bool {
        self.private_organizations
            .iter()
            .any(|org| org.eq_ignore_ascii_case(project))
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest request body buffered by the proxy
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Bearer token required by the decision API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Upstream and UI locations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProxyConfig {
    /// Fallback origin for repositories missing from the store
    #[serde(default = "default_proxy_url")]
    pub proxy_url: String,

    /// Base of the shareable review link
    #[serde(default = "default_ui_url")]
    pub ui_url: String,
}

/// A repository allowed through the proxy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RepoEntry {
    /// Organisation or owner
    pub project: String,
    /// Repository name without `.git`
    pub name: String,
    /// Upstream clone URL
    pub url: String,
    /// Usernames allowed to push
    #[serde(default)]
    pub can_push: Vec<String>,
    /// Usernames allowed to approve pushes
    #[serde(default)]
    pub can_authorise: Vec<String>,
}

/// A known proxy user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct UserEntry {
    /// Proxy username
    pub username: String,
    /// Email used in commits
    pub email: String,
    /// Account name on the upstream host
    #[serde(default)]
    pub git_account: String,
    /// Administrator flag
    #[serde(default)]
    pub admin: bool,
}

/// Commit content rules
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct CommitConfig {
    /// Author email rules
    pub author: AuthorConfig,
    /// Commit message rules
    pub message: MessageConfig,
    /// Added-line rules for the push diff
    pub diff: DiffConfig,
}

/// Author rules
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AuthorConfig {
    /// Email rules
    pub email: EmailRules,
}

/// Email address rules
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailRules {
    /// Regex matched against the local part; a match blocks. Empty disables.
    #[serde(default)]
    pub local_block: String,

    /// Regex the domain part must match
    #[serde(default = "default_domain_allow")]
    pub domain_allow: String,
}

/// Commit message rules
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct MessageConfig {
    /// Case-insensitive substrings that block a message
    pub block_literals: Vec<String>,
    /// Case-insensitive regexes that block a message
    pub block_patterns: Vec<String>,
}

/// Diff rules
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct DiffConfig {
    /// Case-insensitive substrings that block an added line
    pub block_literals: Vec<String>,
    /// Case-insensitive regexes that block an added line
    pub block_patterns: Vec<String>,
    /// Named regexes for provider credentials, skipped for private organisations
    pub providers: BTreeMap<String, String>,
}

/// Pre-receive hook configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HooksConfig {
    /// Path of the executable hook
    #[serde(default = "default_pre_receive")]
    pub pre_receive: PathBuf,

    /// Seconds before the hook is killed
    #[serde(default = "default_hook_timeout")]
    pub timeout_secs: u64,
}

/// Git subprocess configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GitConfig {
    /// git executable
    #[serde(default = "default_git_binary")]
    pub binary: String,

    /// Seconds allowed for clone, receive-pack and diff calls
    #[serde(default = "default_git_timeout")]
    pub timeout_secs: u64,

    /// Extra `-c key=value` pairs passed to every invocation
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

/// Temporary workspace configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkspaceConfig {
    /// Parent directory of per-push bare clones
    #[serde(default = "default_workspace_dir")]
    pub dir: PathBuf,
}

/// gitleaks configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GitleaksConfig {
    /// Run gitleaks on branch pushes
    #[serde(default)]
    pub enabled: bool,

    /// Pass `--ignore-gitleaks-allow`
    #[serde(default = "default_true")]
    pub ignore_gitleaks_allow: bool,

    /// Pass `--no-color`
    #[serde(default)]
    pub no_color: bool,

    /// gitleaks rules file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_path: Option<PathBuf>,

    /// gitleaks executable
    #[serde(default = "default_gitleaks_binary")]
    pub binary: String,

    /// Seconds before the scan is killed
    #[serde(default = "default_git_timeout")]
    pub timeout_secs: u64,
}

/// Store backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "backend")]
pub enum StoreConfig {
    /// In-process maps, lost on restart
    #[serde(rename = "memory")]
    Memory,

    /// JSON documents on disk
    #[serde(rename = "file")]
    File(FileStoreConfig),
}

/// File store settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileStoreConfig {
    /// Root directory of the store
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

/// Plugin selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct PluginsConfig {
    /// Push plugins, in chain order
    pub push: Vec<String>,
    /// Pull plugins, in chain order
    pub pull: Vec<String>,
    /// Settings of the `branch-name` plugin
    pub branch_name: BranchNameConfig,
}

/// `branch-name` plugin settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BranchNameConfig {
    /// Regex every pushed branch must match
    #[serde(default = "default_branch_pattern")]
    pub pattern: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObservabilityConfig {
    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_body_bytes() -> usize {
    1024 * 1024 * 1024
}

fn default_proxy_url() -> String {
    "https://github.com".to_string()
}

fn default_ui_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_domain_allow() -> String {
    ".*".to_string()
}

fn default_pre_receive() -> PathBuf {
    PathBuf::from("./hooks/pre-receive.sh")
}

fn default_hook_timeout() -> u64 {
    30
}

fn default_git_binary() -> String {
    "git".to_string()
}

fn default_git_timeout() -> u64 {
    300
}

fn default_workspace_dir() -> PathBuf {
    PathBuf::from("./.remote")
}

fn default_gitleaks_binary() -> String {
    "gitleaks".to_string()
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./.data/db")
}

fn default_branch_pattern() -> String {
    "^[a-z0-9][a-z0-9._/-]*$".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
            api_key: None,
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        ProxyConfig {
            proxy_url: default_proxy_url(),
            ui_url: default_ui_url(),
        }
    }
}

impl Default for EmailRules {
    fn default() -> Self {
        EmailRules {
            local_block: String::new(),
            domain_allow: default_domain_allow(),
        }
    }
}

impl Default for HooksConfig {
    fn default() -> Self {
        HooksConfig {
            pre_receive: default_pre_receive(),
            timeout_secs: default_hook_timeout(),
        }
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        GitConfig {
            binary: default_git_binary(),
            timeout_secs: default_git_timeout(),
            config: BTreeMap::new(),
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        WorkspaceConfig {
            dir: default_workspace_dir(),
        }
    }
}

impl Default for GitleaksConfig {
    fn default() -> Self {
        GitleaksConfig {
            enabled: false,
            ignore_gitleaks_allow: true,
            no_color: false,
            config_path: None,
            binary: default_gitleaks_binary(),
            timeout_secs: default_git_timeout(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::File(FileStoreConfig::default())
    }
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        FileStoreConfig {
            path: default_store_path(),
        }
    }
}

impl Default for BranchNameConfig {
    fn default() -> Self {
        BranchNameConfig {
            pattern: default_branch_pattern(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        ObservabilityConfig {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}
