#![allow(clippy::unwrap_used)]
//! Chain executions against real git repositories

use async_trait::async_trait;
use http::header::{CONTENT_TYPE, USER_AGENT};
use http::{HeaderMap, HeaderValue, Method};
use pushgate_config::{Config, RepoEntry, UserEntry};
use pushgate_core::processors::{GetDiff, Processor, ScanDiff};
use pushgate_core::request::RECEIVE_PACK_REQUEST;
use pushgate_core::store::seed;
use pushgate_core::{
    Action, ActionKind, AuditGuard, Chain, GitRequest, MemoryStore, PluginRegistry, ProcessError,
    ProcessResult, ProxyContext, PushFilter, PushStore, Repo, StoreError, StoreResult, User,
};
use pushgate_protocol::CommitData;
use pushgate_test_utils::git::EMAIL;
use pushgate_test_utils::{GitFixture, HookScript, PushBody};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const OLD: &str = "1111111111111111111111111111111111111111";
const NEW: &str = "2222222222222222222222222222222222222222";
const PATH: &str = "/github.com/finos/demo.git/git-receive-pack";

fn push_request(body: Vec<u8>) -> GitRequest {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(RECEIVE_PACK_REQUEST));
    headers.insert(USER_AGENT, HeaderValue::from_static("git/2.43.0"));
    GitRequest::new(Method::POST, PATH, headers, body)
}

fn demo_repo() -> RepoEntry {
    RepoEntry {
        project: "finos".to_string(),
        name: "demo".to_string(),
        url: "https://github.com/finos/demo.git".to_string(),
        can_push: vec!["dev".to_string()],
        can_authorise: vec!["lead".to_string()],
    }
}

fn dev_user() -> UserEntry {
    UserEntry {
        username: "dev".to_string(),
        email: EMAIL.to_string(),
        git_account: "dev-gh".to_string(),
        admin: false,
    }
}

/// Proxy configured against a git fixture, with its own workspace
struct Proxy {
    chain: Chain,
    store: Arc<MemoryStore>,
    _workspace: TempDir,
}

async fn proxy(fixture: &GitFixture, hook: &HookScript, plugins: &PluginRegistry) -> Proxy {
    let workspace = TempDir::new().unwrap();
    let mut config = Config::default();
    config.workspace.dir = workspace.path().join(".remote");
    config.hooks.pre_receive = hook.path().to_path_buf();
    config.hooks.timeout_secs = 10;
    config.git.timeout_secs = 60;
    config
        .git
        .config
        .insert(fixture.insteadof_key(), "https://github.com/".to_string());

    let store = Arc::new(MemoryStore::new());
    seed(store.as_ref(), &[demo_repo()], &[dev_user()])
        .await
        .unwrap();

    let ctx = ProxyContext::new(config, Arc::clone(&store) as Arc<dyn PushStore>).unwrap();
    Proxy {
        chain: Chain::new(ctx, plugins),
        store,
        _workspace: workspace,
    }
}

fn fixture_push(fixture: &GitFixture) -> GitRequest {
    let old = fixture.head();
    let new = fixture.commit("src/feature.rs", "pub fn feature() {}\n", "Add feature\n");
    push_request(fixture.push_body(&old, &new, "refs/heads/main"))
}

#[tokio::test]
async fn test_unauthorised_repo_stops_after_gate() {
    let store = Arc::new(MemoryStore::new());
    let ctx = ProxyContext::new(
        Config::default(),
        Arc::clone(&store) as Arc<dyn PushStore>,
    )
    .unwrap();
    let chain = Chain::new(ctx, &PluginRegistry::new());

    let body = PushBody::new()
        .update(OLD, NEW, "refs/heads/main")
        .commit("Dev <dev@example.com>", "Dev <dev@example.com>", OLD, "Fix\n")
        .build();
    let execution = chain.execute(&push_request(body)).await;

    assert_eq!(
        execution.action.step_names(),
        vec!["parseAction", "parsePush", "checkRepoInAuthorisedList"]
    );
    assert!(execution.action.blocked);
    assert!(execution.decision.is_none());

    let audited = store.get_push(&format!("{OLD}__{NEW}")).await.unwrap();
    assert!(audited.unwrap().blocked);
    assert_eq!(store.push_count().await, 1);
}

#[derive(Debug)]
struct Panicking;

#[async_trait]
impl Processor for Panicking {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn exec(&self, _: &ProxyContext, _: &GitRequest, _: &Action) -> ProcessResult<Action> {
        panic!("plugin exploded");
    }
}

#[derive(Debug)]
struct Failing;

#[async_trait]
impl Processor for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    async fn exec(&self, _: &ProxyContext, _: &GitRequest, _: &Action) -> ProcessResult<Action> {
        Err(ProcessError::Plugin {
            name: "failing".to_string(),
            message: "backend unavailable".to_string(),
        })
    }
}

#[tokio::test]
async fn test_failing_plugins_do_not_stop_chain() {
    let store = Arc::new(MemoryStore::new());
    let ctx = ProxyContext::new(
        Config::default(),
        Arc::clone(&store) as Arc<dyn PushStore>,
    )
    .unwrap();
    let mut plugins = PluginRegistry::new();
    plugins
        .register_push(Arc::new(Panicking))
        .register_push(Arc::new(Failing));
    let chain = Chain::new(ctx, &plugins);

    let body = PushBody::new()
        .update(OLD, NEW, "refs/heads/main")
        .commit("Dev <dev@example.com>", "Dev <dev@example.com>", OLD, "Fix\n")
        .build();
    let execution = chain.execute(&push_request(body)).await;
    let action = execution.action;

    assert_eq!(
        action.step_names(),
        vec![
            "parseAction",
            "parsePush",
            "panicking",
            "failing",
            "checkRepoInAuthorisedList"
        ]
    );
    let panicked = action.find_step("panicking").unwrap();
    assert!(!panicked.error());
    assert!(panicked.logs[0].contains("plugin exploded"));
    assert!(!action.error);
    assert_eq!(store.push_count().await, 1);
}

#[tokio::test]
async fn test_unparseable_push_is_audited_once() {
    let store = Arc::new(MemoryStore::new());
    let ctx = ProxyContext::new(
        Config::default(),
        Arc::clone(&store) as Arc<dyn PushStore>,
    )
    .unwrap();
    let chain = Chain::new(ctx, &PluginRegistry::new());

    let execution = chain.execute(&push_request(b"garbage".to_vec())).await;
    assert!(execution.action.error);
    assert_eq!(
        execution.action.step_names(),
        vec!["parseAction", "parsePush"]
    );
    assert_eq!(store.push_count().await, 1);
}

#[derive(Debug, Clone, Copy)]
enum RepoLookup {
    Fails,
    Panics,
}

/// Memory store that counts audit writes and breaks repository lookups
#[derive(Debug)]
struct CountingStore {
    inner: MemoryStore,
    audits: AtomicUsize,
    lookup: RepoLookup,
}

impl CountingStore {
    fn new(lookup: RepoLookup) -> Self {
        CountingStore {
            inner: MemoryStore::new(),
            audits: AtomicUsize::new(0),
            lookup,
        }
    }

    fn audits(&self) -> usize {
        self.audits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushStore for CountingStore {
    async fn write_audit(&self, action: &Action) -> StoreResult<()> {
        self.audits.fetch_add(1, Ordering::SeqCst);
        self.inner.write_audit(action).await
    }

    async fn get_push(&self, id: &str) -> StoreResult<Option<Action>> {
        self.inner.get_push(id).await
    }

    async fn list_pushes(&self, filter: &PushFilter) -> StoreResult<Vec<Action>> {
        self.inner.list_pushes(filter).await
    }

    async fn get_repo_by_url(&self, _url: &str) -> StoreResult<Option<Repo>> {
        match self.lookup {
            RepoLookup::Fails => Err(StoreError::Io(io::Error::other("repo table offline"))),
            RepoLookup::Panics => panic!("repo table corrupted"),
        }
    }

    async fn get_repos(&self) -> StoreResult<Vec<Repo>> {
        self.inner.get_repos().await
    }

    async fn get_users_by_email(&self, email: &str) -> StoreResult<Vec<User>> {
        self.inner.get_users_by_email(email).await
    }

    async fn add_repo(&self, repo: Repo) -> StoreResult<()> {
        self.inner.add_repo(repo).await
    }

    async fn add_user(&self, user: User) -> StoreResult<()> {
        self.inner.add_user(user).await
    }
}

async fn run_with_broken_lookup(lookup: RepoLookup) -> (Action, Arc<CountingStore>) {
    let store = Arc::new(CountingStore::new(lookup));
    let ctx = ProxyContext::new(
        Config::default(),
        Arc::clone(&store) as Arc<dyn PushStore>,
    )
    .unwrap();
    let chain = Chain::new(ctx, &PluginRegistry::new());

    let body = PushBody::new()
        .update(OLD, NEW, "refs/heads/main")
        .commit("Dev <dev@example.com>", "Dev <dev@example.com>", OLD, "Fix\n")
        .build();
    let execution = chain.execute(&push_request(body)).await;
    (execution.action, store)
}

#[tokio::test]
async fn test_builtin_error_is_audited_exactly_once() {
    let (action, store) = run_with_broken_lookup(RepoLookup::Fails).await;

    assert_eq!(
        action.step_names(),
        vec!["parseAction", "parsePush", "checkRepoInAuthorisedList"]
    );
    assert!(action.error);
    assert!(action.error_message.unwrap().contains("repo table offline"));
    assert_eq!(store.audits(), 1);
    assert!(store
        .inner
        .get_push(&format!("{OLD}__{NEW}"))
        .await
        .unwrap()
        .unwrap()
        .error);
}

#[tokio::test]
async fn test_builtin_panic_is_audited_exactly_once() {
    let (action, store) = run_with_broken_lookup(RepoLookup::Panics).await;

    let step = action.find_step("checkRepoInAuthorisedList").unwrap();
    assert!(step.error());
    assert!(action.error);
    assert!(action.error_message.unwrap().contains("repo table corrupted"));
    assert_eq!(store.audits(), 1);
}

#[tokio::test]
async fn test_dropped_guard_still_writes_audit() {
    let store = Arc::new(MemoryStore::new());
    let mut action = Action::new("7", ActionKind::Push, "POST", 7, "https://h/o/r.git");
    {
        let mut guard = AuditGuard::new(Arc::clone(&store) as Arc<dyn PushStore>, &action);
        action.blocked = true;
        guard.update(&action);
    }

    for _ in 0..50 {
        if store.push_count().await == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(store.get_push("7").await.unwrap().unwrap().blocked);
}

#[tokio::test]
async fn test_finished_guard_writes_once_and_skips_pulls() {
    let store = Arc::new(MemoryStore::new());
    let pull = Action::new("8", ActionKind::Pull, "POST", 8, "https://h/o/r.git");
    AuditGuard::new(Arc::clone(&store) as Arc<dyn PushStore>, &pull)
        .finish()
        .await;
    assert_eq!(store.push_count().await, 0);

    let default = Action::new("9", ActionKind::Default, "GET", 9, "https://h/o/r.git");
    AuditGuard::new(Arc::clone(&store) as Arc<dyn PushStore>, &default)
        .finish()
        .await;
    assert_eq!(store.push_count().await, 1);
}

#[tokio::test]
async fn test_diff_failure_leaves_scan_passing() {
    let fixture = GitFixture::new("finos", "demo");
    let ctx = ProxyContext::new(Config::default(), Arc::new(MemoryStore::new())).unwrap();
    let req = push_request(Vec::new());

    let mut action = Action::new(
        "1",
        ActionKind::Push,
        "POST",
        1,
        "https://github.com/finos/demo.git",
    );
    action.proxy_git_path = fixture.upstream().parent().map(|p| p.to_path_buf());
    action.set_commit("deadbeef".repeat(5), fixture.head());
    action.commit_data = vec![CommitData::default()];

    let action = GetDiff.exec(&ctx, &req, &action).await.unwrap();
    assert!(action.error);
    assert!(action.error_message.clone().unwrap().contains("fatal"));

    let action = ScanDiff.exec(&ctx, &req, &action).await.unwrap();
    let scan = action.find_step("scanDiff").unwrap();
    assert!(!scan.blocked());
    assert!(!scan.error());
}

#[tokio::test]
async fn test_hook_approval_allows_push() {
    let fixture = GitFixture::new("finos", "demo");
    let hook = HookScript::exiting(0);
    let proxy = proxy(&fixture, &hook, &PluginRegistry::new()).await;

    let execution = proxy.chain.execute(&fixture_push(&fixture)).await;
    let action = execution.action;

    assert!(!action.error, "{:?}", action.error_message);
    assert!(action.allow_push);
    assert!(action.auto_approved);
    assert_eq!(
        action.step_names(),
        vec![
            "parseAction",
            "parsePush",
            "checkRepoInAuthorisedList",
            "checkCommitMessages",
            "checkAuthorEmails",
            "checkUserPushPermission",
            "checkIfWaitingAuth",
            "pullRemote",
            "writePack",
            "checkEmptyBranch",
            "checkHiddenCommits",
            "executeExternalPreReceiveHook",
            "diff",
            "gitleaks",
            "clearBareClone",
            "scanDiff",
            "authBlock",
        ]
    );
    assert!(action
        .find_step("diff")
        .unwrap()
        .content
        .as_str()
        .unwrap()
        .contains("+pub fn feature() {}"));
    assert!(!action.proxy_git_path.unwrap().exists());

    execution.decision.unwrap().await.unwrap();
    let stored = proxy.store.get_push(&action.id).await.unwrap().unwrap();
    assert!(stored.authorised);
    assert!(stored.attestation.unwrap().automated);
}

#[tokio::test]
async fn test_hook_rejection_blocks_push() {
    let fixture = GitFixture::new("finos", "demo");
    let hook = HookScript::exiting(1);
    let proxy = proxy(&fixture, &hook, &PluginRegistry::new()).await;

    let execution = proxy.chain.execute(&fixture_push(&fixture)).await;
    let action = execution.action;

    assert!(action.blocked);
    assert!(action.auto_rejected);
    assert!(action
        .find_step("executeExternalPreReceiveHook")
        .unwrap()
        .blocked());
    // the aborted chain still removes its clone
    assert_eq!(action.last_step.as_ref().unwrap().step_name, "clearBareClone");
    assert!(!action.proxy_git_path.unwrap().exists());

    execution.decision.unwrap().await.unwrap();
    let stored = proxy.store.get_push(&action.id).await.unwrap().unwrap();
    assert!(stored.rejected);
}

#[tokio::test]
async fn test_hook_manual_review_waits_for_decision() {
    let fixture = GitFixture::new("finos", "demo");
    let hook = HookScript::exiting(2);
    let proxy = proxy(&fixture, &hook, &PluginRegistry::new()).await;

    let execution = proxy.chain.execute(&fixture_push(&fixture)).await;
    let action = execution.action;

    assert!(execution.decision.is_none());
    assert!(action.is_pending_review());
    assert_eq!(action.last_step.as_ref().unwrap().step_name, "authBlock");
    assert!(action
        .blocked_message
        .unwrap()
        .contains(&format!("/dashboard/push/{}", action.id)));
}

#[tokio::test]
async fn test_hook_unknown_exit_is_error() {
    let fixture = GitFixture::new("finos", "demo");
    let hook = HookScript::printing(3, "hook broke");
    let proxy = proxy(&fixture, &hook, &PluginRegistry::new()).await;

    let execution = proxy.chain.execute(&fixture_push(&fixture)).await;
    let action = execution.action;

    assert!(action.error);
    assert_eq!(action.error_message.as_deref(), Some("hook broke"));
    assert!(execution.decision.is_none());
    assert_eq!(proxy.store.push_count().await, 1);
}

#[tokio::test]
async fn test_branch_name_plugin_blocks_before_clone() {
    let fixture = GitFixture::new("finos", "demo");
    let hook = HookScript::exiting(0);
    let mut plugins = PluginRegistry::new();
    plugins.register_push(Arc::new(
        pushgate_core::plugins::BranchName::new("^feature/").unwrap(),
    ));
    let proxy = proxy(&fixture, &hook, &plugins).await;

    let execution = proxy.chain.execute(&fixture_push(&fixture)).await;
    let action = execution.action;

    assert!(action.blocked);
    assert_eq!(
        action.step_names(),
        vec!["parseAction", "parsePush", "checkBranchName"]
    );
    assert!(action.proxy_git_path.is_none());
}
