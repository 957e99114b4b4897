//! Request classification, the chain's pre-processor

use crate::action::{Action, ActionKind, Step};
use crate::context::ProxyContext;
use crate::error::ProcessResult;
use crate::request::{GitRequest, RECEIVE_PACK_REQUEST, UPLOAD_PACK_REQUEST};
use crate::urls::process_url_path;
use chrono::Utc;
use serde_json::json;
use tracing::debug;

/// Step name
pub const NAME: &str = "parseAction";

/// Classify the request and build its action.
///
/// The upstream URL is `https:/{repo path}` when the store knows it, else
/// the configured fallback origin followed by the repo path.
pub async fn parse_action(ctx: &ProxyContext, req: &GitRequest) -> ProcessResult<Action> {
    let timestamp = Utc::now().timestamp_millis();
    let mut step = Step::new(NAME);

    let kind = match req.content_type() {
        Some(UPLOAD_PACK_REQUEST) => ActionKind::Pull,
        Some(RECEIVE_PACK_REQUEST) => ActionKind::Push,
        _ => ActionKind::Default,
    };

    let repo_path = process_url_path(&req.path)
        .map(|parts| parts.repo_path)
        .unwrap_or_else(|| "NOT-FOUND".to_string());

    let mut url = format!("https:/{repo_path}");
    debug!(%url, path = %req.path, "Calculated repo URL");

    if ctx.store.get_repo_by_url(&url).await?.is_none() {
        let origin = ctx.config.proxy.proxy_url.trim_end_matches('/');
        url = format!("{origin}{repo_path}");
        step.log(format!(
            "Fallback calculated repo URL: {url} for inbound URL path: {}",
            req.path
        ));
    }

    step.set_content(json!({ "url": url }));

    let mut action = Action::new(
        timestamp.to_string(),
        kind,
        req.method.as_str(),
        timestamp,
        url,
    );
    action.add_step(step);
    Ok(action)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, PushStore, Repo};
    use http::header::CONTENT_TYPE;
    use http::{HeaderMap, HeaderValue, Method};
    use pushgate_config::Config;
    use std::sync::Arc;

    fn context(store: MemoryStore) -> ProxyContext {
        ProxyContext::new(Config::default(), Arc::new(store)).unwrap()
    }

    fn request(path: &str, content_type: &'static str) -> GitRequest {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        GitRequest::new(Method::POST, path, headers, Vec::new())
    }

    #[tokio::test]
    async fn test_known_repo_url() {
        let store = MemoryStore::new();
        store
            .add_repo(Repo {
                url: "https://gitlab.com/group/app.git".to_string(),
                ..Repo::default()
            })
            .await
            .unwrap();

        let req = request("/gitlab.com/group/app.git/git-receive-pack", RECEIVE_PACK_REQUEST);
        let action = parse_action(&context(store), &req).await.unwrap();

        assert_eq!(action.kind, ActionKind::Push);
        assert_eq!(action.url, "https://gitlab.com/group/app.git");
        assert_eq!(action.repo, "group/app.git");
        assert_eq!(action.step_names(), vec![NAME]);
        assert_eq!(action.id, action.timestamp.to_string());
    }

    #[tokio::test]
    async fn test_legacy_fallback() {
        let req = request("/finos/git-proxy.git/git-upload-pack", UPLOAD_PACK_REQUEST);
        let action = parse_action(&context(MemoryStore::new()), &req).await.unwrap();

        assert_eq!(action.kind, ActionKind::Pull);
        assert_eq!(action.url, "https://github.com/finos/git-proxy.git");
        assert_eq!(action.project, "finos");
        assert!(action.steps[0].logs[0].contains("Fallback"));
    }

    #[tokio::test]
    async fn test_other_content_type_is_default() {
        let req = request("/finos/git-proxy.git/info/refs", "text/plain");
        let action = parse_action(&context(MemoryStore::new()), &req).await.unwrap();
        assert_eq!(action.kind, ActionKind::Default);
    }
}
