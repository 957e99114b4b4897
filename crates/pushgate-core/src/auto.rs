//! Decisions taken by the pre-receive hook
//!
//! Both functions spawn a task and return its handle. The chain does not
//! wait for it; failures are logged and never reach the client.

use crate::action::Attestation;
use crate::store::PushStore;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Authorise push `id` on behalf of the system reviewer
pub fn attempt_auto_approval(store: Arc<dyn PushStore>, id: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        match store.authorise(&id, Attestation::automated()).await {
            Ok(receipt) => info!(action_id = %id, message = %receipt.message, "Push automatically approved"),
            Err(e) => error!(action_id = %id, error = %e, "Failed to auto-approve push"),
        }
    })
}

/// Reject push `id` on behalf of the system reviewer
pub fn attempt_auto_rejection(store: Arc<dyn PushStore>, id: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        match store.reject(&id, Attestation::automated()).await {
            Ok(receipt) => info!(action_id = %id, message = %receipt.message, "Push automatically rejected"),
            Err(e) => error!(action_id = %id, error = %e, "Failed to auto-reject push"),
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::action::{Action, ActionKind};
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_auto_approval_records_system_attestation() {
        let store = Arc::new(MemoryStore::new());
        let action = Action::new("a__b", ActionKind::Push, "POST", 1, "https://h/o/r.git");
        store.write_audit(&action).await.unwrap();

        let shared = Arc::clone(&store) as Arc<dyn PushStore>;
        attempt_auto_approval(shared, "a__b".to_string())
            .await
            .unwrap();

        let stored = store.get_push("a__b").await.unwrap().unwrap();
        assert!(stored.authorised);
        let attestation = stored.attestation.unwrap();
        assert!(attestation.automated);
        assert_eq!(attestation.reviewer.username, "system");
    }

    #[tokio::test]
    async fn test_auto_rejection() {
        let store = Arc::new(MemoryStore::new());
        let action = Action::new("a__b", ActionKind::Push, "POST", 1, "https://h/o/r.git");
        store.write_audit(&action).await.unwrap();

        let shared = Arc::clone(&store) as Arc<dyn PushStore>;
        attempt_auto_rejection(shared, "a__b".to_string())
            .await
            .unwrap();

        assert!(store.get_push("a__b").await.unwrap().unwrap().rejected);
    }

    #[tokio::test]
    async fn test_missing_push_is_logged_not_raised() {
        let store = Arc::new(MemoryStore::new());
        attempt_auto_approval(store, "missing".to_string())
            .await
            .unwrap();
    }
}
