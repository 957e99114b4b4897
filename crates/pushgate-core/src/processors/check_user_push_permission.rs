//! Push permission gate

use super::Processor;
use crate::action::{Action, Step};
use crate::context::ProxyContext;
use crate::error::ProcessResult;
use crate::request::GitRequest;
use async_trait::async_trait;

/// Step name
pub const NAME: &str = "checkUserPushPermission";

const USER_NOT_FOUND: &str =
    "Push blocked: User not found. Please contact an administrator for support.";

/// Blocks pushes from users outside the repository's push and authorise lists.
///
/// The pusher is the proxy user owning the tip commit's committer email. When
/// no user owns it, the Basic-auth username of the request is used instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct CheckUserPushPermission;

#[async_trait]
impl Processor for CheckUserPushPermission {
    fn name(&self) -> &str {
        NAME
    }

    async fn exec(
        &self,
        ctx: &ProxyContext,
        req: &GitRequest,
        action: &Action,
    ) -> ProcessResult<Action> {
        let mut action = action.clone();
        let mut step = Step::new(NAME);

        let email = action.user_email.clone().filter(|email| !email.is_empty());

        let mut username = None;
        if let Some(email) = &email {
            let users = ctx.store.get_users_by_email(email).await?;
            if users.len() > 1 {
                step.log(format!(
                    "Multiple Users have email <{email}> so we cannot uniquely identify the user, ending"
                ));
                step.block(format!(
                    "Your push has been blocked (there are multiple users with email {email})"
                ));
                action.add_step(step);
                return Ok(action);
            }
            username = users.into_iter().next().map(|user| user.username);
        }

        if username.is_none() {
            username = req.basic_credentials().map(|creds| creds.username);
            if let Some(name) = &username {
                step.log(format!("Using request credentials of {name}"));
            }
        }

        let who = email.clone().or_else(|| username.clone());
        let Some(who) = who else {
            step.block(USER_NOT_FOUND);
            action.add_step(step);
            return Ok(action);
        };

        let allowed = match &username {
            Some(name) => ctx.store.can_user_push(&action.url, name).await?,
            None => false,
        };

        if allowed {
            step.log(format!("User {who} is allowed to push on repo {}", action.url));
        } else {
            step.log(format!(
                "User {who} is not allowed to push on repo {}, ending",
                action.url
            ));
            step.block(format!(
                "Your push has been blocked ({who} is not allowed to push on repo {})",
                action.url
            ));
        }

        action.add_step(step);
        Ok(action)
    }
}
