use crate::error::{missing, EngineError, Entity};
use core_types::{PullRequestShort, User};
use database::{run_atomic, TransactionCoordinator};
use std::sync::Arc;

/// User activity and review queues.
#[derive(Clone)]
pub struct UserService {
    coordinator: Arc<dyn TransactionCoordinator>,
}

impl UserService {
    pub fn new(coordinator: Arc<dyn TransactionCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Deactivation does not touch existing reviewer links; it only keeps the
    /// user out of future assignments.
    pub async fn set_active(&self, user_id: &str, is_active: bool) -> Result<User, EngineError> {
        let user_id = user_id.to_string();
        let user = run_atomic(self.coordinator.as_ref(), move |uow| {
            Box::pin(async move {
                uow.set_user_active(&user_id, is_active)
                    .await
                    .map_err(missing(Entity::User, &user_id))
            })
        })
        .await?;

        tracing::info!(user_id = %user.id, is_active = user.is_active, "User activity updated.");
        Ok(user)
    }

    /// Pull requests the user is currently linked to as a reviewer.
    pub async fn review_queue(&self, user_id: &str) -> Result<Vec<PullRequestShort>, EngineError> {
        let user_id = user_id.to_string();
        run_atomic(self.coordinator.as_ref(), move |uow| {
            Box::pin(async move {
                if !uow.user_exists(&user_id).await? {
                    return Err(EngineError::not_found(Entity::User, user_id));
                }
                let prs = uow.list_reviewable(&user_id).await?;
                Ok(prs.iter().map(|pr| pr.short()).collect())
            })
        })
        .await
    }
}
