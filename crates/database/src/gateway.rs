//! The persistence gateway and the transaction coordinator.
//!
//! Business code never touches a connection directly. It asks a
//! [`TransactionCoordinator`] for a [`UnitOfWork`], which is a transactional
//! view over the four relations (users, teams, pull requests, reviewer links).
//! [`run_atomic`] wraps that lifecycle: commit when the work succeeds, roll
//! back on any failure, and hand the original failure back unchanged.

use crate::DbError;
use async_trait::async_trait;
use core_types::{NewPullRequest, PullRequest, User};
use futures::future::BoxFuture;

/// Reads and writes against the `users` relation.
#[async_trait]
pub trait UserGateway: Send {
    /// Inserts the user, or overwrites name, team and activity if the id exists.
    async fn upsert_user(&mut self, user: &User) -> Result<(), DbError>;

    /// Fails with [`DbError::NotFound`] for an unknown id.
    async fn fetch_user(&mut self, user_id: &str) -> Result<User, DbError>;

    async fn user_exists(&mut self, user_id: &str) -> Result<bool, DbError>;

    /// All members of a team, active or not.
    async fn list_team_members(&mut self, team_name: &str) -> Result<Vec<User>, DbError>;

    /// Active members of a team whose ids are not in `exclude`.
    async fn list_active_team_members(
        &mut self,
        team_name: &str,
        exclude: &[String],
    ) -> Result<Vec<User>, DbError>;

    /// Returns the updated user, or [`DbError::NotFound`].
    async fn set_user_active(&mut self, user_id: &str, is_active: bool) -> Result<User, DbError>;
}

/// Reads and writes against the `teams` relation.
#[async_trait]
pub trait TeamGateway: Send {
    /// Fails with [`DbError::UniqueViolation`] if the name is taken.
    async fn insert_team(&mut self, team_name: &str) -> Result<(), DbError>;

    async fn team_exists(&mut self, team_name: &str) -> Result<bool, DbError>;
}

/// Reads and writes against `pull_requests` and the reviewer-link relation.
///
/// Pull requests returned here never carry reviewers; those come from
/// [`PullRequestGateway::list_reviewers`].
#[async_trait]
pub trait PullRequestGateway: Send {
    /// Inserts the row and returns it as stored (including `created_at`).
    ///
    /// A duplicate id is a [`DbError::UniqueViolation`]; an unknown author is a
    /// [`DbError::ForeignKeyViolation`].
    async fn insert_pull_request(&mut self, pr: &NewPullRequest) -> Result<PullRequest, DbError>;

    async fn fetch_pull_request(&mut self, pr_id: &str) -> Result<PullRequest, DbError>;

    /// Sets the status to `MERGED`. `merged_at` is only written on the first
    /// transition, so repeating the call leaves it untouched.
    async fn mark_merged(&mut self, pr_id: &str) -> Result<PullRequest, DbError>;

    /// Pull requests that `user_id` is linked to as a reviewer, in any status.
    async fn list_reviewable(&mut self, user_id: &str) -> Result<Vec<PullRequest>, DbError>;

    async fn list_reviewers(&mut self, pr_id: &str) -> Result<Vec<String>, DbError>;

    async fn insert_reviewer(&mut self, pr_id: &str, user_id: &str) -> Result<(), DbError>;

    /// Rewrites the `(pr_id, old)` link to `(pr_id, new)` in place and returns
    /// the number of links changed. Zero means `old` was no longer linked.
    async fn replace_reviewer(
        &mut self,
        pr_id: &str,
        old_user_id: &str,
        new_user_id: &str,
    ) -> Result<u64, DbError>;

    async fn is_reviewer(&mut self, pr_id: &str, user_id: &str) -> Result<bool, DbError>;
}

/// A transactional view of every gateway. Dropping it without calling
/// [`UnitOfWork::commit`] discards all of its writes.
#[async_trait]
pub trait UnitOfWork: UserGateway + TeamGateway + PullRequestGateway + Send {
    async fn commit(self: Box<Self>) -> Result<(), DbError>;

    async fn rollback(self: Box<Self>) -> Result<(), DbError>;
}

/// Opens atomic scopes against a store.
#[async_trait]
pub trait TransactionCoordinator: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, DbError>;
}

/// Runs `work` inside one atomic scope.
///
/// The scope is committed only if `work` returns `Ok`. Any error, whether a
/// business refusal or a storage failure, rolls it back and is returned as is.
/// Failures of `begin` or `commit` themselves surface through `E: From<DbError>`.
///
/// Because `work` is handed a borrowed unit of work, it must own everything
/// else it captures:
///
/// ```ignore
/// let pr_id = pr_id.to_string();
/// run_atomic(coordinator, move |uow| Box::pin(async move {
///     uow.fetch_pull_request(&pr_id).await.map_err(MyError::from)
/// })).await
/// ```
pub async fn run_atomic<T, E, F>(coordinator: &dyn TransactionCoordinator, work: F) -> Result<T, E>
where
    F: for<'a> FnOnce(&'a mut dyn UnitOfWork) -> BoxFuture<'a, Result<T, E>> + Send,
    E: From<DbError> + Send,
    T: Send,
{
    let mut uow = coordinator.begin().await?;

    match work(uow.as_mut()).await {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = uow.rollback().await {
                // The original failure is what the caller needs to see.
                tracing::warn!(error = %rollback_err, "Rollback failed after an aborted unit of work.");
            }
            Err(err)
        }
    }
}
