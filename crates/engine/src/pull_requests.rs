//! Reviewer assignment on pull request creation, merge and reviewer replacement.
//!
//! Each operation runs inside exactly one atomic scope: every read it bases a
//! decision on and every write it makes either commit together or not at all.

use crate::error::{missing, EngineError, Entity};
use crate::picker::ReviewerPicker;
use core_types::{NewPullRequest, PullRequest, Reassignment};
use database::{run_atomic, DbError, TransactionCoordinator, UnitOfWork};
use std::sync::Arc;

/// How many reviewers a new pull request receives when the team allows it.
pub const MAX_REVIEWERS: usize = 2;

/// The reviewer assignment engine.
///
/// Holds no mutable state of its own besides the shared random source; all
/// shared state lives in the store behind the coordinator.
#[derive(Clone)]
pub struct ReviewEngine {
    coordinator: Arc<dyn TransactionCoordinator>,
    picker: Arc<ReviewerPicker>,
}

impl ReviewEngine {
    pub fn new(coordinator: Arc<dyn TransactionCoordinator>, picker: Arc<ReviewerPicker>) -> Self {
        Self {
            coordinator,
            picker,
        }
    }

    /// Creates the pull request and assigns up to [`MAX_REVIEWERS`] active
    /// teammates of the author.
    ///
    /// An author without eligible teammates gets a pull request with no
    /// reviewers; that is not an error. The returned reviewer list is in the
    /// order the links were written by this call.
    pub async fn create_with_reviewers(
        &self,
        new_pr: NewPullRequest,
    ) -> Result<PullRequest, EngineError> {
        let picker = Arc::clone(&self.picker);
        let pr = run_atomic(self.coordinator.as_ref(), move |uow| {
            Box::pin(create_in(uow, picker, new_pr))
        })
        .await?;

        tracing::info!(
            pr_id = %pr.id,
            author_id = %pr.author_id,
            reviewers = ?pr.reviewers,
            "Pull request created."
        );
        Ok(pr)
    }

    /// Marks the pull request as merged and reports who was reviewing it.
    ///
    /// Merging is idempotent: a second call succeeds and keeps the original
    /// `merged_at`.
    pub async fn merge(&self, pr_id: &str) -> Result<PullRequest, EngineError> {
        let pr_id = pr_id.to_string();
        let pr = run_atomic(self.coordinator.as_ref(), move |uow| {
            Box::pin(merge_in(uow, pr_id))
        })
        .await?;

        tracing::info!(pr_id = %pr.id, merged_at = ?pr.merged_at, "Pull request merged.");
        Ok(pr)
    }

    /// Replaces `old_reviewer_id` on an open pull request with a random active
    /// member of the old reviewer's own team.
    ///
    /// The replacement is never the old reviewer, the author, or anyone already
    /// reviewing the pull request, so the size of the reviewer set is unchanged.
    pub async fn reassign(
        &self,
        pr_id: &str,
        old_reviewer_id: &str,
    ) -> Result<Reassignment, EngineError> {
        let picker = Arc::clone(&self.picker);
        let (scope_pr_id, scope_old_id) = (pr_id.to_string(), old_reviewer_id.to_string());

        let result = run_atomic(self.coordinator.as_ref(), move |uow| {
            Box::pin(reassign_in(uow, picker, scope_pr_id, scope_old_id))
        })
        .await
        .map_err(|err| match err {
            // Under serializable isolation a concurrent reassignment of the same
            // link surfaces as a serialization failure instead of zero rows.
            EngineError::Storage(DbError::SerializationFailure(_)) => EngineError::NotAssigned {
                pr_id: pr_id.to_string(),
                reviewer_id: old_reviewer_id.to_string(),
            },
            other => other,
        });

        match &result {
            Ok(outcome) => tracing::info!(
                pr_id = %outcome.pull_request.id,
                replaced_by = %outcome.replaced_by,
                "Reviewer reassigned."
            ),
            Err(err @ (EngineError::NoCandidate(_) | EngineError::NotAssigned { .. })) => {
                tracing::debug!(error = %err, "Reassignment refused.")
            }
            Err(_) => {}
        }
        result
    }
}

async fn create_in(
    uow: &mut dyn UnitOfWork,
    picker: Arc<ReviewerPicker>,
    mut new_pr: NewPullRequest,
) -> Result<PullRequest, EngineError> {
    new_pr.status = Some(new_pr.status.unwrap_or_default());

    let mut pr = uow
        .insert_pull_request(&new_pr)
        .await
        .map_err(|err| match err {
            DbError::UniqueViolation(_) => EngineError::already_exists(Entity::PullRequest, &new_pr.id),
            // The only foreign key on the row is the author.
            DbError::ForeignKeyViolation(_) => EngineError::not_found(Entity::User, &new_pr.author_id),
            other => EngineError::Storage(other),
        })?;

    let author = uow
        .fetch_user(&pr.author_id)
        .await
        .map_err(missing(Entity::User, &pr.author_id))?;

    let candidates = uow
        .list_active_team_members(&author.team_name, std::slice::from_ref(&author.id))
        .await?;
    let chosen = picker.pick_reviewers(candidates, MAX_REVIEWERS);

    let mut reviewers = Vec::with_capacity(chosen.len());
    for reviewer in chosen {
        uow.insert_reviewer(&pr.id, &reviewer.id).await?;
        reviewers.push(reviewer.id);
    }

    pr.reviewers = reviewers;
    Ok(pr)
}

async fn merge_in(uow: &mut dyn UnitOfWork, pr_id: String) -> Result<PullRequest, EngineError> {
    let mut pr = uow
        .mark_merged(&pr_id)
        .await
        .map_err(missing(Entity::PullRequest, &pr_id))?;
    pr.reviewers = uow.list_reviewers(&pr.id).await?;
    Ok(pr)
}

async fn reassign_in(
    uow: &mut dyn UnitOfWork,
    picker: Arc<ReviewerPicker>,
    pr_id: String,
    old_reviewer_id: String,
) -> Result<Reassignment, EngineError> {
    let mut pr = uow
        .fetch_pull_request(&pr_id)
        .await
        .map_err(missing(Entity::PullRequest, &pr_id))?;

    if pr.is_merged() {
        return Err(EngineError::PrMerged(pr.id));
    }

    let not_assigned = || EngineError::NotAssigned {
        pr_id: pr_id.clone(),
        reviewer_id: old_reviewer_id.clone(),
    };

    if !uow.is_reviewer(&pr.id, &old_reviewer_id).await? {
        return Err(not_assigned());
    }

    // A reviewer is replaced by a peer from their own team, which need not be
    // the author's team.
    let old_reviewer = uow
        .fetch_user(&old_reviewer_id)
        .await
        .map_err(missing(Entity::User, &old_reviewer_id))?;

    let current = uow.list_reviewers(&pr.id).await?;
    let mut exclude = Vec::with_capacity(current.len() + 2);
    exclude.push(old_reviewer_id.clone());
    exclude.push(pr.author_id.clone());
    exclude.extend(current.into_iter().filter(|id| *id != old_reviewer_id));

    let candidates = uow
        .list_active_team_members(&old_reviewer.team_name, &exclude)
        .await?;
    let replacement = match picker.pick_one(&candidates) {
        Some(user) => user.id.clone(),
        None => return Err(EngineError::NoCandidate(old_reviewer.team_name)),
    };

    // Zero rows means another scope moved the link after our check.
    let replaced = uow
        .replace_reviewer(&pr.id, &old_reviewer_id, &replacement)
        .await?;
    if replaced == 0 {
        return Err(not_assigned());
    }

    pr.reviewers = uow.list_reviewers(&pr.id).await?;
    Ok(Reassignment {
        pull_request: pr,
        replaced_by: replacement,
    })
}
