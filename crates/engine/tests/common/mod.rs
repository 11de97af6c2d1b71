//! # Common Test Utilities
//!
//! Seeds an in-memory store with a small, fixed world and provides a store
//! wrapper that fails on demand.
//!
//! users:
//!   u1, u2, u3 -> test_team (all active)
//!   u4, u5     -> other_team (active), u6 -> other_team (inactive)
//!
//! pull requests:
//!   pr1 (OPEN)   author u1, reviewers u2, u3
//!   pr2 (MERGED) author u1, reviewer u2
//!   pr3 (OPEN)   author u4, reviewer u5

#![allow(dead_code)]

use async_trait::async_trait;
use core_types::{NewPullRequest, PrStatus, PullRequest, User};
use database::{
    DbError, InMemoryStore, PullRequestGateway, TeamGateway, TransactionCoordinator, UnitOfWork,
    UserGateway,
};
use engine::{ReviewerPicker, Services};
use std::sync::Arc;

pub const TEST_TEAM: &str = "test_team";
pub const OTHER_TEAM: &str = "other_team";

pub fn user(id: &str, name: &str, team_name: &str, is_active: bool) -> User {
    User {
        id: id.to_string(),
        name: name.to_string(),
        team_name: team_name.to_string(),
        is_active,
    }
}

/// Builds the fixture world described in the module docs.
pub async fn fixture_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    let mut uow = store.begin().await.expect("begin");

    uow.insert_team(TEST_TEAM).await.expect("team");
    uow.insert_team(OTHER_TEAM).await.expect("team");

    for u in [
        user("u1", "User One", TEST_TEAM, true),
        user("u2", "User Two", TEST_TEAM, true),
        user("u3", "User Three", TEST_TEAM, true),
        user("u4", "User Four", OTHER_TEAM, true),
        user("u5", "User Five", OTHER_TEAM, true),
        user("u6", "User Six", OTHER_TEAM, false),
    ] {
        uow.upsert_user(&u).await.expect("user");
    }

    for (id, name, author) in [
        ("pr1", "pr_test1", "u1"),
        ("pr2", "pr_test2", "u1"),
        ("pr3", "pr_test3", "u4"),
    ] {
        uow.insert_pull_request(&NewPullRequest::new(id, name, author))
            .await
            .expect("pull request");
    }
    uow.mark_merged("pr2").await.expect("merge");

    for (pr, reviewer) in [("pr1", "u2"), ("pr1", "u3"), ("pr2", "u2"), ("pr3", "u5")] {
        uow.insert_reviewer(pr, reviewer).await.expect("link");
    }

    uow.commit().await.expect("commit");
    store
}

pub fn services(coordinator: Arc<dyn TransactionCoordinator>) -> Services {
    Services::new(coordinator, Arc::new(ReviewerPicker::from_entropy()))
}

/// Reads a pull request and its links straight from the store.
pub async fn stored_pr(store: &InMemoryStore, pr_id: &str) -> Option<PullRequest> {
    let mut uow = store.begin().await.expect("begin");
    let mut pr = match uow.fetch_pull_request(pr_id).await {
        Ok(pr) => pr,
        Err(DbError::NotFound) => return None,
        Err(err) => panic!("unexpected storage error: {err}"),
    };
    pr.reviewers = uow.list_reviewers(pr_id).await.expect("reviewers");
    Some(pr)
}

pub async fn stored_user(store: &InMemoryStore, user_id: &str) -> User {
    let mut uow = store.begin().await.expect("begin");
    uow.fetch_user(user_id).await.expect("user")
}

pub fn assert_open_and_fresh(pr: &PullRequest) {
    assert_eq!(pr.status, PrStatus::Open);
    assert!(pr.created_at.is_some());
    assert!(pr.merged_at.is_none());
}

/// Which reviewer-link write a [`FailingLinks`] store refuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkFailure {
    /// Every insert fails with an opaque storage error.
    Insert,
    /// Every replace fails the way PostgreSQL reports a lost serializable race.
    ReplaceConflict,
}

/// A coordinator whose units of work fail one kind of reviewer-link write,
/// used to check what a half-finished operation leaves behind.
pub struct FailingLinks {
    pub inner: InMemoryStore,
    pub failure: LinkFailure,
}

impl FailingLinks {
    pub fn new(inner: InMemoryStore, failure: LinkFailure) -> Self {
        Self { inner, failure }
    }
}

#[async_trait]
impl TransactionCoordinator for FailingLinks {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, DbError> {
        Ok(Box::new(FailingLinksUow {
            inner: self.inner.begin().await?,
            failure: self.failure,
        }))
    }
}

struct FailingLinksUow {
    inner: Box<dyn UnitOfWork>,
    failure: LinkFailure,
}

#[async_trait]
impl UnitOfWork for FailingLinksUow {
    async fn commit(self: Box<Self>) -> Result<(), DbError> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), DbError> {
        self.inner.rollback().await
    }
}

#[async_trait]
impl UserGateway for FailingLinksUow {
    async fn upsert_user(&mut self, user: &User) -> Result<(), DbError> {
        self.inner.upsert_user(user).await
    }

    async fn fetch_user(&mut self, user_id: &str) -> Result<User, DbError> {
        self.inner.fetch_user(user_id).await
    }

    async fn user_exists(&mut self, user_id: &str) -> Result<bool, DbError> {
        self.inner.user_exists(user_id).await
    }

    async fn list_team_members(&mut self, team_name: &str) -> Result<Vec<User>, DbError> {
        self.inner.list_team_members(team_name).await
    }

    async fn list_active_team_members(
        &mut self,
        team_name: &str,
        exclude: &[String],
    ) -> Result<Vec<User>, DbError> {
        self.inner.list_active_team_members(team_name, exclude).await
    }

    async fn set_user_active(&mut self, user_id: &str, is_active: bool) -> Result<User, DbError> {
        self.inner.set_user_active(user_id, is_active).await
    }
}

#[async_trait]
impl TeamGateway for FailingLinksUow {
    async fn insert_team(&mut self, team_name: &str) -> Result<(), DbError> {
        self.inner.insert_team(team_name).await
    }

    async fn team_exists(&mut self, team_name: &str) -> Result<bool, DbError> {
        self.inner.team_exists(team_name).await
    }
}

#[async_trait]
impl PullRequestGateway for FailingLinksUow {
    async fn insert_pull_request(&mut self, pr: &NewPullRequest) -> Result<PullRequest, DbError> {
        self.inner.insert_pull_request(pr).await
    }

    async fn fetch_pull_request(&mut self, pr_id: &str) -> Result<PullRequest, DbError> {
        self.inner.fetch_pull_request(pr_id).await
    }

    async fn mark_merged(&mut self, pr_id: &str) -> Result<PullRequest, DbError> {
        self.inner.mark_merged(pr_id).await
    }

    async fn list_reviewable(&mut self, user_id: &str) -> Result<Vec<PullRequest>, DbError> {
        self.inner.list_reviewable(user_id).await
    }

    async fn list_reviewers(&mut self, pr_id: &str) -> Result<Vec<String>, DbError> {
        self.inner.list_reviewers(pr_id).await
    }

    async fn insert_reviewer(&mut self, pr_id: &str, user_id: &str) -> Result<(), DbError> {
        if self.failure == LinkFailure::Insert {
            return Err(DbError::InvalidData("reviewer links unavailable".to_string()));
        }
        self.inner.insert_reviewer(pr_id, user_id).await
    }

    async fn replace_reviewer(
        &mut self,
        pr_id: &str,
        old_user_id: &str,
        new_user_id: &str,
    ) -> Result<u64, DbError> {
        if self.failure == LinkFailure::ReplaceConflict {
            return Err(DbError::SerializationFailure(
                "could not serialize access due to concurrent update".to_string(),
            ));
        }
        self.inner.replace_reviewer(pr_id, old_user_id, new_user_id).await
    }

    async fn is_reviewer(&mut self, pr_id: &str, user_id: &str) -> Result<bool, DbError> {
        self.inner.is_reviewer(pr_id, user_id).await
    }
}
