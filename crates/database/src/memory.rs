//! In-memory implementation of the gateway.
//!
//! All tables live behind one `tokio` mutex. A unit of work holds that lock
//! for its whole lifetime and edits a private copy of the tables, which is
//! published on commit and thrown away on rollback or drop. Transactions are
//! therefore fully serialized. The same uniqueness and foreign-key rules as
//! the PostgreSQL schema are enforced. All state is lost on restart.

use crate::gateway::{PullRequestGateway, TeamGateway, TransactionCoordinator, UnitOfWork, UserGateway};
use crate::DbError;
use async_trait::async_trait;
use chrono::Utc;
use core_types::{NewPullRequest, PrStatus, PullRequest, User};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct Tables {
    teams: BTreeSet<String>,
    users: BTreeMap<String, User>,
    /// Stored without reviewers.
    pull_requests: BTreeMap<String, PullRequest>,
    /// `(pr_id, user_id)` links in insertion order.
    reviewers: Vec<(String, String)>,
}

impl Tables {
    fn has_link(&self, pr_id: &str, user_id: &str) -> bool {
        self.reviewers
            .iter()
            .any(|(pr, user)| pr == pr_id && user == user_id)
    }
}

/// Process-local store, cheap to clone; clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionCoordinator for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, DbError> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryUnitOfWork { guard, working }))
    }
}

pub struct InMemoryUnitOfWork {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<(), DbError> {
        let InMemoryUnitOfWork { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DbError> {
        Ok(())
    }
}

#[async_trait]
impl UserGateway for InMemoryUnitOfWork {
    async fn upsert_user(&mut self, user: &User) -> Result<(), DbError> {
        if !self.working.teams.contains(&user.team_name) {
            return Err(DbError::ForeignKeyViolation(format!(
                "team {} does not exist",
                user.team_name
            )));
        }
        self.working.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn fetch_user(&mut self, user_id: &str) -> Result<User, DbError> {
        self.working.users.get(user_id).cloned().ok_or(DbError::NotFound)
    }

    async fn user_exists(&mut self, user_id: &str) -> Result<bool, DbError> {
        Ok(self.working.users.contains_key(user_id))
    }

    async fn list_team_members(&mut self, team_name: &str) -> Result<Vec<User>, DbError> {
        Ok(self
            .working
            .users
            .values()
            .filter(|user| user.team_name == team_name)
            .cloned()
            .collect())
    }

    async fn list_active_team_members(
        &mut self,
        team_name: &str,
        exclude: &[String],
    ) -> Result<Vec<User>, DbError> {
        Ok(self
            .working
            .users
            .values()
            .filter(|user| user.team_name == team_name && user.is_active)
            .filter(|user| !exclude.contains(&user.id))
            .cloned()
            .collect())
    }

    async fn set_user_active(&mut self, user_id: &str, is_active: bool) -> Result<User, DbError> {
        let user = self
            .working
            .users
            .get_mut(user_id)
            .ok_or(DbError::NotFound)?;
        user.is_active = is_active;
        Ok(user.clone())
    }
}

#[async_trait]
impl TeamGateway for InMemoryUnitOfWork {
    async fn insert_team(&mut self, team_name: &str) -> Result<(), DbError> {
        if !self.working.teams.insert(team_name.to_string()) {
            return Err(DbError::UniqueViolation(format!(
                "team {team_name} already exists"
            )));
        }
        Ok(())
    }

    async fn team_exists(&mut self, team_name: &str) -> Result<bool, DbError> {
        Ok(self.working.teams.contains(team_name))
    }
}

#[async_trait]
impl PullRequestGateway for InMemoryUnitOfWork {
    async fn insert_pull_request(&mut self, pr: &NewPullRequest) -> Result<PullRequest, DbError> {
        if self.working.pull_requests.contains_key(&pr.id) {
            return Err(DbError::UniqueViolation(format!(
                "pull request {} already exists",
                pr.id
            )));
        }
        if !self.working.users.contains_key(&pr.author_id) {
            return Err(DbError::ForeignKeyViolation(format!(
                "author {} does not exist",
                pr.author_id
            )));
        }

        let status = pr.status.unwrap_or_default();
        let now = Utc::now();
        let stored = PullRequest {
            id: pr.id.clone(),
            name: pr.name.clone(),
            author_id: pr.author_id.clone(),
            status,
            reviewers: Vec::new(),
            created_at: Some(now),
            merged_at: status.is_merged().then_some(now),
        };
        self.working
            .pull_requests
            .insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn fetch_pull_request(&mut self, pr_id: &str) -> Result<PullRequest, DbError> {
        self.working
            .pull_requests
            .get(pr_id)
            .cloned()
            .ok_or(DbError::NotFound)
    }

    async fn mark_merged(&mut self, pr_id: &str) -> Result<PullRequest, DbError> {
        let pr = self
            .working
            .pull_requests
            .get_mut(pr_id)
            .ok_or(DbError::NotFound)?;
        pr.status = PrStatus::Merged;
        if pr.merged_at.is_none() {
            pr.merged_at = Some(Utc::now());
        }
        Ok(pr.clone())
    }

    async fn list_reviewable(&mut self, user_id: &str) -> Result<Vec<PullRequest>, DbError> {
        let tables = &self.working;
        Ok(tables
            .reviewers
            .iter()
            .filter(|(_, user)| user == user_id)
            .filter_map(|(pr_id, _)| tables.pull_requests.get(pr_id).cloned())
            .collect())
    }

    async fn list_reviewers(&mut self, pr_id: &str) -> Result<Vec<String>, DbError> {
        Ok(self
            .working
            .reviewers
            .iter()
            .filter(|(pr, _)| pr == pr_id)
            .map(|(_, user)| user.clone())
            .collect())
    }

    async fn insert_reviewer(&mut self, pr_id: &str, user_id: &str) -> Result<(), DbError> {
        if !self.working.pull_requests.contains_key(pr_id) || !self.working.users.contains_key(user_id) {
            return Err(DbError::ForeignKeyViolation(format!(
                "link ({pr_id}, {user_id}) references a missing row"
            )));
        }
        if self.working.has_link(pr_id, user_id) {
            return Err(DbError::UniqueViolation(format!(
                "{user_id} already reviews {pr_id}"
            )));
        }
        self.working
            .reviewers
            .push((pr_id.to_string(), user_id.to_string()));
        Ok(())
    }

    async fn replace_reviewer(
        &mut self,
        pr_id: &str,
        old_user_id: &str,
        new_user_id: &str,
    ) -> Result<u64, DbError> {
        if !self.working.has_link(pr_id, old_user_id) {
            return Ok(0);
        }
        if !self.working.users.contains_key(new_user_id) {
            return Err(DbError::ForeignKeyViolation(format!(
                "user {new_user_id} does not exist"
            )));
        }
        if self.working.has_link(pr_id, new_user_id) {
            return Err(DbError::UniqueViolation(format!(
                "{new_user_id} already reviews {pr_id}"
            )));
        }

        let mut changed = 0;
        for (pr, user) in self.working.reviewers.iter_mut() {
            if pr == pr_id && user == old_user_id {
                *user = new_user_id.to_string();
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn is_reviewer(&mut self, pr_id: &str, user_id: &str) -> Result<bool, DbError> {
        Ok(self.working.has_link(pr_id, user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::run_atomic;

    fn user(id: &str, team: &str, is_active: bool) -> User {
        User {
            id: id.to_string(),
            name: format!("User {id}"),
            team_name: team.to_string(),
            is_active,
        }
    }

    async fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        uow.insert_team("core").await.unwrap();
        uow.upsert_user(&user("u1", "core", true)).await.unwrap();
        uow.upsert_user(&user("u2", "core", true)).await.unwrap();
        uow.upsert_user(&user("u3", "core", false)).await.unwrap();
        uow.insert_pull_request(&NewPullRequest::new("pr1", "feat", "u1"))
            .await
            .unwrap();
        uow.insert_reviewer("pr1", "u2").await.unwrap();
        uow.commit().await.unwrap();
        store
    }

    #[tokio::test]
    async fn uncommitted_work_is_discarded_on_drop() {
        let store = seeded_store().await;
        {
            let mut uow = store.begin().await.unwrap();
            uow.insert_team("ghost").await.unwrap();
        }
        let mut uow = store.begin().await.unwrap();
        assert!(!uow.team_exists("ghost").await.unwrap());
    }

    #[tokio::test]
    async fn run_atomic_rolls_back_on_error() {
        let store = seeded_store().await;

        let result: Result<(), DbError> = run_atomic(&store, |uow| {
            Box::pin(async move {
                uow.insert_team("half-done").await?;
                Err(DbError::NotFound)
            })
        })
        .await;
        assert!(matches!(result, Err(DbError::NotFound)));

        let mut uow = store.begin().await.unwrap();
        assert!(!uow.team_exists("half-done").await.unwrap());
    }

    #[tokio::test]
    async fn run_atomic_commits_on_success() {
        let store = seeded_store().await;

        let merged = run_atomic(&store, |uow| {
            Box::pin(async move { uow.mark_merged("pr1").await })
        })
        .await
        .unwrap();
        assert_eq!(merged.status, PrStatus::Merged);

        let mut uow = store.begin().await.unwrap();
        let stored = uow.fetch_pull_request("pr1").await.unwrap();
        assert_eq!(stored.merged_at, merged.merged_at);
    }

    #[tokio::test]
    async fn constraint_violations_are_reported() {
        let store = seeded_store().await;
        let mut uow = store.begin().await.unwrap();

        let duplicate = uow
            .insert_pull_request(&NewPullRequest::new("pr1", "again", "u1"))
            .await;
        assert!(matches!(duplicate, Err(DbError::UniqueViolation(_))));

        let orphan = uow
            .insert_pull_request(&NewPullRequest::new("pr9", "orphan", "nobody"))
            .await;
        assert!(matches!(orphan, Err(DbError::ForeignKeyViolation(_))));

        let twice = uow.insert_reviewer("pr1", "u2").await;
        assert!(matches!(twice, Err(DbError::UniqueViolation(_))));
    }

    #[tokio::test]
    async fn active_members_respect_exclusions() {
        let store = seeded_store().await;
        let mut uow = store.begin().await.unwrap();

        let all_active = uow.list_active_team_members("core", &[]).await.unwrap();
        let ids: Vec<_> = all_active.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["u1", "u2"]);

        let excluded = uow
            .list_active_team_members("core", &["u1".to_string()])
            .await
            .unwrap();
        assert_eq!(excluded.len(), 1);
        assert_eq!(excluded[0].id, "u2");
    }

    #[tokio::test]
    async fn replace_reviewer_reports_stale_links() {
        let store = seeded_store().await;
        let mut uow = store.begin().await.unwrap();

        assert_eq!(uow.replace_reviewer("pr1", "u2", "u3").await.unwrap(), 1);
        assert_eq!(uow.replace_reviewer("pr1", "u2", "u3").await.unwrap(), 0);
        assert_eq!(uow.list_reviewers("pr1").await.unwrap(), vec!["u3".to_string()]);
    }

    #[tokio::test]
    async fn merge_keeps_first_timestamp() {
        let store = seeded_store().await;
        let mut uow = store.begin().await.unwrap();

        let first = uow.mark_merged("pr1").await.unwrap();
        let second = uow.mark_merged("pr1").await.unwrap();
        assert!(first.merged_at.is_some());
        assert_eq!(first.merged_at, second.merged_at);
    }
}
