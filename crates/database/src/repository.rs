use crate::gateway::{PullRequestGateway, TeamGateway, TransactionCoordinator, UnitOfWork, UserGateway};
use crate::DbError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use configuration::IsolationLevel;
use core_types::{NewPullRequest, PrStatus, PullRequest, User};
use sqlx::postgres::{PgPool, Postgres};
use sqlx::{FromRow, Transaction};

/// The `DbRepository` is the PostgreSQL-backed transaction coordinator. It
/// owns the connection pool and hands out [`PgUnitOfWork`]s, each wrapping a
/// single database transaction.
#[derive(Debug, Clone)]
pub struct DbRepository {
    pool: PgPool,
    isolation: IsolationLevel,
}

// This struct represents a row fetched from the users table.
#[derive(FromRow, Debug, Clone)]
struct DbUser {
    id: String,
    name: String,
    team_name: String,
    is_active: bool,
}

impl From<DbUser> for User {
    fn from(row: DbUser) -> Self {
        User {
            id: row.id,
            name: row.name,
            team_name: row.team_name,
            is_active: row.is_active,
        }
    }
}

/// Represents a row from the `pull_requests` table.
#[derive(FromRow, Debug, Clone)]
struct DbPullRequest {
    id: String,
    name: String,
    author_id: String,
    status: String,
    created_at: Option<DateTime<Utc>>,
    merged_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbPullRequest> for PullRequest {
    type Error = DbError;

    fn try_from(row: DbPullRequest) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<PrStatus>()
            .map_err(|e| DbError::InvalidData(e.to_string()))?;
        Ok(PullRequest {
            id: row.id,
            name: row.name,
            author_id: row.author_id,
            status,
            reviewers: Vec::new(),
            created_at: row.created_at,
            merged_at: row.merged_at,
        })
    }
}

fn isolation_statement(level: IsolationLevel) -> &'static str {
    match level {
        IsolationLevel::ReadCommitted => "SET TRANSACTION ISOLATION LEVEL READ COMMITTED",
        IsolationLevel::RepeatableRead => "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ",
        IsolationLevel::Serializable => "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE",
    }
}

impl DbRepository {
    /// Creates a new `DbRepository` with a shared database connection pool.
    pub fn new(pool: PgPool, isolation: IsolationLevel) -> Self {
        Self { pool, isolation }
    }
}

#[async_trait]
impl TransactionCoordinator for DbRepository {
    /// Opens a transaction and pins its isolation level before any other
    /// statement runs.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, DbError> {
        let mut tx: Transaction<'static, Postgres> = self.pool.begin().await?;

        sqlx::query(isolation_statement(self.isolation))
            .execute(&mut *tx)
            .await?;

        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

/// One open PostgreSQL transaction. If it is dropped before `commit`, sqlx
/// rolls it back.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<(), DbError> {
        self.tx.commit().await.map_err(DbError::classify)?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DbError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl UserGateway for PgUnitOfWork {
    async fn upsert_user(&mut self, user: &User) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, team_name, is_active)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                team_name = EXCLUDED.team_name,
                is_active = EXCLUDED.is_active
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.team_name)
        .bind(user.is_active)
        .execute(&mut *self.tx)
        .await
        .map_err(DbError::classify)?;
        Ok(())
    }

    async fn fetch_user(&mut self, user_id: &str) -> Result<User, DbError> {
        let row = sqlx::query_as::<_, DbUser>(
            "SELECT id, name, team_name, is_active FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(DbError::classify)?;
        Ok(row.into())
    }

    async fn user_exists(&mut self, user_id: &str) -> Result<bool, DbError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(DbError::classify)?;
        Ok(exists)
    }

    async fn list_team_members(&mut self, team_name: &str) -> Result<Vec<User>, DbError> {
        let rows = sqlx::query_as::<_, DbUser>(
            "SELECT id, name, team_name, is_active FROM users WHERE team_name = $1 ORDER BY id",
        )
        .bind(team_name)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(DbError::classify)?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn list_active_team_members(
        &mut self,
        team_name: &str,
        exclude: &[String],
    ) -> Result<Vec<User>, DbError> {
        // `id = ANY('{}')` is false, so an empty exclusion list filters nothing.
        let rows = sqlx::query_as::<_, DbUser>(
            r#"
            SELECT id, name, team_name, is_active
            FROM users
            WHERE team_name = $1
              AND is_active = TRUE
              AND NOT (id = ANY($2))
            "#,
        )
        .bind(team_name)
        .bind(exclude)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(DbError::classify)?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn set_user_active(&mut self, user_id: &str, is_active: bool) -> Result<User, DbError> {
        let row = sqlx::query_as::<_, DbUser>(
            r#"
            UPDATE users
            SET is_active = $1
            WHERE id = $2
            RETURNING id, name, team_name, is_active
            "#,
        )
        .bind(is_active)
        .bind(user_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(DbError::classify)?;
        Ok(row.into())
    }
}

#[async_trait]
impl TeamGateway for PgUnitOfWork {
    async fn insert_team(&mut self, team_name: &str) -> Result<(), DbError> {
        sqlx::query("INSERT INTO teams (name) VALUES ($1)")
            .bind(team_name)
            .execute(&mut *self.tx)
            .await
            .map_err(DbError::classify)?;
        Ok(())
    }

    async fn team_exists(&mut self, team_name: &str) -> Result<bool, DbError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM teams WHERE name = $1)")
            .bind(team_name)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(DbError::classify)?;
        Ok(exists)
    }
}

#[async_trait]
impl PullRequestGateway for PgUnitOfWork {
    async fn insert_pull_request(&mut self, pr: &NewPullRequest) -> Result<PullRequest, DbError> {
        let status = pr.status.unwrap_or_default();
        let row = sqlx::query_as::<_, DbPullRequest>(
            r#"
            INSERT INTO pull_requests (id, name, author_id, status, merged_at)
            VALUES ($1, $2, $3, $4, CASE WHEN $4 = 'MERGED' THEN now() END)
            RETURNING id, name, author_id, status, created_at, merged_at
            "#,
        )
        .bind(&pr.id)
        .bind(&pr.name)
        .bind(&pr.author_id)
        .bind(status.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(DbError::classify)?;
        row.try_into()
    }

    async fn fetch_pull_request(&mut self, pr_id: &str) -> Result<PullRequest, DbError> {
        let row = sqlx::query_as::<_, DbPullRequest>(
            r#"
            SELECT id, name, author_id, status, created_at, merged_at
            FROM pull_requests
            WHERE id = $1
            "#,
        )
        .bind(pr_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(DbError::classify)?;
        row.try_into()
    }

    async fn mark_merged(&mut self, pr_id: &str) -> Result<PullRequest, DbError> {
        let row = sqlx::query_as::<_, DbPullRequest>(
            r#"
            UPDATE pull_requests
            SET status = 'MERGED',
                merged_at = COALESCE(merged_at, now())
            WHERE id = $1
            RETURNING id, name, author_id, status, created_at, merged_at
            "#,
        )
        .bind(pr_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(DbError::classify)?;
        row.try_into()
    }

    async fn list_reviewable(&mut self, user_id: &str) -> Result<Vec<PullRequest>, DbError> {
        let rows = sqlx::query_as::<_, DbPullRequest>(
            r#"
            SELECT p.id, p.name, p.author_id, p.status, p.created_at, p.merged_at
            FROM pr_reviewers r
            JOIN pull_requests p ON p.id = r.pr_id
            WHERE r.user_id = $1
            ORDER BY p.created_at, p.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(DbError::classify)?;
        rows.into_iter().map(PullRequest::try_from).collect()
    }

    async fn list_reviewers(&mut self, pr_id: &str) -> Result<Vec<String>, DbError> {
        let reviewers: Vec<String> = sqlx::query_scalar("SELECT user_id FROM pr_reviewers WHERE pr_id = $1")
            .bind(pr_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(DbError::classify)?;
        Ok(reviewers)
    }

    async fn insert_reviewer(&mut self, pr_id: &str, user_id: &str) -> Result<(), DbError> {
        sqlx::query("INSERT INTO pr_reviewers (pr_id, user_id) VALUES ($1, $2)")
            .bind(pr_id)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await
            .map_err(DbError::classify)?;
        Ok(())
    }

    async fn replace_reviewer(
        &mut self,
        pr_id: &str,
        old_user_id: &str,
        new_user_id: &str,
    ) -> Result<u64, DbError> {
        // Matching on the old pair re-checks the assignment at write time, so a
        // concurrent reassignment that got there first leaves zero rows here.
        let result = sqlx::query(
            r#"
            UPDATE pr_reviewers
            SET user_id = $1
            WHERE pr_id = $2 AND user_id = $3
            "#,
        )
        .bind(new_user_id)
        .bind(pr_id)
        .bind(old_user_id)
        .execute(&mut *self.tx)
        .await
        .map_err(DbError::classify)?;
        Ok(result.rows_affected())
    }

    async fn is_reviewer(&mut self, pr_id: &str, user_id: &str) -> Result<bool, DbError> {
        let assigned: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM pr_reviewers WHERE pr_id = $1 AND user_id = $2)",
        )
        .bind(pr_id)
        .bind(user_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(DbError::classify)?;
        Ok(assigned)
    }
}
