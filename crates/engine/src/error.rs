use database::DbError;
use std::fmt;
use thiserror::Error;

/// The kinds of record a business error can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    User,
    Team,
    PullRequest,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Entity::User => "user",
            Entity::Team => "team",
            Entity::PullRequest => "pull request",
        })
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: Entity, id: String },

    #[error("{entity} '{id}' already exists")]
    AlreadyExists { entity: Entity, id: String },

    #[error("cannot reassign on merged pull request '{0}'")]
    PrMerged(String),

    #[error("reviewer '{reviewer_id}' is not assigned to pull request '{pr_id}'")]
    NotAssigned { pr_id: String, reviewer_id: String },

    /// An expected outcome, not a defect: nobody in the team can take over.
    #[error("no active replacement candidate in team '{0}'")]
    NoCandidate(String),

    #[error("Storage error: {0}")]
    Storage(#[from] DbError),
}

impl EngineError {
    pub fn not_found(entity: Entity, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn already_exists(entity: Entity, id: impl Into<String>) -> Self {
        EngineError::AlreadyExists {
            entity,
            id: id.into(),
        }
    }
}

/// Maps a missing row to `NotFound` for the given record; every other storage
/// failure stays opaque.
pub(crate) fn missing(entity: Entity, id: &str) -> impl FnOnce(DbError) -> EngineError + '_ {
    move |err| match err {
        DbError::NotFound => EngineError::not_found(entity, id),
        other => EngineError::Storage(other),
    }
}
