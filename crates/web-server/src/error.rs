use crate::dto::{ErrorBody, ErrorDetail};
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use engine::{EngineError, Entity};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("request timed out")]
    Timeout,
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl AppError {
    /// The HTTP status and the stable error code clients match on.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Engine(err) => match err {
                EngineError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                EngineError::AlreadyExists {
                    entity: Entity::Team,
                    ..
                } => (StatusCode::BAD_REQUEST, "TEAM_EXISTS"),
                EngineError::AlreadyExists { .. } => (StatusCode::CONFLICT, "PR_EXISTS"),
                EngineError::PrMerged(_) => (StatusCode::CONFLICT, "PR_MERGED"),
                EngineError::NotAssigned { .. } => (StatusCode::CONFLICT, "NOT_ASSIGNED"),
                EngineError::NoCandidate(_) => (StatusCode::CONFLICT, "NO_CANDIDATE"),
                EngineError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::Timeout => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
        }
    }
}

/// Converts our custom `AppError` into an HTTP response.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::Engine(EngineError::Storage(db_err)) => {
                tracing::error!(error = ?db_err, "Database error.");
                "An internal error occurred".to_string()
            }
            AppError::Timeout => {
                tracing::warn!("Request deadline exceeded.");
                self.to_string()
            }
            other => other.to_string(),
        };

        let body = Json(ErrorBody {
            error: ErrorDetail { code, message },
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use database::DbError;

    #[test]
    fn already_exists_depends_on_entity() {
        let team = AppError::from(EngineError::already_exists(Entity::Team, "backend"));
        assert_eq!(team.status_and_code(), (StatusCode::BAD_REQUEST, "TEAM_EXISTS"));

        let pr = AppError::from(EngineError::already_exists(Entity::PullRequest, "pr1"));
        assert_eq!(pr.status_and_code(), (StatusCode::CONFLICT, "PR_EXISTS"));
    }

    #[test]
    fn business_refusals_are_conflicts() {
        let cases = [
            (EngineError::PrMerged("pr1".to_string()), "PR_MERGED"),
            (
                EngineError::NotAssigned {
                    pr_id: "pr1".to_string(),
                    reviewer_id: "u9".to_string(),
                },
                "NOT_ASSIGNED",
            ),
            (EngineError::NoCandidate("backend".to_string()), "NO_CANDIDATE"),
        ];
        for (err, code) in cases {
            assert_eq!(AppError::from(err).status_and_code(), (StatusCode::CONFLICT, code));
        }
    }

    #[test]
    fn storage_failures_are_internal() {
        let err = AppError::from(EngineError::Storage(DbError::NotFound));
        assert_eq!(
            err.status_and_code(),
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
        );
        assert_eq!(AppError::Timeout.status_and_code().0, StatusCode::GATEWAY_TIMEOUT);
    }
}
