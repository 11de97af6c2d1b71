use thiserror::Error;

/// Storage-level failures. These carry no business meaning; callers decide
/// what a missing row or a violated constraint means for their operation.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to load environment variables for database connection: {0}")]
    ConnectionConfigError(String),

    #[error("Failed to connect to the database: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("The requested data was not found in the database.")]
    NotFound,

    #[error("Uniqueness constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("Stored data could not be decoded: {0}")]
    InvalidData(String),

    /// SQLSTATE 40001: a concurrent transaction changed rows this one depends on.
    #[error("Serialization failure: {0}")]
    SerializationFailure(String),
}

/// SQLSTATE raised when a transaction loses a race under repeatable read or
/// serializable isolation.
const SERIALIZATION_FAILURE: &str = "40001";

impl DbError {
    /// Sorts a query error into the kinds callers branch on. Anything that is
    /// not a missing row or a constraint violation stays an opaque I/O error.
    pub fn classify(err: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind;

        let constraint = match &err {
            sqlx::Error::RowNotFound => return DbError::NotFound,
            sqlx::Error::Database(db_err) => {
                if db_err.code().as_deref() == Some(SERIALIZATION_FAILURE) {
                    return DbError::SerializationFailure(db_err.message().to_string());
                }
                Some((db_err.kind(), db_err.message().to_string()))
            }
            _ => None,
        };

        match constraint {
            Some((ErrorKind::UniqueViolation, message)) => DbError::UniqueViolation(message),
            Some((ErrorKind::ForeignKeyViolation, message)) => DbError::ForeignKeyViolation(message),
            _ => DbError::ConnectionError(err),
        }
    }
}
