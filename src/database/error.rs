//! Database error taxonomy shared by all repositories.

use thiserror::Error;

pub type DatabaseResult<T> = Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("{entity} not found")]
    NotFound { entity: String },

    #[error("Database connection error: {message}")]
    Connection { message: String },

    #[error("Database query failed: {message}")]
    Query { message: String },

    #[error("Failed to serialize row data: {message}")]
    Serialization { message: String },
}

impl DatabaseError {
    pub fn not_found(entity: impl Into<String>) -> Self {
        DatabaseError::NotFound {
            entity: entity.into(),
        }
    }

    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound {
                entity: "row".to_string(),
            },
            sqlx::Error::Database(db_err) => {
                // 23505 = unique_violation
                if db_err.code().as_deref() == Some("23505") {
                    return DatabaseError::UniqueViolation {
                        constraint: db_err
                            .constraint()
                            .unwrap_or("unknown")
                            .to_string(),
                    };
                }
                DatabaseError::Query {
                    message: db_err.to_string(),
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::Connection {
                    message: err.to_string(),
                }
            }
            _ => DatabaseError::Query {
                message: err.to_string(),
            },
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DatabaseError::UniqueViolation { .. })
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, DatabaseError::Connection { .. })
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        DatabaseError::from_sqlx(err)
    }
}
