//! Database error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("could not decode stored value: {0}")]
    Decode(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub type DbResult<T> = std::result::Result<T, DbError>;

impl From<DbError> for maestro_core::Error {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(msg) => maestro_core::Error::NotFound(msg),
            DbError::Conflict(msg) => maestro_core::Error::Conflict(msg),
            other => maestro_core::Error::UpstreamStoreFault(other.to_string()),
        }
    }
}
