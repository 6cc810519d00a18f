pub mod session_repository;
pub mod token_repository;
pub mod user_repository;

pub use session_repository::{SessionStore, SqliteSessionStore};
pub use token_repository::{SqliteTokenStore, TokenStore};
pub use user_repository::{SqliteUserRepository, UserRepository};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Record not found")]
    NotFound,
    #[error("Record already exists")]
    AlreadyExists,
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err.as_database_error() {
        Some(db_err) => db_err.is_unique_violation() || db_err.message().contains("UNIQUE"),
        None => false,
    }
}

/// Maps a unique-key failure to `AlreadyExists`, everything else to `Database`.
pub(crate) fn map_insert_error(err: sqlx::Error) -> RepositoryError {
    if is_unique_violation(&err) {
        RepositoryError::AlreadyExists
    } else {
        RepositoryError::Database(err)
    }
}
