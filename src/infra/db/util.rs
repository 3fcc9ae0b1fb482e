use sqlx::error::DatabaseError;

use crate::application::repos::RepoError;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";
const INVALID_TEXT_REPRESENTATION: &str = "22P02";
const NUMERIC_OUT_OF_RANGE: &str = "22003";
const QUERY_CANCELED: &str = "57014";

/// Translate a driver error into the repository taxonomy.
///
/// Classification goes by SQLSTATE; the constraint name is kept where one
/// is reported so that depth and parent violations stay distinguishable.
pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) => map_database_error(db.as_ref()),
        other => RepoError::from_persistence(other),
    }
}

fn map_database_error(db: &dyn DatabaseError) -> RepoError {
    let constraint = db.constraint().unwrap_or("unknown").to_string();
    match db.code().as_deref() {
        Some(UNIQUE_VIOLATION) => RepoError::Duplicate { constraint },
        Some(FOREIGN_KEY_VIOLATION) => RepoError::InvalidInput {
            message: format!("referenced record missing ({constraint})"),
        },
        Some(INVALID_TEXT_REPRESENTATION | NUMERIC_OUT_OF_RANGE) => RepoError::InvalidInput {
            message: db.message().to_string(),
        },
        Some(CHECK_VIOLATION) => RepoError::Integrity {
            message: format!("{constraint}: {}", db.message()),
        },
        Some(QUERY_CANCELED) => RepoError::Timeout,
        _ => RepoError::from_persistence(db.message()),
    }
}
