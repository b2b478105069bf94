use orderly_core::catalog::CatalogError;
use thiserror::Error;

pub mod product;

pub use product::SqlCatalogRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for CatalogError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Database(
                error @ (sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::WorkerCrashed
                | sqlx::Error::Io(_)),
            ) => CatalogError::Unavailable(error.to_string()),
            RepositoryError::Database(error) => CatalogError::Query(error.to_string()),
            RepositoryError::Decode(message) => CatalogError::Decode(message),
        }
    }
}
