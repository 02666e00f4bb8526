use thiserror::Error;

use crate::transaction::error::TransactionError;

#[derive(Error, Debug, Clone)]
pub enum DbError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

// Error conversions for common error types

impl From<TransactionError> for DbError {
    fn from(e: TransactionError) -> Self {
        DbError::Transaction(e.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(e: serde_json::Error) -> Self {
        DbError::InvalidInput(e.to_string())
    }
}
