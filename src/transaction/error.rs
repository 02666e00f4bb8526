//! Transaction-specific error types.
//!
//! This module provides structured error handling for the transaction
//! subsystem using `thiserror` for ergonomic error definitions.
//!
//! Every variant here is fatal to the transaction it occurs in: the worker
//! releases all held locks in one phase and reports an aborted outcome
//! through the submission handle.

use thiserror::Error;

use crate::common::{BlockAddress, TransactionId};

use super::types::LockMode;

/// Result type alias for transaction operations.
pub type TransactionResult<T> = std::result::Result<T, TransactionError>;

/// Error type for transaction operations.
///
/// Each variant captures enough context to identify the transaction and
/// resource involved.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransactionError {
    /// Lock acquisition exceeded the configured wait bound.
    #[error(
        "Lock timeout: transaction {txn_id} timed out waiting for {mode} lock on block {address}"
    )]
    LockTimeout {
        txn_id: TransactionId,
        address: BlockAddress,
        mode: LockMode,
    },

    /// Block enumeration came back empty for a command's table.
    #[error("No storage blocks found for table '{table}'")]
    MissingBlocks { table: String },

    /// The external executor reported failure.
    #[error("Executor failure: {0}")]
    ExecutorFailure(String),

    /// A non-blocking submit found the worker pool full.
    #[error("Transaction pool saturated")]
    PoolSaturated,
}

impl TransactionError {
    /// Creates a lock timeout error.
    pub fn lock_timeout(txn_id: TransactionId, address: BlockAddress, mode: LockMode) -> Self {
        TransactionError::LockTimeout {
            txn_id,
            address,
            mode,
        }
    }

    /// Creates a missing-blocks error.
    pub fn missing_blocks(table: impl Into<String>) -> Self {
        TransactionError::MissingBlocks {
            table: table.into(),
        }
    }

    /// Returns true if this is a lock-related error.
    pub fn is_lock_error(&self) -> bool {
        matches!(self, TransactionError::LockTimeout { .. })
    }

    /// Returns true if resubmitting the batch could reasonably succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            TransactionError::LockTimeout { .. } | TransactionError::PoolSaturated
        )
    }

    /// Returns the transaction ID if this error is associated with one.
    pub fn transaction_id(&self) -> Option<TransactionId> {
        match self {
            TransactionError::LockTimeout { txn_id, .. } => Some(*txn_id),
            _ => None,
        }
    }
}
