// Core transaction types and domain models.
//
// This module defines the fundamental types used throughout the
// transaction management system: lock modes, command batches, and the
// lifecycle states a transaction moves through.
//
// # Example
//
// ```rust,ignore
// let cmd = Command::new("employee", CommandKind::Update);
// assert_eq!(cmd.kind.lock_mode(), LockMode::Exclusive);
// ```

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::TransactionError;

/// Lock mode for a storage block.
///
/// # Lock Compatibility Matrix
///
/// |     | S | X |
/// |-----|---|---|
/// | S   | ✓ | ✗ |
/// | X   | ✗ | ✗ |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockMode {
    /// Shared lock (S) - Read lock.
    Shared,
    /// Exclusive lock (X) - Write lock.
    Exclusive,
}

impl LockMode {
    /// Check if two lock modes can be held simultaneously by distinct
    /// transactions.
    pub fn is_compatible(&self, other: &LockMode) -> bool {
        matches!((self, other), (LockMode::Shared, LockMode::Shared))
    }

    /// Get the strength of the lock. Higher values indicate stronger locks.
    #[inline]
    pub fn strength(&self) -> u8 {
        match self {
            LockMode::Shared => 1,
            LockMode::Exclusive => 2,
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Shared => write!(f, "SHARED"),
            LockMode::Exclusive => write!(f, "EXCLUSIVE"),
        }
    }
}

/// Kind of table operation carried by a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl CommandKind {
    /// The lock mode this kind of command needs on every block it touches.
    ///
    /// Reads share; everything that mutates takes exclusive ownership.
    pub fn lock_mode(&self) -> LockMode {
        match self {
            CommandKind::Select => LockMode::Shared,
            CommandKind::Insert | CommandKind::Update | CommandKind::Delete => LockMode::Exclusive,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::Select => write!(f, "SELECT"),
            CommandKind::Insert => write!(f, "INSERT"),
            CommandKind::Update => write!(f, "UPDATE"),
            CommandKind::Delete => write!(f, "DELETE"),
        }
    }
}

/// One table operation inside a transaction batch.
///
/// `parameters` is opaque to the transaction core; it is carried through
/// to the executor untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub table: String,
    pub kind: CommandKind,
    pub parameters: serde_json::Value,
}

impl Command {
    /// Creates a command with empty parameters.
    pub fn new(table: &str, kind: CommandKind) -> Self {
        Self {
            table: table.to_string(),
            kind,
            parameters: serde_json::Value::Null,
        }
    }

    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }
}

/// Transaction lifecycle state.
///
/// ```text
/// Running -> Committed
///         -> Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionState {
    /// Worker is executing the batch.
    Running,
    /// All commands executed; locks released.
    Committed,
    /// A fatal error occurred; locks released.
    Aborted,
}

impl TransactionState {
    /// Returns true if the transaction has finished.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionState::Committed | TransactionState::Aborted)
    }
}

/// Final result of a submitted transaction, delivered through its
/// [`Submission`](super::manager::Submission) handle.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionOutcome {
    Committed,
    Aborted(TransactionError),
}

impl TransactionOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, TransactionOutcome::Committed)
    }
}
