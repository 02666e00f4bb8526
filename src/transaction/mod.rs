// Transaction Management Module
//
// This module provides transaction management for PetraDB:
//
// - **Strict 2PL**: Two-phase locking over storage blocks; locks are
//   acquired as commands need them and released together at commit/abort.
// - **Bounded worker pool**: Each submitted batch runs on its own OS
//   thread; admission blocks once `max_active_transactions` workers run.
// - **Lifecycle events**: Lock releases and transaction completion are
//   published on an in-process event bus.
//
// # Module Organization
//
// | Module | Responsibility |
// |--------|----------------|
// | [`types`] | Core types: `Command`, `LockMode`, `TransactionState` |
// | [`error`] | Transaction-specific error types |
// | [`lock_table`] | Hashed lock table and acquire/release protocol |
// | [`manager`] | Admission, worker lifecycle, quiescence |
// | [`events`] | Lifecycle event bus |
// | [`statistics`] | Lock and transaction counters |
//
// # Quick Start
//
// ```rust,ignore
// use petra_db::transaction::{Command, CommandKind, TransactionManager};
//
// let manager = TransactionManager::new(config, directory, executor);
// let submission = manager.submit(vec![Command::new("employee", CommandKind::Update)]);
// let outcome = submission.wait();
// manager.await_quiescence();
// ```
//
// # Architecture
//
// ```text
// ┌───────────────────────────────────────────────────────┐
// │                  TransactionManager                   │
// │  ┌───────────┐  ┌────────────┐  ┌─────────────────┐   │
// │  │ LockTable │  │  EventBus  │  │  Worker threads │   │
// │  └───────────┘  └────────────┘  └─────────────────┘   │
// └───────────────────────────────────────────────────────┘
//        │ BlockDirectory        │ CommandExecutor
//        ▼                       ▼
//   storage blocks          table engine
// ```

// Core types and errors
pub mod error;
pub mod types;

// Locking and lifecycle
pub mod events;
pub mod lock_table;
pub mod manager;

// Monitoring
pub mod statistics;

// Core types
pub use types::{Command, CommandKind, LockMode, TransactionOutcome, TransactionState};

// Error types
pub use error::{TransactionError, TransactionResult};

// Lock table
pub use lock_table::LockTable;

// Transaction manager
pub use manager::{Submission, TransactionManager};

// Events
pub use events::{EventBus, EventKind, TransactionEvent};

// Statistics
pub use statistics::{
    LockStatistics, LockStatisticsSummary, TransactionStatistics, TransactionStatisticsSummary,
};

// Re-export shared identifiers for convenience
pub use crate::common::{BlockAddress, TransactionId};
