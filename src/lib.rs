// PetraDB - Lightweight relational database engine
// Core library module

use std::time::Duration;

pub mod catalog;
pub mod common;
pub mod error;
pub mod execution;
pub mod optimizer;
pub mod storage;
pub mod transaction;

pub use error::{DbError, Result};

/// Engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Fixed size of the lock table's bucket array.
    pub number_of_hash_buckets: usize,
    /// Upper bound on concurrently running transaction workers.
    pub max_active_transactions: usize,
    /// Optional wait bound for lock acquisition; `None` waits forever.
    pub lock_wait_timeout: Option<Duration>,
    /// Separator between attribute names in linearized expressions.
    pub attribute_delimiter: char,
    /// Delimiter marking attribute names inside condition strings.
    pub attribute_escape: char,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            number_of_hash_buckets: 1024,
            max_active_transactions: 10,
            lock_wait_timeout: None,
            attribute_delimiter: ';',
            attribute_escape: '`',
        }
    }
}
