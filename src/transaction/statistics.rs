// Transaction statistics and monitoring.
//
// This module provides statistics collection for the lock table and the
// transaction manager, enabling performance monitoring and test
// assertions about protocol behavior.
//
// # Example
//
// ```rust,ignore
// let stats = LockStatistics::new();
// stats.record_grant();
// let summary = stats.get_summary();
// assert_eq!(summary.locks_granted, 1);
// ```

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Lock table statistics collector.
///
/// Thread-safe; counters are bumped outside the lock table's own mutex so
/// a slow reader never extends the critical section.
#[derive(Debug, Default)]
pub struct LockStatistics {
    /// Requests granted (immediately or after waiting).
    locks_granted: Mutex<u64>,
    /// Requests that had to wait at least once.
    lock_waits: Mutex<u64>,
    /// Requests that gave up after the configured wait bound.
    lock_timeouts: Mutex<u64>,
    /// Shared grants upgraded to exclusive in place.
    lock_upgrades: Mutex<u64>,
}

/// Point-in-time snapshot of [`LockStatistics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockStatisticsSummary {
    pub locks_granted: u64,
    pub lock_waits: u64,
    pub lock_timeouts: u64,
    pub lock_upgrades: u64,
}

impl LockStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_grant(&self) {
        *self.locks_granted.lock() += 1;
    }

    pub fn record_wait(&self) {
        *self.lock_waits.lock() += 1;
    }

    pub fn record_timeout(&self) {
        *self.lock_timeouts.lock() += 1;
    }

    pub fn record_upgrade(&self) {
        *self.lock_upgrades.lock() += 1;
    }

    /// Gets a snapshot of all counters.
    pub fn get_summary(&self) -> LockStatisticsSummary {
        LockStatisticsSummary {
            locks_granted: *self.locks_granted.lock(),
            lock_waits: *self.lock_waits.lock(),
            lock_timeouts: *self.lock_timeouts.lock(),
            lock_upgrades: *self.lock_upgrades.lock(),
        }
    }

    /// Resets all counters to zero.
    pub fn reset(&self) {
        *self.locks_granted.lock() = 0;
        *self.lock_waits.lock() = 0;
        *self.lock_timeouts.lock() = 0;
        *self.lock_upgrades.lock() = 0;
    }
}

/// Transaction manager statistics collector.
#[derive(Debug, Default)]
pub struct TransactionStatistics {
    /// Batches admitted into the pool.
    total_submitted: Mutex<u64>,
    /// Successfully committed transactions.
    total_commits: Mutex<u64>,
    /// Aborted transactions.
    total_aborts: Mutex<u64>,
}

/// Point-in-time snapshot of [`TransactionStatistics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionStatisticsSummary {
    pub total_submitted: u64,
    pub total_commits: u64,
    pub total_aborts: u64,
}

impl TransactionStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submit(&self) {
        *self.total_submitted.lock() += 1;
    }

    pub fn record_commit(&self) {
        *self.total_commits.lock() += 1;
    }

    pub fn record_abort(&self) {
        *self.total_aborts.lock() += 1;
    }

    /// Gets a snapshot of all counters.
    pub fn get_summary(&self) -> TransactionStatisticsSummary {
        TransactionStatisticsSummary {
            total_submitted: *self.total_submitted.lock(),
            total_commits: *self.total_commits.lock(),
            total_aborts: *self.total_aborts.lock(),
        }
    }

    /// Resets all counters to zero.
    pub fn reset(&self) {
        *self.total_submitted.lock() = 0;
        *self.total_commits.lock() = 0;
        *self.total_aborts.lock() = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_statistics_counters() {
        let stats = LockStatistics::new();
        stats.record_grant();
        stats.record_grant();
        stats.record_wait();
        stats.record_timeout();

        let summary = stats.get_summary();
        assert_eq!(summary.locks_granted, 2);
        assert_eq!(summary.lock_waits, 1);
        assert_eq!(summary.lock_timeouts, 1);
        assert_eq!(summary.lock_upgrades, 0);
    }

    #[test]
    fn test_reset() {
        let stats = LockStatistics::new();
        stats.record_grant();
        stats.reset();
        assert_eq!(stats.get_summary().locks_granted, 0);
    }

    #[test]
    fn test_transaction_statistics_counters() {
        let stats = TransactionStatistics::new();
        stats.record_submit();
        stats.record_submit();
        stats.record_commit();
        stats.record_abort();

        let summary = stats.get_summary();
        assert_eq!(summary.total_submitted, 2);
        assert_eq!(summary.total_commits, 1);
        assert_eq!(summary.total_aborts, 1);
    }
}
