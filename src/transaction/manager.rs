// Transaction manager for coordinating transaction lifecycle.
//
// Admits submitted command batches, runs each one in its own worker
// thread from a bounded pool, and signals lifecycle events. Workers
// follow strict two-phase locking: every lock the batch needs is
// acquired before the executor runs, and the union of everything
// acquired is released in a single phase on commit or abort.
//
// # Example
//
// ```rust,ignore
// let manager = TransactionManager::new(Config::default(), directory, executor);
// let submission = manager.submit(vec![Command::new("employee", CommandKind::Select)]);
// assert!(submission.wait().is_committed());
// manager.await_quiescence();
// ```

use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::common::{BlockAddress, TransactionId};
use crate::execution::CommandExecutor;
use crate::storage::BlockDirectory;
use crate::Config;

use super::error::{TransactionError, TransactionResult};
use super::events::{EventBus, TransactionEvent};
use super::lock_table::LockTable;
use super::statistics::TransactionStatistics;
use super::types::{Command, TransactionOutcome, TransactionState};

/// Pool bookkeeping guarded by the manager's mutex.
#[derive(Debug)]
struct PoolState {
    active: usize,
    next_txn_id: TransactionId,
}

/// Everything workers share with the manager.
struct ManagerShared {
    config: Config,
    lock_table: Arc<LockTable>,
    events: Arc<EventBus>,
    blocks: Arc<dyn BlockDirectory>,
    executor: Arc<dyn CommandExecutor>,
    pool: Mutex<PoolState>,
    /// Wakes blocked submitters and quiescence waiters.
    pool_changed: Condvar,
    stats: TransactionStatistics,
}

/// Handle to a submitted transaction.
///
/// Resolves to the transaction's outcome once its worker reaches a
/// terminal state.
pub struct Submission {
    txn_id: TransactionId,
    state: Arc<SubmissionState>,
}

struct SubmissionState {
    outcome: Mutex<Option<TransactionOutcome>>,
    done: Condvar,
}

impl Submission {
    fn new(txn_id: TransactionId) -> Self {
        Self {
            txn_id,
            state: Arc::new(SubmissionState {
                outcome: Mutex::new(None),
                done: Condvar::new(),
            }),
        }
    }

    /// The transaction this handle tracks.
    pub fn txn_id(&self) -> TransactionId {
        self.txn_id
    }

    /// Blocks until the transaction finishes and returns its outcome.
    pub fn wait(&self) -> TransactionOutcome {
        let mut outcome = self.state.outcome.lock();
        loop {
            if let Some(settled) = outcome.as_ref() {
                return settled.clone();
            }
            self.state.done.wait(&mut outcome);
        }
    }

    /// Returns the outcome if the transaction already finished.
    pub fn try_outcome(&self) -> Option<TransactionOutcome> {
        self.state.outcome.lock().clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TransactionState {
        match self.try_outcome() {
            None => TransactionState::Running,
            Some(TransactionOutcome::Committed) => TransactionState::Committed,
            Some(TransactionOutcome::Aborted(_)) => TransactionState::Aborted,
        }
    }
}

impl std::fmt::Debug for Submission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Submission")
            .field("txn_id", &self.txn_id)
            .field("state", &self.state())
            .finish()
    }
}

/// Transaction manager bounding a pool of concurrent worker threads.
///
/// # Thread Safety
///
/// The manager is cheap to share; all methods take `&self`.
pub struct TransactionManager {
    shared: Arc<ManagerShared>,
}

impl TransactionManager {
    /// Creates a manager over the given collaborators.
    pub fn new(
        config: Config,
        blocks: Arc<dyn BlockDirectory>,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        let lock_table = Arc::new(LockTable::with_config(&config));
        Self {
            shared: Arc::new(ManagerShared {
                config,
                lock_table,
                events: Arc::new(EventBus::new()),
                blocks,
                executor,
                pool: Mutex::new(PoolState {
                    active: 0,
                    next_txn_id: 1,
                }),
                pool_changed: Condvar::new(),
                stats: TransactionStatistics::new(),
            }),
        }
    }

    /// Submits a command batch, blocking while the pool is full.
    ///
    /// Returns as soon as a worker slot is claimed; the batch runs
    /// concurrently with the caller.
    pub fn submit(&self, batch: Vec<Command>) -> Submission {
        let txn_id = {
            let mut pool = self.shared.pool.lock();
            while pool.active >= self.shared.config.max_active_transactions {
                self.shared.pool_changed.wait(&mut pool);
            }
            pool.active += 1;
            let id = pool.next_txn_id;
            pool.next_txn_id += 1;
            id
        };
        self.spawn_worker(txn_id, batch)
    }

    /// Submits a command batch without blocking.
    ///
    /// # Errors
    ///
    /// Returns `TransactionError::PoolSaturated` if every worker slot is
    /// taken.
    pub fn try_submit(&self, batch: Vec<Command>) -> TransactionResult<Submission> {
        let txn_id = {
            let mut pool = self.shared.pool.lock();
            if pool.active >= self.shared.config.max_active_transactions {
                return Err(TransactionError::PoolSaturated);
            }
            pool.active += 1;
            let id = pool.next_txn_id;
            pool.next_txn_id += 1;
            id
        };
        Ok(self.spawn_worker(txn_id, batch))
    }

    fn spawn_worker(&self, txn_id: TransactionId, batch: Vec<Command>) -> Submission {
        self.shared.stats.record_submit();
        let submission = Submission::new(txn_id);
        let shared = Arc::clone(&self.shared);
        let state = Arc::clone(&submission.state);
        thread::spawn(move || run_worker(&shared, txn_id, &batch, &state));
        submission
    }

    /// Blocks until every in-flight transaction has finished.
    pub fn await_quiescence(&self) {
        let mut pool = self.shared.pool.lock();
        while pool.active > 0 {
            self.shared.pool_changed.wait(&mut pool);
        }
    }

    /// Number of currently running workers.
    pub fn active_count(&self) -> usize {
        self.shared.pool.lock().active
    }

    /// The lifecycle event bus.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.shared.events
    }

    /// The lock table coordinating this manager's workers.
    pub fn lock_table(&self) -> &Arc<LockTable> {
        &self.shared.lock_table
    }

    /// Manager statistics.
    pub fn statistics(&self) -> &TransactionStatistics {
        &self.shared.stats
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("active_count", &self.active_count())
            .finish()
    }
}

/// Runs one transaction to completion on its worker thread.
fn run_worker(
    shared: &ManagerShared,
    txn_id: TransactionId,
    batch: &[Command],
    state: &SubmissionState,
) {
    debug!(txn_id, commands = batch.len(), "transaction started");
    let (held, result) = execute_batch(shared, txn_id, batch);

    // strict 2PL: one release phase covering the union of everything
    // acquired, on commit and abort alike
    shared.lock_table.release_all(txn_id, &held);
    shared
        .events
        .publish(&TransactionEvent::LockReleased { txn_id });

    let outcome = match result {
        Ok(()) => {
            shared.stats.record_commit();
            debug!(txn_id, "transaction committed");
            TransactionOutcome::Committed
        }
        Err(err) => {
            shared.stats.record_abort();
            warn!(txn_id, %err, "transaction aborted");
            TransactionOutcome::Aborted(err)
        }
    };

    {
        let mut settled = state.outcome.lock();
        *settled = Some(outcome);
    }
    state.done.notify_all();

    {
        let mut pool = shared.pool.lock();
        pool.active -= 1;
        // published under the pool lock: a woken submitter or quiescence
        // waiter must not observe the freed slot before these events
        shared
            .events
            .publish(&TransactionEvent::TransactionFinished { txn_id });
        if pool.active == 0 {
            shared.events.publish(&TransactionEvent::AllTransactionsFinished);
        }
    }
    shared.pool_changed.notify_all();
}

/// Acquires every lock the batch needs, then runs the executor once.
///
/// Returns the union of acquired addresses alongside the result, so the
/// caller can release exactly what is held even after a mid-batch
/// failure.
fn execute_batch(
    shared: &ManagerShared,
    txn_id: TransactionId,
    batch: &[Command],
) -> (Vec<BlockAddress>, TransactionResult<()>) {
    let mut held: Vec<BlockAddress> = Vec::new();

    for command in batch {
        let addresses = match shared.blocks.block_addresses(&command.table) {
            Ok(addresses) if !addresses.is_empty() => addresses,
            // unknown table or an empty enumeration: nothing to lock,
            // nothing to execute against
            _ => return (held, Err(TransactionError::missing_blocks(&command.table))),
        };

        let mode = command.kind.lock_mode();
        for address in addresses {
            if let Err(err) = shared.lock_table.acquire(txn_id, address, mode) {
                return (held, Err(err));
            }
            if !held.contains(&address) {
                held.push(address);
            }
        }
    }

    let result = shared
        .executor
        .execute(batch)
        .map_err(|e| TransactionError::ExecutorFailure(e.to_string()));
    (held, result)
}
