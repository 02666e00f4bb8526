// Hashed lock table for block-granular two-phase locking.
//
// Maps block addresses to per-resource lock queues:
//
// - **Buckets**: a fixed-size array indexed by `address mod N`. Each
//   bucket holds a circular list of `ResourceEntry` nodes colliding on
//   the hash.
// - **ResourceEntry**: the lock-queue container for one block address.
//   Owns a FIFO circular queue of `LockRequest`s and caches the mode of
//   the current head grant.
// - **LockRequest**: one (transaction, mode, granted?) record waiting on
//   or holding a resource.
//
// Both circular lists are intrusive: nodes live in index-addressed
// arenas, `next`/`prev` are indices rather than owning references, and a
// freed slot is recycled through a free list. This keeps O(1) tail
// insertion and O(1) unlink without cyclic ownership.
//
// # Locking discipline
//
// One mutex guards the buckets, both arenas, and every queue. One
// condition variable is broadcast on every release; all waiters re-check
// their grant predicate on wake.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, trace};

use crate::common::{BlockAddress, TransactionId};
use crate::Config;

use super::error::{TransactionError, TransactionResult};
use super::statistics::LockStatistics;
use super::types::LockMode;

/// Sentinel index for "no node".
const NIL: usize = usize::MAX;

/// One waiter or holder record inside a resource queue.
#[derive(Debug)]
struct LockRequest {
    txn_id: TransactionId,
    mode: LockMode,
    granted: bool,
    /// Ring links within the owning entry's queue.
    next: usize,
    prev: usize,
}

/// Lock-queue container for one live block address.
///
/// Exists exactly while its queue is non-empty; removal is atomic with
/// the dequeue of the last request.
#[derive(Debug)]
struct ResourceEntry {
    address: BlockAddress,
    /// Mode of the most recent head grant.
    granted_mode: LockMode,
    /// Oldest request in the circular queue.
    queue_head: usize,
    /// Ring links within the owning bucket.
    next: usize,
    prev: usize,
}

/// Index-addressed node store with slot recycling.
#[derive(Debug, Default)]
struct Arena<T> {
    slots: Vec<Option<T>>,
    free_list: Vec<usize>,
}

impl<T> Arena<T> {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
        }
    }

    fn alloc(&mut self, node: T) -> usize {
        match self.free_list.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        }
    }

    fn release(&mut self, idx: usize) {
        self.slots[idx] = None;
        self.free_list.push(idx);
    }

    fn get(&self, idx: usize) -> &T {
        self.slots[idx].as_ref().expect("vacant arena slot")
    }

    fn get_mut(&mut self, idx: usize) -> &mut T {
        self.slots[idx].as_mut().expect("vacant arena slot")
    }

    fn live_count(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }
}

/// Everything the table mutex protects.
#[derive(Debug)]
struct LockTableInner {
    /// Head entry index per bucket; `NIL` when the bucket is empty.
    buckets: Vec<usize>,
    entries: Arena<ResourceEntry>,
    requests: Arena<LockRequest>,
}

impl LockTableInner {
    fn bucket_index(&self, address: BlockAddress) -> usize {
        (address % self.buckets.len() as u64) as usize
    }

    /// Walks the bucket ring once, returning the entry for `address`.
    fn lookup(&self, address: BlockAddress) -> Option<usize> {
        let head = self.buckets[self.bucket_index(address)];
        if head == NIL {
            return None;
        }
        let mut idx = head;
        loop {
            if self.entries.get(idx).address == address {
                return Some(idx);
            }
            idx = self.entries.get(idx).next;
            if idx == head {
                return None;
            }
        }
    }

    /// Finds or appends the entry for `address` in its bucket ring.
    fn get_or_create(&mut self, address: BlockAddress) -> usize {
        if let Some(idx) = self.lookup(address) {
            return idx;
        }
        let bucket = self.bucket_index(address);
        let idx = self.entries.alloc(ResourceEntry {
            address,
            granted_mode: LockMode::Shared,
            queue_head: NIL,
            next: NIL,
            prev: NIL,
        });
        let head = self.buckets[bucket];
        if head == NIL {
            // first entry becomes a single-element ring
            let entry = self.entries.get_mut(idx);
            entry.next = idx;
            entry.prev = idx;
            self.buckets[bucket] = idx;
        } else {
            let tail = self.entries.get(head).prev;
            {
                let entry = self.entries.get_mut(idx);
                entry.next = head;
                entry.prev = tail;
            }
            self.entries.get_mut(tail).next = idx;
            self.entries.get_mut(head).prev = idx;
        }
        idx
    }

    /// Unlinks an entry from its bucket ring and frees its slot.
    ///
    /// The caller must have drained the entry's queue first.
    fn remove_entry(&mut self, idx: usize) {
        let (address, next, prev) = {
            let entry = self.entries.get(idx);
            (entry.address, entry.next, entry.prev)
        };
        let bucket = self.bucket_index(address);
        if next == idx {
            self.buckets[bucket] = NIL;
        } else {
            self.entries.get_mut(prev).next = next;
            self.entries.get_mut(next).prev = prev;
            if self.buckets[bucket] == idx {
                self.buckets[bucket] = next;
            }
        }
        self.entries.release(idx);
    }

    /// Appends a request at the queue tail (`head.prev`).
    fn enqueue_request(
        &mut self,
        entry_idx: usize,
        txn_id: TransactionId,
        mode: LockMode,
    ) -> usize {
        let idx = self.requests.alloc(LockRequest {
            txn_id,
            mode,
            granted: false,
            next: NIL,
            prev: NIL,
        });
        let head = self.entries.get(entry_idx).queue_head;
        if head == NIL {
            let request = self.requests.get_mut(idx);
            request.next = idx;
            request.prev = idx;
            self.entries.get_mut(entry_idx).queue_head = idx;
        } else {
            let tail = self.requests.get(head).prev;
            {
                let request = self.requests.get_mut(idx);
                request.next = head;
                request.prev = tail;
            }
            self.requests.get_mut(tail).next = idx;
            self.requests.get_mut(head).prev = idx;
        }
        idx
    }

    /// Unlinks a request in place, advancing the queue head if needed.
    fn unlink_request(&mut self, entry_idx: usize, req_idx: usize) {
        let (next, prev) = {
            let request = self.requests.get(req_idx);
            (request.next, request.prev)
        };
        if next == req_idx {
            self.entries.get_mut(entry_idx).queue_head = NIL;
        } else {
            self.requests.get_mut(prev).next = next;
            self.requests.get_mut(next).prev = prev;
            if self.entries.get(entry_idx).queue_head == req_idx {
                self.entries.get_mut(entry_idx).queue_head = next;
            }
        }
        self.requests.release(req_idx);
    }

    /// Finds the request of `txn_id` in an entry's queue, if any.
    fn find_request(&self, entry_idx: usize, txn_id: TransactionId) -> Option<usize> {
        let head = self.entries.get(entry_idx).queue_head;
        if head == NIL {
            return None;
        }
        let mut idx = head;
        loop {
            if self.requests.get(idx).txn_id == txn_id {
                return Some(idx);
            }
            idx = self.requests.get(idx).next;
            if idx == head {
                return None;
            }
        }
    }

    /// True if any exclusive request sits between the head and `req_idx`.
    fn exclusive_ahead(&self, entry_idx: usize, req_idx: usize) -> bool {
        let mut idx = self.entries.get(entry_idx).queue_head;
        while idx != req_idx {
            if self.requests.get(idx).mode == LockMode::Exclusive {
                return true;
            }
            idx = self.requests.get(idx).next;
        }
        false
    }

    /// True if any transaction other than `txn_id` holds a grant on the entry.
    fn other_grants(&self, entry_idx: usize, txn_id: TransactionId) -> bool {
        let head = self.entries.get(entry_idx).queue_head;
        let mut idx = head;
        loop {
            let request = self.requests.get(idx);
            if request.granted && request.txn_id != txn_id {
                return true;
            }
            idx = request.next;
            if idx == head {
                return false;
            }
        }
    }

    /// The grant predicate, in executable form.
    ///
    /// A request is granted iff it is the queue head (the oldest request
    /// always runs), or it is shared, the head grant is shared and no
    /// exclusive request is queued ahead of it (the fairness clause that
    /// keeps writers from starving), or the head is an exclusive grant
    /// held by the same transaction.
    fn evaluate(&mut self, entry_idx: usize, req_idx: usize) -> bool {
        let head_idx = self.entries.get(entry_idx).queue_head;
        if head_idx == req_idx {
            let mode = self.requests.get(req_idx).mode;
            self.requests.get_mut(req_idx).granted = true;
            self.entries.get_mut(entry_idx).granted_mode = mode;
            return true;
        }
        let (head_granted, head_mode, head_txn) = {
            let head = self.requests.get(head_idx);
            (head.granted, head.mode, head.txn_id)
        };
        let (req_mode, req_txn) = {
            let request = self.requests.get(req_idx);
            (request.mode, request.txn_id)
        };
        if head_granted
            && head_mode == LockMode::Shared
            && req_mode == LockMode::Shared
            && !self.exclusive_ahead(entry_idx, req_idx)
        {
            self.requests.get_mut(req_idx).granted = true;
            return true;
        }
        if head_granted && head_mode == LockMode::Exclusive && head_txn == req_txn {
            self.requests.get_mut(req_idx).granted = true;
            return true;
        }
        false
    }

    /// Re-caches the dominant mode after the head of a queue changed.
    fn refresh_head_grant(&mut self, entry_idx: usize) {
        let head = self.entries.get(entry_idx).queue_head;
        if head != NIL && self.requests.get(head).granted {
            let mode = self.requests.get(head).mode;
            self.entries.get_mut(entry_idx).granted_mode = mode;
        }
    }
}

/// Block-granular lock table implementing strict two-phase locking.
///
/// `acquire` never fails intrinsically; it blocks until the grant
/// predicate holds, or until the configured wait bound elapses, in which
/// case the caller is expected to abort its transaction and release
/// every lock it already holds via [`release_all`](Self::release_all).
///
/// # Thread Safety
///
/// All operations are thread-safe; see the module header for the
/// locking discipline.
pub struct LockTable {
    inner: Mutex<LockTableInner>,
    /// Broadcast on every release; waiters re-check their predicate.
    waiters: Condvar,
    wait_timeout: Option<Duration>,
    stats: LockStatistics,
}

impl LockTable {
    /// Creates a lock table with `number_of_hash_buckets` buckets.
    ///
    /// # Panics
    ///
    /// Panics if `number_of_hash_buckets` is 0.
    pub fn new(number_of_hash_buckets: usize, wait_timeout: Option<Duration>) -> Self {
        assert!(
            number_of_hash_buckets > 0,
            "LockTable needs at least one bucket"
        );
        Self {
            inner: Mutex::new(LockTableInner {
                buckets: vec![NIL; number_of_hash_buckets],
                entries: Arena::new(),
                requests: Arena::new(),
            }),
            waiters: Condvar::new(),
            wait_timeout,
            stats: LockStatistics::new(),
        }
    }

    /// Creates a lock table from the engine configuration.
    pub fn with_config(config: &Config) -> Self {
        Self::new(config.number_of_hash_buckets, config.lock_wait_timeout)
    }

    /// Acquires `mode` on `address` for `txn_id`, blocking as needed.
    ///
    /// Re-requests by a transaction already holding the address are
    /// idempotent; re-requesting exclusive over a held shared grant
    /// upgrades in place once no other transaction holds a grant.
    ///
    /// # Errors
    ///
    /// Returns `TransactionError::LockTimeout` if a wait bound is
    /// configured and elapses before the grant predicate holds.
    pub fn acquire(
        &self,
        txn_id: TransactionId,
        address: BlockAddress,
        mode: LockMode,
    ) -> TransactionResult<()> {
        let mut inner = self.inner.lock();

        // A transaction holds at most one request per address; re-requests
        // resolve against the existing one.
        if let Some(entry_idx) = inner.lookup(address) {
            if let Some(req_idx) = inner.find_request(entry_idx, txn_id) {
                let (held_granted, held_mode) = {
                    let request = inner.requests.get(req_idx);
                    (request.granted, request.mode)
                };
                if held_granted {
                    if mode.strength() <= held_mode.strength() {
                        trace!(txn_id, address, %mode, "lock re-request satisfied by existing grant");
                        return Ok(());
                    }
                    return self.upgrade(inner, entry_idx, req_idx, txn_id, address);
                }
                // An ungranted request can only belong to a worker blocked
                // on it, so this thread cannot observe one of its own.
                return self.block_until_granted(inner, entry_idx, req_idx, txn_id, address, mode);
            }
        }

        let entry_idx = inner.get_or_create(address);
        let req_idx = inner.enqueue_request(entry_idx, txn_id, mode);
        if inner.evaluate(entry_idx, req_idx) {
            self.stats.record_grant();
            trace!(txn_id, address, %mode, "lock granted");
            return Ok(());
        }
        self.stats.record_wait();
        debug!(txn_id, address, %mode, "lock request queued");
        self.block_until_granted(inner, entry_idx, req_idx, txn_id, address, mode)
    }

    /// Releases every request `txn_id` holds on `addresses`, in one phase.
    ///
    /// Emptied entries are removed from their bucket; all waiters are
    /// woken to re-check their grant predicate.
    pub fn release_all(&self, txn_id: TransactionId, addresses: &[BlockAddress]) {
        let mut inner = self.inner.lock();
        for &address in addresses {
            if let Some(entry_idx) = inner.lookup(address) {
                // a transaction holds at most one request per address;
                // the loop also clears any duplicate that slipped in
                while let Some(req_idx) = inner.find_request(entry_idx, txn_id) {
                    inner.unlink_request(entry_idx, req_idx);
                }
                if inner.entries.get(entry_idx).queue_head == NIL {
                    inner.remove_entry(entry_idx);
                } else {
                    inner.refresh_head_grant(entry_idx);
                }
            }
        }
        drop(inner);
        self.waiters.notify_all();
        trace!(txn_id, count = addresses.len(), "locks released");
    }

    /// Blocks until the existing request is granted or the wait bound
    /// elapses. On timeout the request is unlinked, and its entry removed
    /// if that emptied the queue.
    fn block_until_granted(
        &self,
        mut inner: MutexGuard<'_, LockTableInner>,
        entry_idx: usize,
        req_idx: usize,
        txn_id: TransactionId,
        address: BlockAddress,
        mode: LockMode,
    ) -> TransactionResult<()> {
        let deadline = self.wait_timeout.map(|t| Instant::now() + t);
        loop {
            match deadline {
                Some(deadline) => {
                    if self.waiters.wait_until(&mut inner, deadline).timed_out() {
                        // one last look before giving up
                        if inner.evaluate(entry_idx, req_idx) {
                            self.stats.record_grant();
                            return Ok(());
                        }
                        inner.unlink_request(entry_idx, req_idx);
                        if inner.entries.get(entry_idx).queue_head == NIL {
                            inner.remove_entry(entry_idx);
                        }
                        self.stats.record_timeout();
                        debug!(txn_id, address, %mode, "lock wait timed out");
                        return Err(TransactionError::lock_timeout(txn_id, address, mode));
                    }
                }
                None => self.waiters.wait(&mut inner),
            }
            if inner.evaluate(entry_idx, req_idx) {
                self.stats.record_grant();
                debug!(txn_id, address, %mode, "lock granted after wait");
                return Ok(());
            }
        }
    }

    /// Upgrades a held shared grant to exclusive, waiting until no other
    /// transaction holds a grant on the entry. The held mode is left
    /// untouched until the upgrade succeeds, so a timed-out upgrade still
    /// releases cleanly as shared.
    fn upgrade(
        &self,
        mut inner: MutexGuard<'_, LockTableInner>,
        entry_idx: usize,
        req_idx: usize,
        txn_id: TransactionId,
        address: BlockAddress,
    ) -> TransactionResult<()> {
        let deadline = self.wait_timeout.map(|t| Instant::now() + t);
        loop {
            if !inner.other_grants(entry_idx, txn_id) {
                inner.requests.get_mut(req_idx).mode = LockMode::Exclusive;
                inner.entries.get_mut(entry_idx).granted_mode = LockMode::Exclusive;
                self.stats.record_upgrade();
                debug!(txn_id, address, "shared grant upgraded to exclusive");
                return Ok(());
            }
            match deadline {
                Some(deadline) => {
                    if self.waiters.wait_until(&mut inner, deadline).timed_out() {
                        if !inner.other_grants(entry_idx, txn_id) {
                            inner.requests.get_mut(req_idx).mode = LockMode::Exclusive;
                            inner.entries.get_mut(entry_idx).granted_mode = LockMode::Exclusive;
                            self.stats.record_upgrade();
                            return Ok(());
                        }
                        self.stats.record_timeout();
                        debug!(txn_id, address, "lock upgrade timed out");
                        return Err(TransactionError::lock_timeout(
                            txn_id,
                            address,
                            LockMode::Exclusive,
                        ));
                    }
                }
                None => self.waiters.wait(&mut inner),
            }
        }
    }

    /// True when no resource entry is live (every bucket head is null).
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.live_count() == 0
    }

    /// Number of live resource entries.
    pub fn resource_count(&self) -> usize {
        self.inner.lock().entries.live_count()
    }

    /// The dominant granted mode on `address`, if the resource is live.
    pub fn dominant_mode(&self, address: BlockAddress) -> Option<LockMode> {
        let inner = self.inner.lock();
        inner
            .lookup(address)
            .map(|entry_idx| inner.entries.get(entry_idx).granted_mode)
    }

    /// Transactions currently granted on `address`, in queue order.
    pub fn granted_holders(&self, address: BlockAddress) -> Vec<(TransactionId, LockMode)> {
        let inner = self.inner.lock();
        let mut holders = Vec::new();
        if let Some(entry_idx) = inner.lookup(address) {
            let head = inner.entries.get(entry_idx).queue_head;
            let mut idx = head;
            loop {
                let request = inner.requests.get(idx);
                if request.granted {
                    holders.push((request.txn_id, request.mode));
                }
                idx = request.next;
                if idx == head {
                    break;
                }
            }
        }
        holders
    }

    /// Lock table statistics.
    pub fn statistics(&self) -> &LockStatistics {
        &self.stats
    }
}

impl std::fmt::Debug for LockTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockTable")
            .field("resource_count", &self.resource_count())
            .finish()
    }
}
