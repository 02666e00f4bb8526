// Transaction lifecycle event bus.
//
// Decouples lock-release and transaction-end signalling from manager
// internals. Observers register a callback keyed by event kind;
// publication is synchronous on the publisher's thread, so handlers must
// be short and non-blocking - their job is to flip flags, push into
// queues, or wake condition variables.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::common::TransactionId;

/// Discriminant used to key subscriber registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    LockReleased,
    TransactionFinished,
    AllTransactionsFinished,
}

/// A lifecycle event published by the transaction core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionEvent {
    /// A transaction released every lock it held.
    LockReleased { txn_id: TransactionId },
    /// A transaction reached a terminal state (committed or aborted).
    TransactionFinished { txn_id: TransactionId },
    /// The active transaction count dropped to zero.
    AllTransactionsFinished,
}

impl TransactionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            TransactionEvent::LockReleased { .. } => EventKind::LockReleased,
            TransactionEvent::TransactionFinished { .. } => EventKind::TransactionFinished,
            TransactionEvent::AllTransactionsFinished => EventKind::AllTransactionsFinished,
        }
    }
}

type Subscriber = Box<dyn Fn(&TransactionEvent) + Send + Sync>;

/// Publish/subscribe registry for transaction lifecycle events.
///
/// # Thread Safety
///
/// Subscription and publication may happen from any thread. Callbacks run
/// on the publishing worker's thread while a read lock on the registry is
/// held; subscribing from inside a callback would deadlock and is not
/// supported.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<HashMap<EventKind, Vec<Subscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Registers `callback` for every future event of `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, callback: F)
    where
        F: Fn(&TransactionEvent) + Send + Sync + 'static,
    {
        self.subscribers
            .write()
            .entry(kind)
            .or_default()
            .push(Box::new(callback));
    }

    /// Delivers `event` to every subscriber of its kind, synchronously.
    pub fn publish(&self, event: &TransactionEvent) {
        let subscribers = self.subscribers.read();
        if let Some(callbacks) = subscribers.get(&event.kind()) {
            for callback in callbacks {
                callback(event);
            }
        }
    }

    /// Number of registered subscribers across all kinds.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().values().map(Vec::len).sum()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
