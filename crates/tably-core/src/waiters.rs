//! Fast-path waiter registry.
//!
//! The authorization ingress registers a waiter keyed on the request id
//! before its transaction commits; a worker running in the same process
//! signals the waiter when it records a terminal outcome, turning the
//! synchronous response into a fast path. Cross-process completion is always
//! observable through the status endpoint, so signaling is best-effort.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use uuid::Uuid;

/// Concurrent map of request id → pending waiter senders. The only global
/// mutable state in the ingress besides connection pools; entries are scoped
/// to one `Authorize` call and removed on signal or drop.
pub struct WaiterRegistry<T> {
    waiters: Mutex<HashMap<Uuid, Vec<oneshot::Sender<T>>>>,
}

impl<T> Default for WaiterRegistry<T> {
    fn default() -> Self {
        Self {
            waiters: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Clone> WaiterRegistry<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a waiter for `id`. The returned guard unregisters itself when
    /// dropped, so a timed-out ingress call leaves nothing behind.
    pub fn register(self: &Arc<Self>, id: Uuid) -> Waiter<T> {
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().unwrap().entry(id).or_default().push(tx);
        Waiter {
            id,
            rx,
            registry: Arc::clone(self),
        }
    }

    /// Signal every waiter currently registered for `id`. Returns how many
    /// waiters were notified (zero when the ingress lives in another process).
    pub fn notify(&self, id: Uuid, value: T) -> usize {
        let senders = self
            .waiters
            .lock()
            .unwrap()
            .remove(&id)
            .unwrap_or_default();
        let mut notified = 0;
        for tx in senders {
            if tx.send(value.clone()).is_ok() {
                notified += 1;
            }
        }
        notified
    }
}

impl<T> WaiterRegistry<T> {
    fn unregister(&self, id: Uuid) {
        let mut waiters = self.waiters.lock().unwrap();
        if let Some(senders) = waiters.get_mut(&id) {
            senders.retain(|tx| !tx.is_closed());
            if senders.is_empty() {
                waiters.remove(&id);
            }
        }
    }
}

/// One registered waiter. Await [`Waiter::wait`] to receive the terminal
/// snapshot, or drop to unregister.
pub struct Waiter<T> {
    id: Uuid,
    rx: oneshot::Receiver<T>,
    registry: Arc<WaiterRegistry<T>>,
}

impl<T: Clone> Waiter<T> {
    /// Wait for a signal. Returns `None` if the registry side was dropped.
    pub async fn wait(&mut self) -> Option<T> {
        (&mut self.rx).await.ok()
    }
}

impl<T> Drop for Waiter<T> {
    fn drop(&mut self) {
        self.rx.close();
        self.registry.unregister(self.id);
    }
}
