//! Best-effort fan-out of processing events to attached observers.

use crate::model::ProcessingEvent;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use tracing::debug;

/// Handle identifying one attached observer.
pub type ObserverId = u64;

/// Explicit observer registry with best-effort delivery.
///
/// Every published event is sent to every currently attached observer; a
/// closed receiver never blocks or fails the publisher and is pruned on
/// the next publish. Events are not persisted or replayed: an observer
/// attaching mid-run only sees subsequent events and must poll video
/// status separately to reconstruct state.
pub struct ProgressBroadcaster {
    observers: RwLock<HashMap<ObserverId, mpsc::UnboundedSender<ProcessingEvent>>>,
    next_id: AtomicU64,
}

impl ProgressBroadcaster {
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Attach an observer; the returned receiver yields every event
    /// published from now on.
    pub async fn subscribe(&self) -> (ObserverId, mpsc::UnboundedReceiver<ProcessingEvent>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.write().await.insert(id, tx);
        debug!("observer {} attached", id);
        (id, rx)
    }

    /// Detach an observer explicitly. Dropping the receiver has the same
    /// effect on the next publish.
    pub async fn unsubscribe(&self, id: ObserverId) {
        if self.observers.write().await.remove(&id).is_some() {
            debug!("observer {} detached", id);
        }
    }

    /// Deliver an event to all attached observers, pruning any whose
    /// channel has closed.
    pub async fn publish(&self, event: ProcessingEvent) {
        let mut closed: Vec<ObserverId> = Vec::new();
        {
            let observers = self.observers.read().await;
            for (id, tx) in observers.iter() {
                if tx.send(event.clone()).is_err() {
                    closed.push(*id);
                }
            }
        }

        if !closed.is_empty() {
            let mut observers = self.observers.write().await;
            for id in &closed {
                observers.remove(id);
            }
            debug!("pruned {} disconnected observers", closed.len());
        }
    }

    pub async fn observer_count(&self) -> usize {
        self.observers.read().await.len()
    }
}

impl Default for ProgressBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
