// Change notifications emitted by the route store

use tokio::sync::broadcast;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Saved { id: String },
    Updated { id: String },
    Deleted { id: String },
    Cleared { removed: usize },
}

/// A registered listener. Dropping it (or passing it to
/// `RouteStore::unsubscribe`) deregisters the listener.
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<StoreEvent>,
}

impl Subscription {
    pub(crate) fn new(rx: broadcast::Receiver<StoreEvent>) -> Self {
        Self { rx }
    }

    /// Next event, or `None` once the store is gone. Events missed by a slow
    /// listener are skipped.
    pub async fn recv(&mut self) -> Option<StoreEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed = missed, "store subscriber lagged; skipping events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Pending event without waiting
    pub fn try_recv(&mut self) -> Option<StoreEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}
