//! Fan-out of frame records to connected clients.
//!
//! The daemon is single-threaded (a current-thread runtime with a
//! `LocalSet`), so the hub is a plain `Rc<RefCell>` registry of per-client
//! channels. Publishing snapshots the registry first and mutates it only
//! afterwards, so a send can never observe a half-updated client list.
//!
//! Delivery is best-effort with no backlog: each client holds at most
//! one undelivered record, and a client that reads slower than the frame
//! rate simply misses frames instead of accumulating a stale queue.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

pub type ClientId = u64;

/// Records buffered per client. One slot keeps a stalled reader from
/// retaining anything beyond the latest undelivered record.
const CLIENT_QUEUE_DEPTH: usize = 1;

/// Clone-safe handle to the client registry.
#[derive(Clone, Default)]
pub struct BroadcastHub {
    clients: Rc<RefCell<HashMap<ClientId, mpsc::Sender<String>>>>,
    next_id: Rc<Cell<ClientId>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new client; returns its id and the receiving end the
    /// connection's writer task drains.
    pub fn register(&self) -> (ClientId, mpsc::Receiver<String>) {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let (tx, rx) = mpsc::channel(CLIENT_QUEUE_DEPTH);
        self.clients.borrow_mut().insert(id, tx);
        tracing::info!(client = id, total = self.client_count(), "client connected");
        (id, rx)
    }

    /// Drop a client. Safe to call twice; the second call is a no-op.
    pub fn remove(&self, id: ClientId) {
        if self.clients.borrow_mut().remove(&id).is_some() {
            tracing::info!(client = id, total = self.client_count(), "client disconnected");
        }
    }

    /// Send one serialized record to every client. A client whose slot is
    /// still full misses this record; a client whose channel has closed
    /// is dropped from the registry. Returns the number of clients the
    /// record was delivered to.
    pub fn publish(&self, payload: &str) -> usize {
        let snapshot: Vec<(ClientId, mpsc::Sender<String>)> = self
            .clients
            .borrow()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut failed = Vec::new();
        let mut delivered = 0;
        for (id, tx) in snapshot {
            match tx.try_send(payload.to_string()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::trace!(client = id, "client lagging, frame dropped");
                }
                Err(TrySendError::Closed(_)) => failed.push(id),
            }
        }

        for id in failed {
            tracing::debug!(client = id, "dropping client with closed channel");
            self.remove(id);
        }

        delivered
    }

    pub fn client_count(&self) -> usize {
        self.clients.borrow().len()
    }
}
