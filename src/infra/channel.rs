//! Addressable mailbox transport between the coordinator and workers.
//!
//! Built on `crossbeam-channel`: one unbounded inbox for the coordinator and
//! one unbounded inbox per registered worker. Sends never block. FIFO holds
//! per (sender, destination) pair because each pair maps to a single channel.
//!
//! Revoking a worker's inbox drops its sender, so a worker blocked in
//! `recv` wakes with a disconnect error and exits. This is both the victim
//! kill and the teardown path; no separate shutdown message exists.

use std::collections::HashMap;

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use tracing::debug;

/// Stable slot index used as a worker's address.
pub type WorkerId = usize;

/// Message discriminator. `Reply` doubles as the permission token that
/// re-enables a worker's next decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Worker asks for one instance of a resource class.
    Request,
    /// Worker returns one instance of a resource class.
    Release,
    /// Coordinator-to-worker reply or permission token.
    Reply,
}

/// A fixed-size record exchanged over the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    /// What the message is.
    pub kind: MessageKind,
    /// Resource class the message concerns. Zero for bare permission tokens.
    pub resource: usize,
    /// Slot index of the worker this message is from or about.
    pub worker: WorkerId,
}

/// Error returned when the counterpart endpoint has been dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelClosed;

/// Coordinator side of the transport: the shared inbox plus a sender per
/// registered worker.
#[derive(Debug)]
pub struct CoordinatorHub {
    inbox_tx: Sender<Message>,
    inbox_rx: Receiver<Message>,
    worker_txs: HashMap<WorkerId, Sender<Message>>,
}

impl CoordinatorHub {
    /// New hub with an empty inbox and no registered workers.
    #[must_use]
    pub fn new() -> Self {
        let (inbox_tx, inbox_rx) = unbounded();
        Self {
            inbox_tx,
            inbox_rx,
            worker_txs: HashMap::new(),
        }
    }

    /// Create the mailbox for `id` and hand back the worker's endpoint.
    pub fn register(&mut self, id: WorkerId) -> WorkerEndpoint {
        let (tx, rx) = unbounded();
        self.worker_txs.insert(id, tx);
        WorkerEndpoint {
            id,
            inbox: rx,
            outbox: self.inbox_tx.clone(),
        }
    }

    /// Enqueue `msg` for worker `id` without blocking. Returns `false` when
    /// the worker is unregistered or gone; callers drop such replies
    /// silently because the worker has already been reaped.
    pub fn send(&self, id: WorkerId, msg: Message) -> bool {
        match self.worker_txs.get(&id) {
            Some(tx) => {
                if tx.send(msg).is_err() {
                    debug!(worker = id, "dropping message to a departed worker");
                    false
                } else {
                    true
                }
            }
            None => {
                debug!(worker = id, "dropping message to an unregistered worker");
                false
            }
        }
    }

    /// Non-blocking read of the coordinator inbox.
    #[must_use]
    pub fn try_receive(&self) -> Option<Message> {
        match self.inbox_rx.try_recv() {
            Ok(msg) => Some(msg),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Drop worker `id`'s inbox sender. A worker blocked on `receive` wakes
    /// immediately with [`ChannelClosed`].
    pub fn revoke(&mut self, id: WorkerId) {
        self.worker_txs.remove(&id);
    }

    /// Revoke every registered worker. Used at teardown.
    pub fn revoke_all(&mut self) {
        self.worker_txs.clear();
    }
}

impl Default for CoordinatorHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Worker side of the transport: its own inbox plus a sender into the
/// coordinator's inbox.
#[derive(Debug)]
pub struct WorkerEndpoint {
    id: WorkerId,
    inbox: Receiver<Message>,
    outbox: Sender<Message>,
}

impl WorkerEndpoint {
    /// This endpoint's address.
    #[must_use]
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Block until a message addressed to this worker arrives.
    pub fn receive(&self) -> Result<Message, ChannelClosed> {
        self.inbox.recv().map_err(|_| ChannelClosed)
    }

    /// Non-blocking read of this worker's inbox.
    #[must_use]
    pub fn try_receive(&self) -> Option<Message> {
        match self.inbox.try_recv() {
            Ok(msg) => Some(msg),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Send `msg` to the coordinator without blocking.
    pub fn send(&self, msg: Message) -> Result<(), ChannelClosed> {
        self.outbox.send(msg).map_err(|_| ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(worker: WorkerId, resource: usize) -> Message {
        Message {
            kind: MessageKind::Request,
            resource,
            worker,
        }
    }

    #[test]
    fn try_receive_on_empty_inbox_is_none() {
        let hub = CoordinatorHub::new();
        assert_eq!(hub.try_receive(), None);
    }

    #[test]
    fn worker_to_coordinator_is_fifo() {
        let mut hub = CoordinatorHub::new();
        let endpoint = hub.register(0);

        endpoint.send(request(0, 1)).unwrap();
        endpoint.send(request(0, 2)).unwrap();
        endpoint.send(request(0, 3)).unwrap();

        assert_eq!(hub.try_receive().unwrap().resource, 1);
        assert_eq!(hub.try_receive().unwrap().resource, 2);
        assert_eq!(hub.try_receive().unwrap().resource, 3);
        assert_eq!(hub.try_receive(), None);
    }

    #[test]
    fn coordinator_to_worker_is_fifo() {
        let mut hub = CoordinatorHub::new();
        let endpoint = hub.register(4);

        for resource in 0..3 {
            assert!(hub.send(4, Message { kind: MessageKind::Reply, resource, worker: 4 }));
        }
        for resource in 0..3 {
            assert_eq!(endpoint.receive().unwrap().resource, resource);
        }
    }

    #[test]
    fn send_to_unregistered_worker_is_dropped() {
        let hub = CoordinatorHub::new();
        assert!(!hub.send(9, request(9, 0)));
    }

    #[test]
    fn revoke_unblocks_receive() {
        let mut hub = CoordinatorHub::new();
        let endpoint = hub.register(2);

        let handle = std::thread::spawn(move || endpoint.receive());
        hub.revoke(2);
        assert_eq!(handle.join().unwrap(), Err(ChannelClosed));
    }

    #[test]
    fn send_after_revoke_is_dropped() {
        let mut hub = CoordinatorHub::new();
        let _endpoint = hub.register(3);
        hub.revoke(3);
        assert!(!hub.send(3, request(3, 0)));
    }

    #[test]
    fn worker_send_after_hub_drop_errors() {
        let mut hub = CoordinatorHub::new();
        let endpoint = hub.register(0);
        drop(hub);
        assert_eq!(endpoint.send(request(0, 0)), Err(ChannelClosed));
    }
}
