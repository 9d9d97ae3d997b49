//! Per-connection registry of stream ports.
//!
//! A port is a remote-reachable object identified by a UUID v4 string. The
//! registry holds the dispatch side (a call queue) while the port owns its
//! lifetime through a [`PortRegistration`] guard. Ports never touch the map
//! directly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use remotefs_protocol::{Message, MessageType, RpcError};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Capability set of a registered port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    /// Accepts `pause`, `resume` and `destroy`.
    Read,
    /// Accepts `write`, `end` and `destroy`.
    Write,
}

impl PortKind {
    /// Whether calls of `method` are accepted by this kind of port.
    pub fn accepts(self, method: &MessageType) -> bool {
        match self {
            PortKind::Read => matches!(
                method,
                MessageType::Pause | MessageType::Resume | MessageType::Destroy
            ),
            PortKind::Write => matches!(
                method,
                MessageType::Write | MessageType::End | MessageType::Destroy
            ),
        }
    }

    /// Whether `method` is answered with a result or error.
    ///
    /// `pause` and `resume` are fire-and-forget.
    fn acknowledged(method: &MessageType) -> bool {
        !matches!(method, MessageType::Pause | MessageType::Resume)
    }
}

/// A call routed to a port, in arrival order.
#[derive(Debug)]
pub struct PortCall {
    pub msg: Message,
    /// Present for acknowledged methods; the port answers through it.
    pub reply: Option<oneshot::Sender<Result<(), RpcError>>>,
}

impl PortCall {
    pub fn method(&self) -> &MessageType {
        &self.msg.msg_type
    }

    /// Answers the call. Unacknowledged calls ignore the result.
    pub fn respond(self, result: Result<(), RpcError>) {
        if let Some(reply) = self.reply {
            let _ = reply.send(result);
        }
    }
}

struct PortSlot {
    kind: PortKind,
    calls: mpsc::UnboundedSender<PortCall>,
}

#[derive(Default)]
struct Inner {
    ports: HashMap<String, PortSlot>,
    released: u64,
}

/// Map from port id to its call queue. Cheap to clone.
#[derive(Clone, Default)]
pub struct PortRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl PortRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new port and returns its guard and call queue.
    pub fn register(
        &self,
        kind: PortKind,
    ) -> (PortRegistration, mpsc::UnboundedReceiver<PortCall>) {
        let id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock()
            .ports
            .insert(id.clone(), PortSlot { kind, calls: tx });
        debug!(port = %id, ?kind, "port registered");

        let registration = PortRegistration {
            id,
            registry: self.clone(),
            released: false,
        };
        (registration, rx)
    }

    /// Routes a port call.
    ///
    /// Returns a receiver for the port's answer when the method is
    /// acknowledged. Unknown or released ports fail with
    /// `InvalidStateError`; methods outside the port's capability set fail
    /// with `NotSupportedError`.
    pub fn call(
        &self,
        msg: Message,
    ) -> Result<Option<oneshot::Receiver<Result<(), RpcError>>>, RpcError> {
        let port = msg.port.clone().unwrap_or_default();
        let inner = self.lock();
        let slot = inner
            .ports
            .get(&port)
            .ok_or_else(|| RpcError::invalid_state(format!("no such port: {port}")))?;

        if !slot.kind.accepts(&msg.msg_type) {
            return Err(RpcError::not_supported(format!(
                "{:?} port does not support {:?}",
                slot.kind, msg.msg_type
            )));
        }

        let (reply, rx) = if PortKind::acknowledged(&msg.msg_type) {
            let (tx, rx) = oneshot::channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        slot.calls
            .send(PortCall { msg, reply })
            .map_err(|_| RpcError::invalid_state(format!("port is closed: {port}")))?;
        Ok(rx)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().ports.contains_key(id)
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.lock().ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of registrations released by their guards so far.
    pub fn released_count(&self) -> u64 {
        self.lock().released
    }

    /// Drops every registration. Ports observe their call queue closing.
    pub fn clear(&self) {
        let dropped = std::mem::take(&mut self.lock().ports);
        if !dropped.is_empty() {
            debug!(count = dropped.len(), "port registry cleared");
        }
    }

    fn release(&self, id: &str) {
        let mut inner = self.lock();
        inner.ports.remove(id);
        inner.released += 1;
        debug!(port = %id, "port released");
    }
}

/// Ownership of a port's registration.
///
/// Released exactly once: by [`release`](Self::release) or on drop.
pub struct PortRegistration {
    id: String,
    registry: PortRegistry,
    released: bool,
}

impl PortRegistration {
    /// The port identity sent to the peer in the `ref` event.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.registry.release(&self.id);
        }
    }
}

impl Drop for PortRegistration {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl std::fmt::Debug for PortRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortRegistration")
            .field("id", &self.id)
            .field("released", &self.released)
            .finish()
    }
}
