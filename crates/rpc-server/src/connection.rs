//! Peer connection management: read/write pumps, ping/pong, send buffering
//! and routing of port calls.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use remotefs_protocol::constants::{WS_MAX_MESSAGE_SIZE, WS_PING_PERIOD, WS_PONG_WAIT};
use remotefs_protocol::{Message, MessageType, RpcError};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_util::sync::CancellationToken;

use crate::SEND_BUFFER_SIZE;
use crate::handler::Handler;
use crate::registry::PortRegistry;

/// Metadata about a connected peer.
#[derive(Debug, Clone)]
pub struct PeerMeta {
    /// Server-assigned connection id.
    pub id: u64,
    pub remote_addr: String,
}

/// Handle for sending messages to one peer.
///
/// Cloneable and cheap: wraps an `mpsc::Sender` and the connection's
/// [`PortRegistry`].
#[derive(Clone)]
pub struct Sender {
    tx: mpsc::Sender<WsMessage>,
    ports: PortRegistry,
}

impl Sender {
    /// Creates a sender over an outbound queue. The receiving end is
    /// normally drained by the connection's write pump.
    pub fn new(tx: mpsc::Sender<WsMessage>, ports: PortRegistry) -> Self {
        Self { tx, ports }
    }

    /// The port registry of this connection.
    pub fn ports(&self) -> &PortRegistry {
        &self.ports
    }

    fn encode(msg: &Message) -> Result<WsMessage, SendError> {
        let json = serde_json::to_string(msg).map_err(|_| SendError)?;
        Ok(WsMessage::Text(json.into()))
    }

    /// Queues a protocol [`Message`] as JSON text without waiting.
    ///
    /// Returns `Err` if the buffer is full or the peer disconnected. Only
    /// for frames that may be lost, such as `pong`.
    pub fn send_msg(&self, msg: Message) -> Result<(), SendError> {
        let frame = Self::encode(&msg)?;
        self.tx.try_send(frame).map_err(|_| {
            tracing::warn!(id = %msg.id, "send buffer full or closed, dropping message");
            SendError
        })
    }

    /// Queues a message, waiting for buffer space.
    ///
    /// Replies and stream events go through here, so a slow peer holds
    /// its streams back and never loses an answer. Fails only once the
    /// peer disconnected.
    pub async fn send_msg_wait(&self, msg: Message) -> Result<(), SendError> {
        let frame = Self::encode(&msg)?;
        self.tx.send(frame).await.map_err(|_| SendError)
    }

    /// Sends a `result` reply for `req`.
    pub async fn send_result<T: Serialize>(
        &self,
        req: &Message,
        payload: Option<&T>,
    ) -> Result<(), SendError> {
        let reply = req
            .reply(MessageType::Result, payload)
            .map_err(|_| SendError)?;
        self.send_msg_wait(reply).await
    }

    /// Sends an `error` reply for `req`.
    pub async fn send_error(&self, req: &Message, error: RpcError) -> Result<(), SendError> {
        self.send_msg_wait(req.reply_error(error)).await
    }

    /// Sends a stream event correlated with the request `id`.
    pub async fn send_event<T: Serialize>(
        &self,
        id: &str,
        event: MessageType,
        payload: Option<&T>,
    ) -> Result<(), SendError> {
        let msg = Message::new(id, event, payload).map_err(|_| SendError)?;
        self.send_msg_wait(msg).await
    }

    /// Sends an `error` stream event correlated with the request `id`.
    pub async fn send_event_error(&self, id: &str, error: RpcError) -> Result<(), SendError> {
        self.send_msg_wait(Message::error(id, error)).await
    }

    /// Returns `true` if the send channel is still open.
    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Error returned when the send channel is full or closed.
#[derive(Debug, thiserror::Error)]
#[error("send failed: buffer full or connection closed")]
pub struct SendError;

/// Active connection to a peer.
///
/// Owns the read/write pump tasks and provides a [`Sender`] for
/// asynchronous message delivery.
pub struct PeerConnection {
    pub meta: PeerMeta,
    sender: Sender,
    cancel: CancellationToken,
    finished: CancellationToken,
}

impl PeerConnection {
    /// Returns a cloneable [`Sender`] for this connection.
    pub fn sender(&self) -> Sender {
        self.sender.clone()
    }

    /// Returns `true` until the read pump has finished its teardown.
    pub fn is_alive(&self) -> bool {
        !self.finished.is_cancelled()
    }

    /// Signals shutdown.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Signals shutdown and waits until the registry is cleared and the
    /// handler saw the disconnect.
    pub async fn close_and_wait(&self) {
        self.cancel.cancel();
        self.finished.cancelled().await;
    }
}

/// Runs the read and write pumps for a WebSocket connection.
///
/// The pumps run as background tokio tasks and stop when the connection
/// is closed or the cancel token is triggered. On exit the port registry
/// is cleared before the handler is told about the disconnect.
pub fn spawn_connection<S, H>(
    ws_stream: S,
    meta: PeerMeta,
    handler: Arc<H>,
    server_cancel: CancellationToken,
) -> PeerConnection
where
    S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + futures_util::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error>
        + Send
        + 'static,
    H: Handler,
{
    let (tx, rx) = mpsc::channel::<WsMessage>(SEND_BUFFER_SIZE);
    let cancel = server_cancel.child_token();
    let finished = CancellationToken::new();
    let sender = Sender::new(tx, PortRegistry::new());

    let conn = PeerConnection {
        meta: meta.clone(),
        sender: sender.clone(),
        cancel: cancel.clone(),
        finished: finished.clone(),
    };

    let (ws_sink, ws_stream) = ws_stream.split();

    tokio::spawn(write_pump(ws_sink, rx, cancel.clone()));

    let read_cancel = cancel;
    tokio::spawn(async move {
        read_pump(ws_stream, sender.clone(), &handler, read_cancel.clone()).await;
        // When the read pump exits, stop the write pump and every port.
        read_cancel.cancel();
        sender.ports().clear();
        handler.on_peer_disconnected(meta.clone()).await;
        tracing::info!(peer = meta.id, addr = %meta.remote_addr, "peer disconnected");
        finished.cancel();
    });

    conn
}

/// Write pump: drains the send channel and sends WS pings.
async fn write_pump<S>(mut sink: S, mut rx: mpsc::Receiver<WsMessage>, cancel: CancellationToken)
where
    S: futures_util::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error> + Send + Unpin,
{
    let mut ping_interval = tokio::time::interval(WS_PING_PERIOD);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            msg = rx.recv() => {
                match msg {
                    Some(ws_msg) => {
                        if let Err(e) = sink.send(ws_msg).await {
                            tracing::error!("write pump send error: {e}");
                            break;
                        }
                    }
                    None => break, // Channel closed.
                }
            }

            _ = ping_interval.tick() => {
                if let Err(e) = sink.send(WsMessage::Ping(Vec::new().into())).await {
                    tracing::error!("write pump ping error: {e}");
                    break;
                }
            }
        }
    }

    // Closing the queue makes pending event sends fail fast.
    rx.close();
    let _ = sink.close().await;
}

/// Read pump: reads WS frames and dispatches requests and port calls.
async fn read_pump<S, H>(mut stream: S, sender: Sender, handler: &Arc<H>, cancel: CancellationToken)
where
    S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + Send
        + Unpin,
    H: Handler,
{
    let mut deadline = tokio::time::interval(WS_PONG_WAIT);
    deadline.reset();
    let mut seen_traffic = true;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            _ = deadline.tick() => {
                if !seen_traffic {
                    tracing::warn!("pong timeout, closing connection");
                    break;
                }
                seen_traffic = false;
            }

            frame = stream.next() => {
                match frame {
                    Some(Ok(ws_msg)) => {
                        seen_traffic = true;
                        match ws_msg {
                            WsMessage::Text(text) => {
                                if text.len() > WS_MAX_MESSAGE_SIZE {
                                    tracing::error!("message exceeds max size ({} > {})", text.len(), WS_MAX_MESSAGE_SIZE);
                                    continue;
                                }
                                dispatch_text(handler, &sender, &text);
                            }
                            WsMessage::Binary(data) => {
                                tracing::warn!(len = data.len(), "ignoring binary frame");
                            }
                            WsMessage::Pong(_) => {
                                deadline.reset();
                            }
                            WsMessage::Ping(data) => {
                                let _ = sender.tx.try_send(WsMessage::Pong(data));
                            }
                            WsMessage::Close(_) => {
                                tracing::info!("received close frame");
                                break;
                            }
                            WsMessage::Frame(_) => {} // Raw frames ignored.
                        }
                    }
                    Some(Err(e)) => {
                        tracing::error!("read pump error: {e}");
                        break;
                    }
                    None => break, // Stream ended.
                }
            }
        }
    }
}

/// Routes one text frame.
///
/// Port calls are enqueued synchronously so that a port sees them in
/// arrival order; their answers are awaited on a separate task. Requests
/// run on their own task.
fn dispatch_text<H: Handler>(handler: &Arc<H>, sender: &Sender, text: &str) {
    let msg: Message = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            tracing::error!("invalid message JSON: {e}");
            return;
        }
    };

    if msg.port.is_some() {
        route_port_call(sender, msg);
        return;
    }

    let handler = Arc::clone(handler);
    let s = sender.clone();
    tokio::spawn(async move {
        dispatch_request(handler.as_ref(), s, msg).await;
    });
}

fn route_port_call(sender: &Sender, msg: Message) {
    let id = msg.id.clone();
    match sender.ports().call(msg) {
        Ok(Some(answer)) => {
            let s = sender.clone();
            tokio::spawn(async move {
                let result = answer
                    .await
                    .unwrap_or_else(|_| Err(RpcError::invalid_state("port closed")));
                let reply = match result {
                    Ok(()) => Message::new::<()>(id, MessageType::Result, None),
                    Err(e) => Ok(Message::error(id, e)),
                };
                if let Ok(reply) = reply {
                    let _ = s.send_msg_wait(reply).await;
                }
            });
        }
        Ok(None) => {}
        Err(e) => {
            tracing::debug!(id = %id, error = %e, "port call rejected");
            let s = sender.clone();
            tokio::spawn(async move {
                let _ = s.send_msg_wait(Message::error(id, e)).await;
            });
        }
    }
}

/// Dispatches a request to the appropriate handler method.
async fn dispatch_request<H: Handler>(handler: &H, s: Sender, msg: Message) {
    match msg.msg_type {
        MessageType::RequestFileSystem => handler.on_request_file_system(s, msg).await,
        MessageType::ResolveLocalFileSystemUrl => {
            handler.on_resolve_local_file_system_url(s, msg).await
        }
        MessageType::GetMetadata => handler.on_get_metadata(s, msg).await,
        MessageType::MoveTo => handler.on_move_to(s, msg).await,
        MessageType::CopyTo => handler.on_copy_to(s, msg).await,
        MessageType::Remove => handler.on_remove(s, msg).await,
        MessageType::GetParent => handler.on_get_parent(s, msg).await,
        MessageType::GetFile => handler.on_get_file(s, msg).await,
        MessageType::GetLink => handler.on_get_link(s, msg).await,
        MessageType::Truncate => handler.on_truncate(s, msg).await,
        MessageType::GetDirectory => handler.on_get_directory(s, msg).await,
        MessageType::RemoveRecursively => handler.on_remove_recursively(s, msg).await,
        MessageType::ReadEntries => handler.on_read_entries(s, msg).await,
        MessageType::Read => handler.on_read(s, msg).await,
        MessageType::Write => handler.on_write(s, msg).await,
        MessageType::Download => handler.on_download(s, msg).await,
        MessageType::Ping => handler.on_ping(s, msg).await,
        _ => {
            tracing::warn!(msg_type = ?msg.msg_type, "unhandled message type");
            let _ = s.send_error(&msg, RpcError::not_supported("unknown message type")).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_error_display() {
        let err = SendError;
        assert!(err.to_string().contains("buffer full"));
    }

    #[tokio::test]
    async fn send_result_correlates_with_request() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = Sender::new(tx, PortRegistry::new());
        let req = Message::new::<()>("r-7", MessageType::Remove, None).unwrap();

        sender.send_result::<()>(&req, None).await.unwrap();

        let frame = rx.recv().await.unwrap();
        let WsMessage::Text(text) = frame else {
            panic!("expected text frame");
        };
        let reply: Message = serde_json::from_str(&text).unwrap();
        assert_eq!(reply.id, "r-7");
        assert_eq!(reply.msg_type, MessageType::Result);
    }

    #[tokio::test]
    async fn send_fails_after_disconnect() {
        let (tx, rx) = mpsc::channel(4);
        let sender = Sender::new(tx, PortRegistry::new());
        drop(rx);

        assert!(!sender.is_connected());
        assert!(
            sender
                .send_event::<()>("r-1", MessageType::Open, None)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn reply_waits_for_queue_space() {
        let (tx, mut rx) = mpsc::channel(2);
        let sender = Sender::new(tx, PortRegistry::new());
        for _ in 0..2 {
            sender
                .send_event::<()>("r-1", MessageType::Data, None)
                .await
                .unwrap();
        }
        // A full queue loses frames sent without waiting.
        assert!(sender.send_msg(Message::new::<()>("p", MessageType::Pong, None).unwrap()).is_err());

        let req = Message::new::<()>("m-1", MessageType::GetMetadata, None).unwrap();
        let reply = {
            let sender = sender.clone();
            tokio::spawn(async move { sender.send_result::<()>(&req, None).await })
        };
        tokio::task::yield_now().await;
        assert!(!reply.is_finished());

        let mut ids = Vec::new();
        for _ in 0..3 {
            let WsMessage::Text(text) = rx.recv().await.unwrap() else {
                panic!("expected text frame");
            };
            ids.push(serde_json::from_str::<Message>(&text).unwrap().id);
        }
        reply.await.unwrap().unwrap();
        assert_eq!(ids, ["r-1", "r-1", "m-1"]);
    }

    #[tokio::test]
    async fn rejected_port_call_is_answered() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = Sender::new(tx, PortRegistry::new());
        let call = Message::new::<()>("c-1", MessageType::Destroy, None)
            .unwrap()
            .to_port("missing");

        route_port_call(&sender, call);

        let WsMessage::Text(text) = rx.recv().await.unwrap() else {
            panic!("expected text frame");
        };
        let reply: Message = serde_json::from_str(&text).unwrap();
        assert_eq!(reply.id, "c-1");
        assert_eq!(
            reply.error.unwrap().name,
            remotefs_protocol::ErrorName::InvalidState
        );
    }
}
