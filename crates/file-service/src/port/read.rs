//! Read-direction port.

use remotefs_protocol::chunk::encode_chunk;
use remotefs_protocol::messages::{DataEvent, RefEvent};
use remotefs_protocol::{MessageType, RpcError};
use remotefs_rpc_server::{PortCall, PortKind, PortRegistration, Sender};
use remotefs_vfs::{ReadEvent, ReadStream};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{PortState, answer_when_done};

/// Bridges a [`ReadStream`] to the peer.
///
/// With `autopause`, every chunk pauses the stream before it is relayed,
/// so at most one `data` message is outstanding per `resume`. A chunk the
/// stream produced before the pause took effect is held back and relayed
/// on the next `resume`; while one is held, the port stops draining the
/// stream's events altogether.
pub(crate) struct ReadPort {
    request_id: String,
    sender: Sender,
    registration: Option<PortRegistration>,
    calls: mpsc::UnboundedReceiver<PortCall>,
    stream: ReadStream,
    autopause: bool,
    state: PortState,
    awaiting_resume: bool,
    parked: Option<Vec<u8>>,
}

impl ReadPort {
    /// Registers a port for `stream` on the sender's connection.
    pub(crate) fn new(sender: Sender, request_id: String, stream: ReadStream, autopause: bool) -> Self {
        let (registration, calls) = sender.ports().register(PortKind::Read);
        Self {
            request_id,
            sender,
            registration: Some(registration),
            calls,
            stream,
            autopause,
            state: PortState::Opening,
            awaiting_resume: false,
            parked: None,
        }
    }

    pub(crate) fn port_id(&self) -> &str {
        self.registration.as_ref().map_or("", |r| r.id())
    }

    /// Announces the port and relays until the stream terminates or the
    /// connection goes away.
    pub(crate) async fn run(mut self) {
        let port = self.port_id().to_string();
        debug!(port = %port, request = %self.request_id, autopause = self.autopause, "read port opened");

        let announce = RefEvent { port: port.clone() };
        if let Err(e) = self
            .sender
            .send_event(&self.request_id, MessageType::Ref, Some(&announce))
            .await
        {
            warn!(port = %port, "failed to announce read port: {e}");
            self.abandon();
            return;
        }

        while !self.state.is_terminal() {
            let holding = self.awaiting_resume && self.parked.is_some();
            tokio::select! {
                biased;

                call = self.calls.recv() => match call {
                    Some(call) => self.handle_call(call).await,
                    None => {
                        debug!(port = %port, "connection closed, destroying read stream");
                        self.abandon();
                        return;
                    }
                },

                event = self.stream.events.recv(), if !holding => match event {
                    Some(event) => self.handle_event(event).await,
                    // The stream went away without reporting close.
                    None => self.handle_event(ReadEvent::Close).await,
                },
            }
        }
    }

    async fn handle_call(&mut self, call: PortCall) {
        match call.method() {
            MessageType::Pause => self.stream.control.pause(),
            MessageType::Resume => self.resume().await,
            MessageType::Destroy => {
                self.state = PortState::Closing;
                self.parked = None;
                self.awaiting_resume = false;
                answer_when_done(call, self.stream.control.destroy());
            }
            other => {
                let err = RpcError::not_supported(format!("{other:?} on a read port"));
                call.respond(Err(err));
            }
        }
    }

    async fn resume(&mut self) {
        if self.state == PortState::Closing {
            return;
        }
        match self.parked.take() {
            // Relay the held chunk under a fresh pause; the stream stays paused.
            Some(chunk) => self.emit_data(&chunk).await,
            None => {
                self.awaiting_resume = false;
                self.stream.control.resume();
            }
        }
    }

    async fn handle_event(&mut self, event: ReadEvent) {
        match event {
            ReadEvent::Open => {
                if self.state == PortState::Opening {
                    self.state = PortState::Active;
                }
                self.emit(MessageType::Open).await;
            }
            ReadEvent::Data(chunk) => {
                if self.state == PortState::Closing {
                    return;
                }
                if self.autopause {
                    if self.awaiting_resume {
                        self.parked = Some(chunk);
                        return;
                    }
                    self.stream.control.pause();
                    self.awaiting_resume = true;
                }
                self.emit_data(&chunk).await;
            }
            ReadEvent::End => self.emit(MessageType::End).await,
            ReadEvent::Close => {
                self.emit(MessageType::Close).await;
                self.terminate(PortState::Closed);
            }
            ReadEvent::Error(e) => {
                if let Err(send_err) = self
                    .sender
                    .send_event_error(&self.request_id, e.to_rpc_error())
                    .await
                {
                    warn!(port = %self.port_id(), "failed to relay stream error: {send_err}");
                }
                self.terminate(PortState::Errored);
            }
        }
    }

    async fn emit(&self, event: MessageType) {
        if let Err(e) = self
            .sender
            .send_event::<()>(&self.request_id, event.clone(), None)
            .await
        {
            warn!(port = %self.port_id(), ?event, "failed to relay stream event: {e}");
        }
    }

    async fn emit_data(&self, chunk: &[u8]) {
        let data = DataEvent {
            data: encode_chunk(chunk),
        };
        if let Err(e) = self
            .sender
            .send_event(&self.request_id, MessageType::Data, Some(&data))
            .await
        {
            warn!(port = %self.port_id(), len = chunk.len(), "failed to relay data: {e}");
        }
    }

    fn terminate(&mut self, state: PortState) {
        self.state = state;
        if let Some(registration) = self.registration.take() {
            debug!(port = %registration.id(), ?state, "read port finished");
            registration.release();
        }
    }

    /// Tears down without relaying anything further.
    fn abandon(&mut self) {
        let _ = self.stream.control.destroy();
        self.terminate(PortState::Closed);
    }
}
