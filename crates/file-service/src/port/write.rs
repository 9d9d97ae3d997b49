//! Write-direction port.

use remotefs_protocol::chunk::decode_chunk;
use remotefs_protocol::messages::{PortWriteParams, RefEvent};
use remotefs_protocol::{MessageType, RpcError};
use remotefs_rpc_server::{PortCall, PortKind, PortRegistration, Sender};
use remotefs_vfs::{WriteEvent, WriteStream};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{PortState, answer_when_done};

/// Bridges a [`WriteStream`] to the peer.
///
/// Writes are handed to the stream as they arrive; the port keeps no
/// queue of its own.
pub(crate) struct WritePort {
    request_id: String,
    sender: Sender,
    registration: Option<PortRegistration>,
    calls: mpsc::UnboundedReceiver<PortCall>,
    stream: WriteStream,
    state: PortState,
}

impl WritePort {
    pub(crate) fn new(sender: Sender, request_id: String, stream: WriteStream) -> Self {
        let (registration, calls) = sender.ports().register(PortKind::Write);
        Self {
            request_id,
            sender,
            registration: Some(registration),
            calls,
            stream,
            state: PortState::Opening,
        }
    }

    pub(crate) fn port_id(&self) -> &str {
        self.registration.as_ref().map_or("", |r| r.id())
    }

    pub(crate) async fn run(mut self) {
        let port = self.port_id().to_string();
        debug!(port = %port, request = %self.request_id, "write port opened");

        let announce = RefEvent { port: port.clone() };
        if let Err(e) = self
            .sender
            .send_event(&self.request_id, MessageType::Ref, Some(&announce))
            .await
        {
            warn!(port = %port, "failed to announce write port: {e}");
            self.abandon();
            return;
        }

        while !self.state.is_terminal() {
            tokio::select! {
                biased;

                call = self.calls.recv() => match call {
                    Some(call) => self.handle_call(call).await,
                    None => {
                        debug!(port = %port, "connection closed, destroying write stream");
                        self.abandon();
                        return;
                    }
                },

                event = self.stream.events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => self.handle_event(WriteEvent::Close).await,
                },
            }
        }
    }

    async fn handle_call(&mut self, call: PortCall) {
        match call.method() {
            MessageType::Write => self.write(call).await,
            MessageType::End => {
                if self.state == PortState::Closing {
                    call.respond(Err(RpcError::invalid_state("write stream is closing")));
                    return;
                }
                self.state = PortState::Closing;
                answer_when_done(call, self.stream.control.end());
            }
            MessageType::Destroy => {
                self.state = PortState::Closing;
                answer_when_done(call, self.stream.control.destroy());
            }
            other => {
                let err = RpcError::not_supported(format!("{other:?} on a write port"));
                call.respond(Err(err));
            }
        }
    }

    async fn write(&mut self, call: PortCall) {
        if self.state == PortState::Closing {
            call.respond(Err(RpcError::invalid_state("write stream is closing")));
            return;
        }

        let decoded = call
            .msg
            .parse_payload::<PortWriteParams>()
            .ok()
            .flatten()
            .and_then(|p| p.data)
            .and_then(|data| decode_chunk(&data).ok());

        match decoded {
            Some(bytes) => answer_when_done(call, self.stream.control.write(bytes)),
            None => {
                let err = RpcError::invalid_state("write data is not valid hex");
                call.respond(Err(err.clone()));
                if let Err(e) = self.sender.send_event_error(&self.request_id, err).await {
                    warn!(port = %self.port_id(), "failed to relay write failure: {e}");
                }
                // No further stream events are relayed.
                self.abandon();
                self.state = PortState::Errored;
            }
        }
    }

    async fn handle_event(&mut self, event: WriteEvent) {
        match event {
            WriteEvent::Open => {
                if self.state == PortState::Opening {
                    self.state = PortState::Active;
                }
                self.emit(MessageType::Open).await;
            }
            WriteEvent::Drain => self.emit(MessageType::Drain).await,
            WriteEvent::Close => {
                self.emit(MessageType::Close).await;
                self.terminate(PortState::Closed);
            }
            WriteEvent::Error(e) => {
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

    fn terminate(&mut self, state: PortState) {
        self.state = state;
        if let Some(registration) = self.registration.take() {
            debug!(port = %registration.id(), ?state, "write port finished");
            registration.release();
        }
    }

    fn abandon(&mut self) {
        let _ = self.stream.control.destroy();
        self.terminate(PortState::Closed);
    }
}
