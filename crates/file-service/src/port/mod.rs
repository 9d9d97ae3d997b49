//! Stream ports: one task per open stream, relaying stream events to the
//! peer and peer calls to the stream.
//!
//! A port registers itself before announcing its identity with a `ref`
//! event and unregisters exactly once, right after relaying `close` or
//! `error` (even when that relay fails), or when the connection ends.

mod read;
mod write;

pub(crate) use read::ReadPort;
pub(crate) use write::WritePort;

use remotefs_rpc_server::PortCall;
use remotefs_vfs::Ack;

/// Lifecycle of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PortState {
    /// Registered, waiting for the stream's `open`.
    Opening,
    Active,
    /// `destroy` (or `end` for writers) was requested; only terminal
    /// events are still expected.
    Closing,
    Closed,
    Errored,
}

impl PortState {
    pub(crate) fn is_terminal(self) -> bool {
        matches!(self, PortState::Closed | PortState::Errored)
    }
}

/// Answers `call` once `ack` completes, without holding up the port.
pub(crate) fn answer_when_done(call: PortCall, ack: Ack) {
    tokio::spawn(async move {
        let result = ack.await.map_err(|e| e.to_rpc_error());
        call.respond(result);
    });
}
