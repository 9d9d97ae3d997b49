//! WebSocket RPC channel for the remotefs agent.
//!
//! Accepts any number of peers over WebSocket, dispatches JSON requests to
//! a [`Handler`], and routes calls addressed to a registered stream port
//! through the connection's [`PortRegistry`]. Each connection owns its
//! pumps (ping/pong, send buffering) and its registry; both are torn down
//! together when the peer goes away.

mod connection;
mod handler;
mod registry;
mod server;

pub use connection::{PeerConnection, PeerMeta, SendError, Sender};
pub use handler::{Handler, HandlerFuture};
pub use registry::{PortCall, PortKind, PortRegistration, PortRegistry};
pub use server::{RpcServer, ServerConfig};

/// Send buffer capacity per connection.
///
/// Replies are queued with `try_send`; stream events wait for capacity.
pub const SEND_BUFFER_SIZE: usize = 1024;

/// Errors produced by the RPC server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("server already running")]
    AlreadyRunning,
}
