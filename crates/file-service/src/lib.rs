//! File API service for the remotefs agent.
//!
//! [`FileService`] implements the RPC [`Handler`](remotefs_rpc_server::Handler)
//! on top of any [`FileSystem`](remotefs_vfs::FileSystem): simple operations
//! are forwarded one to one, `read`/`write` are bridged through stream
//! ports, and `download` runs through the [`TransferOrchestrator`].

mod port;
mod service;
mod transfer;

pub use service::FileService;
pub use transfer::TransferOrchestrator;
