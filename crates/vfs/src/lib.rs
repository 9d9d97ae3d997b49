//! Filesystem collaborator contracts for the remotefs agent.
//!
//! [`FileSystem`] is the seam the file service forwards to. Streaming reads
//! and writes are exposed as [`ReadStream`] / [`WriteStream`]: an ordered
//! event channel plus a control handle. [`LocalFileSystem`] serves a local
//! directory through that contract.

mod error;
mod fs;
mod local;
pub mod path;
mod stream;

pub use error::FsError;
pub use fs::{FileSystem, VfsFuture};
pub use local::LocalFileSystem;
pub use stream::{Ack, ReadControl, ReadEvent, ReadStream, WriteControl, WriteEvent, WriteStream};
