//! Byte-stream contracts.
//!
//! A stream is split into an ordered event channel, consumed by exactly one
//! owner, and a control handle. Control calls that complete asynchronously
//! return an [`Ack`]: the operation is started when the method is called,
//! the returned future only reports its completion.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::error::FsError;

/// Completion of a stream control operation.
pub type Ack = Pin<Box<dyn Future<Output = Result<(), FsError>> + Send + 'static>>;

/// Returns an already-completed [`Ack`].
pub(crate) fn ready(result: Result<(), FsError>) -> Ack {
    Box::pin(std::future::ready(result))
}

/// Events of a readable stream, in emission order.
///
/// A healthy stream emits `Open`, any number of `Data`, `End`, then `Close`.
/// A destroyed stream skips `End`. A failed stream emits `Error` followed
/// by `Close`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadEvent {
    Open,
    Data(Vec<u8>),
    End,
    Close,
    Error(FsError),
}

/// Events of a writable stream, in emission order.
///
/// `Drain` follows a write that pushed the queued byte count to the
/// high-water mark, once the queue is empty again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteEvent {
    Open,
    Drain,
    Close,
    Error(FsError),
}

/// Flow control and termination for a readable stream.
pub trait ReadControl: Send + Sync {
    /// Stops producing `Data` events until [`resume`](Self::resume).
    fn pause(&self);

    fn resume(&self);

    /// Destroys the stream. Resolves once the stream has released its
    /// underlying resource.
    fn destroy(&self) -> Ack;
}

/// Writes and termination for a writable stream.
pub trait WriteControl: Send + Sync {
    /// Queues `data`. Resolves once the bytes reached the underlying file.
    fn write(&self, data: Vec<u8>) -> Ack;

    /// Finishes the stream after all queued writes.
    fn end(&self) -> Ack;

    /// Destroys the stream, discarding queued writes.
    fn destroy(&self) -> Ack;
}

/// An open readable stream.
pub struct ReadStream {
    pub events: mpsc::Receiver<ReadEvent>,
    pub control: Box<dyn ReadControl>,
}

/// An open writable stream.
pub struct WriteStream {
    pub events: mpsc::Receiver<WriteEvent>,
    pub control: Box<dyn WriteControl>,
}

impl std::fmt::Debug for ReadStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadStream").finish_non_exhaustive()
    }
}

impl std::fmt::Debug for WriteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteStream").finish_non_exhaustive()
    }
}
