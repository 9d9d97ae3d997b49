//! Readable file stream task.

use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::FsError;
use crate::stream::{Ack, ReadControl, ReadEvent, ReadStream};

/// Capacity of the event channel between the read task and its consumer.
const EVENT_BUFFER: usize = 4;

/// Spawns a task streaming `file` in chunks of `chunk_size` bytes.
///
/// `limit` caps the number of bytes read (`None` reads to EOF).
pub(crate) fn spawn(file: File, limit: Option<u64>, chunk_size: usize) -> ReadStream {
    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
    let (paused_tx, paused_rx) = watch::channel(false);
    let (done_tx, done_rx) = watch::channel(false);
    let cancel = CancellationToken::new();

    tokio::spawn(run(
        file,
        limit,
        chunk_size.max(1),
        events_tx,
        paused_rx,
        cancel.clone(),
        done_tx,
    ));

    ReadStream {
        events: events_rx,
        control: Box::new(LocalReadControl {
            paused: paused_tx,
            cancel,
            done: done_rx,
        }),
    }
}

struct LocalReadControl {
    paused: watch::Sender<bool>,
    cancel: CancellationToken,
    done: watch::Receiver<bool>,
}

impl ReadControl for LocalReadControl {
    fn pause(&self) {
        self.paused.send_replace(true);
    }

    fn resume(&self) {
        self.paused.send_replace(false);
    }

    fn destroy(&self) -> Ack {
        self.cancel.cancel();
        let mut done = self.done.clone();
        Box::pin(async move {
            let _ = done.wait_for(|finished| *finished).await;
            Ok(())
        })
    }
}

impl Drop for LocalReadControl {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum Outcome {
    Ended,
    Destroyed,
    Failed(FsError),
}

async fn run(
    mut file: File,
    mut remaining: Option<u64>,
    chunk_size: usize,
    events: mpsc::Sender<ReadEvent>,
    mut paused: watch::Receiver<bool>,
    cancel: CancellationToken,
    done: watch::Sender<bool>,
) {
    let outcome = if events.send(ReadEvent::Open).await.is_err() {
        Outcome::Destroyed
    } else {
        pump(
            &mut file,
            &mut remaining,
            chunk_size,
            &events,
            &mut paused,
            &cancel,
        )
        .await
    };

    // Release the file before reporting close.
    drop(file);

    match outcome {
        Outcome::Ended => {
            let _ = events.send(ReadEvent::End).await;
        }
        Outcome::Destroyed => debug!("read stream destroyed"),
        Outcome::Failed(e) => {
            debug!(error = %e, "read stream failed");
            let _ = events.send(ReadEvent::Error(e)).await;
        }
    }
    let _ = events.send(ReadEvent::Close).await;
    done.send_replace(true);
}

async fn pump(
    file: &mut File,
    remaining: &mut Option<u64>,
    chunk_size: usize,
    events: &mpsc::Sender<ReadEvent>,
    paused: &mut watch::Receiver<bool>,
    cancel: &CancellationToken,
) -> Outcome {
    loop {
        let resumed = async { paused.wait_for(|p| !*p).await.is_ok() };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Outcome::Destroyed,
            ok = resumed => {
                if !ok {
                    return Outcome::Destroyed;
                }
            }
        }

        let want = match *remaining {
            Some(0) => return Outcome::Ended,
            Some(left) => chunk_size.min(usize::try_from(left).unwrap_or(usize::MAX)),
            None => chunk_size,
        };

        let mut buf = vec![0u8; want];
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Outcome::Destroyed,
            r = file.read(&mut buf) => r,
        };

        let n = match read {
            Ok(0) => return Outcome::Ended,
            Ok(n) => n,
            Err(e) => return Outcome::Failed(e.into()),
        };
        buf.truncate(n);
        if let Some(left) = remaining.as_mut() {
            *left = left.saturating_sub(n as u64);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Outcome::Destroyed,
            sent = events.send(ReadEvent::Data(buf)) => {
                if sent.is_err() {
                    return Outcome::Destroyed;
                }
            }
        }
    }
}
