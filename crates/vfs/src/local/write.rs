//! Writable file stream task.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::FsError;
use crate::stream::{Ack, WriteControl, WriteEvent, WriteStream, ready};

const EVENT_BUFFER: usize = 4;

type Reply = oneshot::Sender<Result<(), FsError>>;

enum Command {
    Write(Vec<u8>, Reply),
    End(Reply),
}

/// Bytes accepted by `write` but not yet flushed to the file.
#[derive(Default)]
struct Backlog {
    queued: AtomicUsize,
    needs_drain: AtomicBool,
}

/// Spawns a task writing commands to `file` in order.
pub(crate) fn spawn(file: File, high_water_mark: usize) -> WriteStream {
    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (done_tx, done_rx) = watch::channel(false);
    let cancel = CancellationToken::new();
    let backlog = Arc::new(Backlog::default());

    tokio::spawn(run(
        file,
        events_tx,
        commands_rx,
        Arc::clone(&backlog),
        cancel.clone(),
        done_tx,
    ));

    WriteStream {
        events: events_rx,
        control: Box::new(LocalWriteControl {
            commands: commands_tx,
            backlog,
            high_water_mark,
            ended: AtomicBool::new(false),
            cancel,
            done: done_rx,
        }),
    }
}

struct LocalWriteControl {
    commands: mpsc::UnboundedSender<Command>,
    backlog: Arc<Backlog>,
    high_water_mark: usize,
    ended: AtomicBool,
    cancel: CancellationToken,
    done: watch::Receiver<bool>,
}

impl LocalWriteControl {
    fn submit(&self, cmd: Command, rx: oneshot::Receiver<Result<(), FsError>>) -> Ack {
        if self.commands.send(cmd).is_err() {
            return ready(Err(FsError::InvalidState("stream is closed".into())));
        }
        Box::pin(async move {
            rx.await
                .unwrap_or_else(|_| Err(FsError::Abort("stream destroyed".into())))
        })
    }
}

impl WriteControl for LocalWriteControl {
    fn write(&self, data: Vec<u8>) -> Ack {
        if self.ended.load(Ordering::SeqCst) {
            return ready(Err(FsError::InvalidState("write after end".into())));
        }
        let len = data.len();
        let queued = self.backlog.queued.fetch_add(len, Ordering::SeqCst) + len;
        if queued >= self.high_water_mark {
            self.backlog.needs_drain.store(true, Ordering::SeqCst);
        }
        let (tx, rx) = oneshot::channel();
        self.submit(Command::Write(data, tx), rx)
    }

    fn end(&self) -> Ack {
        if self.ended.swap(true, Ordering::SeqCst) {
            return ready(Err(FsError::InvalidState("stream already ended".into())));
        }
        let (tx, rx) = oneshot::channel();
        self.submit(Command::End(tx), rx)
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

impl Drop for LocalWriteControl {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    mut file: File,
    events: mpsc::Sender<WriteEvent>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    backlog: Arc<Backlog>,
    cancel: CancellationToken,
    done: watch::Sender<bool>,
) {
    let mut failure = None;

    if events.send(WriteEvent::Open).await.is_ok() {
        loop {
            let cmd = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                cmd = commands.recv() => cmd,
            };

            match cmd {
                Some(Command::Write(data, reply)) => {
                    let len = data.len();
                    let written = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            let _ = reply.send(Err(FsError::Abort("stream destroyed".into())));
                            break;
                        }
                        r = file.write_all(&data) => r,
                    };
                    let queued = backlog.queued.fetch_sub(len, Ordering::SeqCst) - len;

                    if let Err(e) = written {
                        let err = FsError::from(e);
                        let _ = reply.send(Err(err.clone()));
                        failure = Some(err);
                        break;
                    }
                    let _ = reply.send(Ok(()));

                    if queued == 0 && backlog.needs_drain.swap(false, Ordering::SeqCst) {
                        let _ = events.send(WriteEvent::Drain).await;
                    }
                }
                Some(Command::End(reply)) => {
                    match file.flush().await {
                        Ok(()) => {
                            let _ = reply.send(Ok(()));
                        }
                        Err(e) => {
                            let err = FsError::from(e);
                            let _ = reply.send(Err(err.clone()));
                            failure = Some(err);
                        }
                    }
                    break;
                }
                None => break,
            }
        }
    }

    // Pending commands are answered with Abort when their replies drop.
    commands.close();
    drop(commands);
    let _ = file.flush().await;
    drop(file);

    if let Some(e) = failure {
        debug!(error = %e, "write stream failed");
        let _ = events.send(WriteEvent::Error(e)).await;
    }
    let _ = events.send(WriteEvent::Close).await;
    done.send_replace(true);
}
