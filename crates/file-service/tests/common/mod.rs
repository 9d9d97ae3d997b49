#![allow(dead_code)]

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use remotefs_protocol::{
    Entry, FileSystemInfo, Flags, Link, Message, MessageType, Metadata, ReadOptions, RpcError,
    WriteOptions,
};
use remotefs_rpc_server::{PortRegistry, Sender};
use remotefs_vfs::{
    Ack, FileSystem, FsError, LocalFileSystem, ReadControl, ReadEvent, ReadStream, VfsFuture,
    WriteControl, WriteEvent, WriteStream,
};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;

/// In-memory peer: a [`Sender`] whose frames land in a channel.
pub struct Peer {
    pub sender: Sender,
    rx: mpsc::Receiver<WsMessage>,
}

impl Peer {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// A peer whose outbound queue holds only `capacity` frames.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            sender: Sender::new(tx, PortRegistry::new()),
            rx,
        }
    }

    /// Stops accepting frames, as a vanished peer would. The registry is
    /// left alone.
    pub fn hang_up(&mut self) {
        self.rx.close();
    }

    pub fn ports(&self) -> &PortRegistry {
        self.sender.ports()
    }

    /// Next message sent to the peer; panics after 5 s.
    pub async fn next(&mut self) -> Message {
        let frame = tokio::time::timeout(Duration::from_secs(5), self.rx.recv())
            .await
            .expect("timed out waiting for a message")
            .expect("sender closed");
        match frame {
            WsMessage::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    /// Returns `None` if nothing arrives within `wait`.
    pub async fn try_next(&mut self, wait: Duration) -> Option<Message> {
        match tokio::time::timeout(wait, self.rx.recv()).await {
            Ok(Some(WsMessage::Text(text))) => Some(serde_json::from_str(&text).unwrap()),
            _ => None,
        }
    }

    /// Routes a port call the way the connection does and waits for its
    /// answer, if the method is acknowledged.
    pub async fn call(
        &self,
        port: &str,
        msg_type: MessageType,
        payload: Option<serde_json::Value>,
    ) -> Option<Result<(), RpcError>> {
        let msg = Message::new("call", msg_type, payload.as_ref())
            .unwrap()
            .to_port(port);
        match self.ports().call(msg) {
            Err(e) => Some(Err(e)),
            Ok(None) => None,
            Ok(Some(answer)) => Some(
                tokio::time::timeout(Duration::from_secs(5), answer)
                    .await
                    .expect("timed out waiting for port answer")
                    .unwrap_or_else(|_| Err(RpcError::invalid_state("port closed"))),
            ),
        }
    }
}

pub fn request(id: &str, msg_type: MessageType, payload: serde_json::Value) -> Message {
    Message::new(id, msg_type, Some(&payload)).unwrap()
}

pub fn entry_json(entry: &Entry) -> serde_json::Value {
    serde_json::to_value(entry).unwrap()
}

/// Extracts the port id from a `ref` event.
pub fn port_of(msg: &Message) -> String {
    assert_eq!(msg.msg_type, MessageType::Ref, "expected ref, got {msg:?}");
    let payload: serde_json::Value = msg.parse_payload().unwrap().unwrap();
    payload["port"].as_str().unwrap().to_string()
}

pub fn data_of(msg: &Message) -> String {
    assert_eq!(msg.msg_type, MessageType::Data, "expected data, got {msg:?}");
    let payload: serde_json::Value = msg.parse_payload().unwrap().unwrap();
    payload["data"].as_str().unwrap().to_string()
}

/// Polls `cond` for up to 2 s.
pub async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cond()
}

/// Scripted read stream: the test feeds events, destroy calls are counted.
pub struct ScriptedRead {
    pub events: mpsc::Sender<ReadEvent>,
    pub destroyed: std::sync::Arc<AtomicUsize>,
}

struct ScriptedControl {
    destroyed: std::sync::Arc<AtomicUsize>,
}

impl ReadControl for ScriptedControl {
    fn pause(&self) {}
    fn resume(&self) {}
    fn destroy(&self) -> Ack {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }
}

pub fn scripted_read() -> (ScriptedRead, ReadStream) {
    let (tx, rx) = mpsc::channel(16);
    let destroyed = std::sync::Arc::new(AtomicUsize::new(0));
    let stream = ReadStream {
        events: rx,
        control: Box::new(ScriptedControl {
            destroyed: destroyed.clone(),
        }),
    };
    (
        ScriptedRead {
            events: tx,
            destroyed,
        },
        stream,
    )
}

/// Scripted write stream: the test feeds events; writes are accepted and
/// destroy calls are counted.
pub struct ScriptedWrite {
    pub events: mpsc::Sender<WriteEvent>,
    pub destroyed: std::sync::Arc<AtomicUsize>,
}

struct ScriptedWriteControl {
    destroyed: std::sync::Arc<AtomicUsize>,
}

impl WriteControl for ScriptedWriteControl {
    fn write(&self, _data: Vec<u8>) -> Ack {
        Box::pin(async { Ok(()) })
    }
    fn end(&self) -> Ack {
        Box::pin(async { Ok(()) })
    }
    fn destroy(&self) -> Ack {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }
}

pub fn scripted_write() -> (ScriptedWrite, WriteStream) {
    let (tx, rx) = mpsc::channel(16);
    let destroyed = std::sync::Arc::new(AtomicUsize::new(0));
    let stream = WriteStream {
        events: rx,
        control: Box::new(ScriptedWriteControl {
            destroyed: destroyed.clone(),
        }),
    };
    (
        ScriptedWrite {
            events: tx,
            destroyed,
        },
        stream,
    )
}

/// A [`LocalFileSystem`] wrapper that can slow down selected operations
/// and hand out a scripted read stream.
pub struct SlowFs {
    pub inner: LocalFileSystem,
    /// Delay applied to `remove` and `remove_recursively`.
    pub cleanup_delay: Duration,
    /// Links whose href contains this marker are fetched slowly.
    pub slow_marker: Option<String>,
    pub fetch_delay: Duration,
    pub scripted: Mutex<Option<ReadStream>>,
    pub scripted_write: Mutex<Option<WriteStream>>,
    pub removals: AtomicUsize,
}

impl SlowFs {
    pub fn new(root: &Path) -> Self {
        Self {
            inner: LocalFileSystem::new("slow", root),
            cleanup_delay: Duration::ZERO,
            slow_marker: None,
            fetch_delay: Duration::ZERO,
            scripted: Mutex::new(None),
            scripted_write: Mutex::new(None),
            removals: AtomicUsize::new(0),
        }
    }
}

impl FileSystem for SlowFs {
    fn request_file_system(&self) -> VfsFuture<'_, FileSystemInfo> {
        self.inner.request_file_system()
    }

    fn get_metadata(&self, entry: Entry) -> VfsFuture<'_, Metadata> {
        self.inner.get_metadata(entry)
    }

    fn move_to(
        &self,
        source: Entry,
        parent: Entry,
        new_name: Option<String>,
    ) -> VfsFuture<'_, Entry> {
        self.inner.move_to(source, parent, new_name)
    }

    fn copy_to(
        &self,
        source: Entry,
        parent: Entry,
        new_name: Option<String>,
    ) -> VfsFuture<'_, Entry> {
        self.inner.copy_to(source, parent, new_name)
    }

    fn remove(&self, entry: Entry) -> VfsFuture<'_, ()> {
        Box::pin(async move {
            tokio::time::sleep(self.cleanup_delay).await;
            self.removals.fetch_add(1, Ordering::SeqCst);
            self.inner.remove(entry).await
        })
    }

    fn get_parent(&self, entry: Entry) -> VfsFuture<'_, Entry> {
        self.inner.get_parent(entry)
    }

    fn get_file(&self, entry: Entry, path: String, flags: Flags) -> VfsFuture<'_, Entry> {
        self.inner.get_file(entry, path, flags)
    }

    fn get_directory(&self, entry: Entry, path: String, flags: Flags) -> VfsFuture<'_, Entry> {
        self.inner.get_directory(entry, path, flags)
    }

    fn get_link(&self, entry: Entry) -> VfsFuture<'_, Link> {
        self.inner.get_link(entry)
    }

    fn truncate(&self, entry: Entry, size: u64) -> VfsFuture<'_, ()> {
        self.inner.truncate(entry, size)
    }

    fn remove_recursively(&self, entry: Entry) -> VfsFuture<'_, ()> {
        Box::pin(async move {
            tokio::time::sleep(self.cleanup_delay).await;
            self.removals.fetch_add(1, Ordering::SeqCst);
            self.inner.remove_recursively(entry).await
        })
    }

    fn read_entries(&self, entry: Entry) -> VfsFuture<'_, Vec<Entry>> {
        self.inner.read_entries(entry)
    }

    fn create_read_stream(&self, entry: Entry, options: ReadOptions) -> VfsFuture<'_, ReadStream> {
        let scripted = self.scripted.lock().unwrap().take();
        match scripted {
            Some(stream) => Box::pin(async move { Ok(stream) }),
            None => self.inner.create_read_stream(entry, options),
        }
    }

    fn create_write_stream(
        &self,
        entry: Entry,
        options: WriteOptions,
    ) -> VfsFuture<'_, WriteStream> {
        let scripted = self.scripted_write.lock().unwrap().take();
        match scripted {
            Some(stream) => Box::pin(async move { Ok(stream) }),
            None => self.inner.create_write_stream(entry, options),
        }
    }

    fn download(&self, link: Link, parent: Entry, name: String) -> VfsFuture<'_, Entry> {
        Box::pin(async move {
            let slow = self
                .slow_marker
                .as_deref()
                .is_some_and(|m| link.href.contains(m));
            if slow {
                tokio::time::sleep(self.fetch_delay).await;
            }
            self.inner.download(link, parent, name).await
        })
    }
}

pub fn not_found() -> FsError {
    FsError::NotFound("scripted".into())
}
