use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Time to wait for a pong response (or any incoming message).
///
/// This acts as a read deadline: if *nothing* arrives within this window
/// the connection is considered dead. Long-lived streams that the peer
/// keeps paused still see pings answered, so this never fires for a
/// healthy but idle peer.
pub const WS_PONG_WAIT: Duration = Duration::from_secs(60);

/// How often the agent pings the peer.
pub const WS_PING_PERIOD: Duration = Duration::from_secs(20);

/// Maximum message size in bytes (16 MB).
///
/// Hex encoding doubles chunk size on the wire, so this leaves room for
/// 8 MB write payloads.
pub const WS_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Default read stream chunk size (64 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Default write stream high-water mark (16 KiB).
///
/// When more than this many bytes are queued on a write stream, a `drain`
/// event is emitted once the queue empties.
pub const DEFAULT_WRITE_HIGH_WATER_MARK: usize = 16 * 1024;

/// Well-known virtual path of the download staging directory.
pub const STAGING_DIR: &str = "/tmp";

/// Message type identifier.
///
/// The same identifier may appear in both directions: `write`, `end` and
/// `error` are port calls or stream events depending on who sends them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    // Requests from peer to agent
    #[serde(rename = "requestFileSystem")]
    RequestFileSystem,
    #[serde(rename = "resolveLocalFileSystemURL")]
    ResolveLocalFileSystemUrl,
    #[serde(rename = "getMetadata")]
    GetMetadata,
    #[serde(rename = "moveTo")]
    MoveTo,
    #[serde(rename = "copyTo")]
    CopyTo,
    #[serde(rename = "remove")]
    Remove,
    #[serde(rename = "getParent")]
    GetParent,
    #[serde(rename = "getFile")]
    GetFile,
    #[serde(rename = "getLink")]
    GetLink,
    #[serde(rename = "truncate")]
    Truncate,
    #[serde(rename = "getDirectory")]
    GetDirectory,
    #[serde(rename = "removeRecursively")]
    RemoveRecursively,
    #[serde(rename = "readEntries")]
    ReadEntries,
    #[serde(rename = "read")]
    Read,
    #[serde(rename = "write")]
    Write,
    #[serde(rename = "download")]
    Download,
    #[serde(rename = "ping")]
    Ping,

    // Port calls from peer to agent (addressed with `port`)
    #[serde(rename = "pause")]
    Pause,
    #[serde(rename = "resume")]
    Resume,
    #[serde(rename = "destroy")]
    Destroy,
    #[serde(rename = "end")]
    End,

    // Responses from agent to peer
    #[serde(rename = "result")]
    Result,
    #[serde(rename = "pong")]
    Pong,
    #[serde(rename = "error")]
    Error,

    // Stream events from agent to peer
    #[serde(rename = "ref")]
    Ref,
    #[serde(rename = "open")]
    Open,
    #[serde(rename = "data")]
    Data,
    #[serde(rename = "drain")]
    Drain,
    #[serde(rename = "close")]
    Close,

    /// Forward compatibility: unknown message types deserialize here.
    #[serde(other)]
    Unknown,
}

/// Common error codes carried next to the error name.
pub const ERR_CODE_BAD_REQUEST: i32 = 400;
pub const ERR_CODE_FORBIDDEN: i32 = 403;
pub const ERR_CODE_NOT_FOUND: i32 = 404;
pub const ERR_CODE_CONFLICT: i32 = 409;
pub const ERR_CODE_GONE: i32 = 410;
pub const ERR_CODE_UNPROCESSABLE: i32 = 422;
pub const ERR_CODE_INSUFFICIENT_STORAGE: i32 = 507;
pub const ERR_CODE_INTERNAL: i32 = 500;
pub const ERR_CODE_NOT_IMPLEMENTED: i32 = 501;
