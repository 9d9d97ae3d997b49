use serde::{Deserialize, Serialize};

use crate::types::{Entry, Flags, Link, ReadOptions, WriteOptions};

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// `requestFileSystem` parameters. Both fields are accepted and ignored:
/// the agent serves exactly one filesystem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFileSystemParams {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub fs_type: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Parameters naming a single entry (`getMetadata`, `remove`, `getParent`,
/// `getLink`, `removeRecursively`, `readEntries`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryParams {
    pub entry: Entry,
}

/// `moveTo` / `copyTo` parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferParams {
    pub source: Entry,
    pub parent: Entry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
}

/// `getFile` / `getDirectory` parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupParams {
    pub entry: Entry,
    pub path: String,
    #[serde(default)]
    pub options: Option<Flags>,
}

/// `truncate` parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruncateParams {
    pub entry: Entry,
    pub size: u64,
}

/// `read` parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadParams {
    pub entry: Entry,
    #[serde(default)]
    pub options: ReadOptions,
}

/// `write` parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteParams {
    pub entry: Entry,
    #[serde(default)]
    pub options: WriteOptions,
}

/// `download` parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadParams {
    pub link: Link,
    pub parent: Entry,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Port call payloads
// ---------------------------------------------------------------------------

/// Payload of a port `write` call; `data` is hex-encoded.
///
/// The field is optional so that a missing payload reaches the port and is
/// treated like any other undecodable chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortWriteParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

// ---------------------------------------------------------------------------
// Stream events
// ---------------------------------------------------------------------------

/// `ref` event: identity of the registered port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefEvent {
    pub port: String,
}

/// `data` event: one hex-encoded chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEvent {
    pub data: String,
}
