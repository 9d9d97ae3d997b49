use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A file or directory entry, addressed by its virtual absolute path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub is_file: bool,
    pub is_directory: bool,
    pub name: String,
    pub full_path: String,
}

impl Entry {
    /// Builds a file entry; the name is the last path component.
    pub fn file(full_path: impl Into<String>) -> Self {
        Self::with_kind(full_path.into(), true)
    }

    /// Builds a directory entry; the root is named `""`.
    pub fn directory(full_path: impl Into<String>) -> Self {
        Self::with_kind(full_path.into(), false)
    }

    /// The filesystem root directory.
    pub fn root() -> Self {
        Self::directory("/")
    }

    fn with_kind(full_path: String, is_file: bool) -> Self {
        let name = full_path
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            is_file,
            is_directory: !is_file,
            name,
            full_path,
        }
    }
}

/// Result of `requestFileSystem`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub fs_type: String,
    pub root: Entry,
}

/// Result of `getMetadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub modification_time: DateTime<Utc>,
    pub size: u64,
}

/// Lookup flags for `getFile` / `getDirectory`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags {
    #[serde(default)]
    pub create: bool,
    #[serde(default)]
    pub exclusive: bool,
}

/// Options for a `read` stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadOptions {
    /// Pause the stream after every chunk until the peer resumes it.
    #[serde(default)]
    pub autopause: bool,
    /// First byte offset to read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<u64>,
    /// Last byte offset to read (inclusive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<u64>,
}

/// Options for a `write` stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOptions {
    /// Byte offset to start writing at. When absent the file is truncated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<u64>,
}

/// A fetchable reference to a resource (`file:///…` or `http(s)://…`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}
