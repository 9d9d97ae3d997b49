//! The filesystem collaborator contract.

use std::future::Future;
use std::pin::Pin;

use remotefs_protocol::{Entry, FileSystemInfo, Flags, Link, Metadata, ReadOptions, WriteOptions};

use crate::error::FsError;
use crate::stream::{ReadStream, WriteStream};

/// Boxed future returned by every [`FileSystem`] operation.
pub type VfsFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, FsError>> + Send + 'a>>;

/// Abstract filesystem served to the peer.
///
/// The file service forwards each inbound method to exactly one of these
/// operations. Implementations decide the policies (overwrite on move,
/// flag handling) and report failures as [`FsError`], which is relayed to
/// the peer unchanged. Using a trait keeps the service independent of
/// storage and testable with wrappers.
pub trait FileSystem: Send + Sync + 'static {
    /// Describes the filesystem and returns its root directory.
    fn request_file_system(&self) -> VfsFuture<'_, FileSystemInfo>;

    fn get_metadata(&self, entry: Entry) -> VfsFuture<'_, Metadata>;

    /// Moves `source` into `parent`, optionally renaming it.
    fn move_to(
        &self,
        source: Entry,
        parent: Entry,
        new_name: Option<String>,
    ) -> VfsFuture<'_, Entry>;

    /// Copies `source` into `parent`, optionally renaming it. Directories
    /// are copied recursively.
    fn copy_to(
        &self,
        source: Entry,
        parent: Entry,
        new_name: Option<String>,
    ) -> VfsFuture<'_, Entry>;

    /// Removes a file or an empty directory.
    fn remove(&self, entry: Entry) -> VfsFuture<'_, ()>;

    fn get_parent(&self, entry: Entry) -> VfsFuture<'_, Entry>;

    /// Looks up (or creates, per `flags`) a file relative to `entry`.
    fn get_file(&self, entry: Entry, path: String, flags: Flags) -> VfsFuture<'_, Entry>;

    /// Looks up (or creates, per `flags`) a directory relative to `entry`.
    fn get_directory(&self, entry: Entry, path: String, flags: Flags) -> VfsFuture<'_, Entry>;

    fn get_link(&self, entry: Entry) -> VfsFuture<'_, Link>;

    fn truncate(&self, entry: Entry, size: u64) -> VfsFuture<'_, ()>;

    fn remove_recursively(&self, entry: Entry) -> VfsFuture<'_, ()>;

    fn read_entries(&self, entry: Entry) -> VfsFuture<'_, Vec<Entry>>;

    /// Opens a byte stream over a file. A failure here means no stream
    /// exists and no events will follow.
    fn create_read_stream(&self, entry: Entry, options: ReadOptions) -> VfsFuture<'_, ReadStream>;

    /// Opens a byte sink over a file.
    fn create_write_stream(
        &self,
        entry: Entry,
        options: WriteOptions,
    ) -> VfsFuture<'_, WriteStream>;

    /// Fetches `link` into `parent` under `name` and returns the new entry.
    fn download(&self, link: Link, parent: Entry, name: String) -> VfsFuture<'_, Entry>;
}
