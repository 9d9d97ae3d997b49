//! A [`FileSystem`] backed by a local directory.
//!
//! Virtual paths are resolved below the configured root; `..` can never
//! climb above it. Move, copy and lookup policies follow the W3C File API:
//! Directories and System conventions.

mod link;
mod read;
mod write;

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use remotefs_protocol::constants::{DEFAULT_READ_BUFFER_SIZE, DEFAULT_WRITE_HIGH_WATER_MARK};
use remotefs_protocol::{Entry, FileSystemInfo, Flags, Link, Metadata, ReadOptions, WriteOptions};
use tokio::io::AsyncSeekExt;
use tracing::{debug, info};

use crate::error::FsError;
use crate::fs::{FileSystem, VfsFuture};
use crate::path;
use crate::stream::{ReadStream, WriteStream};

use self::link::LinkSource;

/// Filesystem type reported by `requestFileSystem`.
pub const LOCAL_FS_TYPE: &str = "local";

/// Serves a local directory as a virtual filesystem.
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    name: String,
    root: PathBuf,
    http: reqwest::Client,
    read_buffer_size: usize,
    write_high_water_mark: usize,
}

impl LocalFileSystem {
    /// Creates a filesystem named `name` rooted at `root`.
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            http: reqwest::Client::new(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            write_high_water_mark: DEFAULT_WRITE_HIGH_WATER_MARK,
        }
    }

    /// Uses the given HTTP client for `http(s)://` downloads.
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Sets the chunk size of read streams.
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Sets the queued-bytes threshold after which write streams emit `drain`.
    pub fn with_write_high_water_mark(mut self, size: usize) -> Self {
        self.write_high_water_mark = size;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host directory backing the virtual root.
    pub fn root_dir(&self) -> &Path {
        &self.root
    }

    fn host_path(&self, virtual_path: &str) -> PathBuf {
        self.root.join(virtual_path.trim_start_matches('/'))
    }

    /// Normalizes an entry's path and maps it onto the host.
    fn resolve(&self, entry: &Entry) -> Result<(String, PathBuf), FsError> {
        let vpath = path::normalize(&entry.full_path)?;
        let host = self.host_path(&vpath);
        Ok((vpath, host))
    }

    async fn require_directory(&self, entry: &Entry) -> Result<(String, PathBuf), FsError> {
        let (vpath, host) = self.resolve(entry)?;
        let meta = stat(&host, &vpath).await?;
        if !meta.is_dir() {
            return Err(FsError::TypeMismatch(format!("not a directory: {vpath}")));
        }
        Ok((vpath, host))
    }

    async fn lookup(
        &self,
        entry: Entry,
        rel: String,
        flags: Flags,
        want_dir: bool,
    ) -> Result<Entry, FsError> {
        let (base, _) = self.require_directory(&entry).await?;
        let vpath = path::join(&base, &rel)?;
        let host = self.host_path(&vpath);

        match tokio::fs::metadata(&host).await {
            Ok(meta) => {
                if flags.create && flags.exclusive {
                    return Err(FsError::PathExists(vpath));
                }
                if meta.is_dir() != want_dir {
                    return Err(FsError::TypeMismatch(vpath));
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if !flags.create {
                    return Err(FsError::NotFound(vpath));
                }
                if want_dir {
                    tokio::fs::create_dir(&host).await?;
                } else {
                    tokio::fs::OpenOptions::new()
                        .write(true)
                        .create_new(true)
                        .open(&host)
                        .await?;
                }
                debug!(path = %vpath, directory = want_dir, "created entry");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(make_entry(vpath, want_dir))
    }

    /// Validates a move or copy and returns the source and destination.
    async fn plan_transfer(
        &self,
        source: &Entry,
        parent: &Entry,
        new_name: Option<String>,
    ) -> Result<TransferPlan, FsError> {
        let (src_v, src_host) = self.resolve(source)?;
        if src_v == "/" {
            return Err(FsError::InvalidModification(
                "cannot move or copy the root".into(),
            ));
        }
        let src_meta = stat(&src_host, &src_v).await?;
        let (parent_v, _) = self.require_directory(parent).await?;

        let name = match new_name.filter(|n| !n.is_empty()) {
            Some(n) => n,
            None => file_name(&src_v).to_string(),
        };
        path::validate_name(&name)?;

        let dest_v = path::join(&parent_v, &name)?;
        if dest_v == src_v {
            return Err(FsError::InvalidModification(format!(
                "source and destination are the same: {src_v}"
            )));
        }
        let is_dir = src_meta.is_dir();
        if is_dir && path::is_descendant(&dest_v, &src_v) {
            return Err(FsError::InvalidModification(format!(
                "cannot place {src_v} inside itself"
            )));
        }

        let dest_host = self.host_path(&dest_v);
        let mut replaces_dir = false;
        match tokio::fs::metadata(&dest_host).await {
            Ok(dest_meta) => {
                if dest_meta.is_dir() != is_dir {
                    return Err(FsError::InvalidModification(format!(
                        "destination exists with a different type: {dest_v}"
                    )));
                }
                if dest_meta.is_dir() {
                    if !is_dir_empty(&dest_host).await? {
                        return Err(FsError::InvalidModification(format!(
                            "destination directory is not empty: {dest_v}"
                        )));
                    }
                    replaces_dir = true;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        Ok(TransferPlan {
            src_host,
            dest_v,
            dest_host,
            is_dir,
            replaces_dir,
        })
    }

    async fn do_move(
        &self,
        source: Entry,
        parent: Entry,
        new_name: Option<String>,
    ) -> Result<Entry, FsError> {
        let plan = self.plan_transfer(&source, &parent, new_name).await?;
        if plan.replaces_dir {
            tokio::fs::remove_dir(&plan.dest_host).await?;
        }
        tokio::fs::rename(&plan.src_host, &plan.dest_host).await?;
        debug!(from = %source.full_path, to = %plan.dest_v, "moved entry");
        Ok(make_entry(plan.dest_v, plan.is_dir))
    }

    async fn do_copy(
        &self,
        source: Entry,
        parent: Entry,
        new_name: Option<String>,
    ) -> Result<Entry, FsError> {
        let plan = self.plan_transfer(&source, &parent, new_name).await?;
        if plan.is_dir {
            copy_tree(&plan.src_host, &plan.dest_host).await?;
        } else {
            tokio::fs::copy(&plan.src_host, &plan.dest_host).await?;
        }
        debug!(from = %source.full_path, to = %plan.dest_v, "copied entry");
        Ok(make_entry(plan.dest_v, plan.is_dir))
    }

    async fn do_remove(&self, entry: Entry, recursive: bool) -> Result<(), FsError> {
        let (vpath, host) = self.resolve(&entry)?;
        if vpath == "/" {
            return Err(FsError::NoModificationAllowed(
                "cannot remove the root".into(),
            ));
        }
        let meta = stat(&host, &vpath).await?;
        match (meta.is_dir(), recursive) {
            (true, true) => tokio::fs::remove_dir_all(&host).await?,
            (true, false) => tokio::fs::remove_dir(&host).await?,
            (false, true) => {
                return Err(FsError::TypeMismatch(format!("not a directory: {vpath}")));
            }
            (false, false) => tokio::fs::remove_file(&host).await?,
        }
        debug!(path = %vpath, recursive, "removed entry");
        Ok(())
    }

    async fn do_read_entries(&self, entry: Entry) -> Result<Vec<Entry>, FsError> {
        let (vpath, host) = self.require_directory(&entry).await?;
        let mut dir = tokio::fs::read_dir(&host).await?;
        let mut entries = Vec::new();
        while let Some(child) = dir.next_entry().await? {
            let name = child.file_name().to_string_lossy().to_string();
            // Follow symlinks so that links report their target's kind.
            let is_dir = match tokio::fs::metadata(child.path()).await {
                Ok(meta) => meta.is_dir(),
                Err(_) => continue,
            };
            let child_v = path::join(&vpath, &name)?;
            entries.push(make_entry(child_v, is_dir));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn open_read(&self, entry: Entry, options: ReadOptions) -> Result<ReadStream, FsError> {
        let (vpath, host) = self.resolve(&entry)?;
        let meta = stat(&host, &vpath).await?;
        if meta.is_dir() {
            return Err(FsError::TypeMismatch(format!("not a file: {vpath}")));
        }

        let mut file = tokio::fs::File::open(&host).await?;
        let start = options.start.unwrap_or(0);
        if start > 0 {
            file.seek(SeekFrom::Start(start)).await?;
        }
        let limit = options.end.map(|end| {
            if end >= start {
                end - start + 1
            } else {
                0
            }
        });

        debug!(path = %vpath, start, ?limit, "opened read stream");
        Ok(read::spawn(file, limit, self.read_buffer_size))
    }

    async fn open_write(
        &self,
        entry: Entry,
        options: WriteOptions,
    ) -> Result<WriteStream, FsError> {
        let (vpath, host) = self.resolve(&entry)?;
        if let Ok(meta) = tokio::fs::metadata(&host).await {
            if meta.is_dir() {
                return Err(FsError::TypeMismatch(format!("not a file: {vpath}")));
            }
        }

        let mut opts = tokio::fs::OpenOptions::new();
        opts.write(true).create(true);
        if options.start.is_none() {
            opts.truncate(true);
        }
        let mut file = opts.open(&host).await?;
        if let Some(start) = options.start {
            file.seek(SeekFrom::Start(start)).await?;
        }

        debug!(path = %vpath, start = ?options.start, "opened write stream");
        Ok(write::spawn(file, self.write_high_water_mark))
    }

    async fn do_download(&self, link: Link, parent: Entry, name: String) -> Result<Entry, FsError> {
        path::validate_name(&name)?;
        let (parent_v, _) = self.require_directory(&parent).await?;
        let dest_v = path::join(&parent_v, &name)?;
        let dest_host = self.host_path(&dest_v);

        match link::classify(&link.href)? {
            LinkSource::Local(src) => {
                let src_v = path::normalize(&src)?;
                let src_host = self.host_path(&src_v);
                let meta = stat(&src_host, &src_v).await?;
                if meta.is_dir() {
                    return Err(FsError::TypeMismatch(format!("not a file: {src_v}")));
                }
                tokio::fs::copy(&src_host, &dest_host).await?;
            }
            LinkSource::Remote(url) => {
                link::fetch_http(&self.http, url, &dest_host).await?;
            }
        }

        info!(href = %link.href, path = %dest_v, "fetched link");
        Ok(Entry::file(dest_v))
    }
}

struct TransferPlan {
    src_host: PathBuf,
    dest_v: String,
    dest_host: PathBuf,
    is_dir: bool,
    replaces_dir: bool,
}

impl FileSystem for LocalFileSystem {
    fn request_file_system(&self) -> VfsFuture<'_, FileSystemInfo> {
        Box::pin(async move {
            let meta = stat(&self.root, "/").await?;
            if !meta.is_dir() {
                return Err(FsError::NotFound(format!(
                    "root is not a directory: {}",
                    self.root.display()
                )));
            }
            Ok(FileSystemInfo {
                name: self.name.clone(),
                fs_type: LOCAL_FS_TYPE.to_string(),
                root: Entry::root(),
            })
        })
    }

    fn get_metadata(&self, entry: Entry) -> VfsFuture<'_, Metadata> {
        Box::pin(async move {
            let (vpath, host) = self.resolve(&entry)?;
            let meta = stat(&host, &vpath).await?;
            let modified = meta.modified()?;
            Ok(Metadata {
                modification_time: DateTime::<Utc>::from(modified),
                size: if meta.is_file() { meta.len() } else { 0 },
            })
        })
    }

    fn move_to(
        &self,
        source: Entry,
        parent: Entry,
        new_name: Option<String>,
    ) -> VfsFuture<'_, Entry> {
        Box::pin(self.do_move(source, parent, new_name))
    }

    fn copy_to(
        &self,
        source: Entry,
        parent: Entry,
        new_name: Option<String>,
    ) -> VfsFuture<'_, Entry> {
        Box::pin(self.do_copy(source, parent, new_name))
    }

    fn remove(&self, entry: Entry) -> VfsFuture<'_, ()> {
        Box::pin(self.do_remove(entry, false))
    }

    fn get_parent(&self, entry: Entry) -> VfsFuture<'_, Entry> {
        Box::pin(async move {
            let (vpath, host) = self.resolve(&entry)?;
            stat(&host, &vpath).await?;
            Ok(Entry::directory(path::parent(&vpath)))
        })
    }

    fn get_file(&self, entry: Entry, path: String, flags: Flags) -> VfsFuture<'_, Entry> {
        Box::pin(self.lookup(entry, path, flags, false))
    }

    fn get_directory(&self, entry: Entry, path: String, flags: Flags) -> VfsFuture<'_, Entry> {
        Box::pin(self.lookup(entry, path, flags, true))
    }

    fn get_link(&self, entry: Entry) -> VfsFuture<'_, Link> {
        Box::pin(async move {
            let (vpath, host) = self.resolve(&entry)?;
            stat(&host, &vpath).await?;
            Ok(Link {
                href: link::file_href(&vpath),
                name: Some(file_name(&vpath).to_string()),
            })
        })
    }

    fn truncate(&self, entry: Entry, size: u64) -> VfsFuture<'_, ()> {
        Box::pin(async move {
            let (vpath, host) = self.resolve(&entry)?;
            let meta = stat(&host, &vpath).await?;
            if meta.is_dir() {
                return Err(FsError::TypeMismatch(format!("not a file: {vpath}")));
            }
            let file = tokio::fs::OpenOptions::new().write(true).open(&host).await?;
            file.set_len(size).await?;
            Ok(())
        })
    }

    fn remove_recursively(&self, entry: Entry) -> VfsFuture<'_, ()> {
        Box::pin(self.do_remove(entry, true))
    }

    fn read_entries(&self, entry: Entry) -> VfsFuture<'_, Vec<Entry>> {
        Box::pin(self.do_read_entries(entry))
    }

    fn create_read_stream(&self, entry: Entry, options: ReadOptions) -> VfsFuture<'_, ReadStream> {
        Box::pin(self.open_read(entry, options))
    }

    fn create_write_stream(
        &self,
        entry: Entry,
        options: WriteOptions,
    ) -> VfsFuture<'_, WriteStream> {
        Box::pin(self.open_write(entry, options))
    }

    fn download(&self, link: Link, parent: Entry, name: String) -> VfsFuture<'_, Entry> {
        Box::pin(self.do_download(link, parent, name))
    }
}

fn make_entry(vpath: String, is_dir: bool) -> Entry {
    if is_dir {
        Entry::directory(vpath)
    } else {
        Entry::file(vpath)
    }
}

fn file_name(vpath: &str) -> &str {
    vpath.rsplit('/').next().unwrap_or_default()
}

/// Stats `host`, reporting a missing entry by its virtual path.
async fn stat(host: &Path, vpath: &str) -> Result<std::fs::Metadata, FsError> {
    tokio::fs::metadata(host).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            FsError::NotFound(vpath.to_string())
        } else {
            e.into()
        }
    })
}

async fn is_dir_empty(dir: &Path) -> Result<bool, FsError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    Ok(entries.next_entry().await?.is_none())
}

async fn copy_tree(src: &Path, dest: &Path) -> Result<(), FsError> {
    let mut pending = vec![(src.to_path_buf(), dest.to_path_buf())];
    while let Some((from, to)) = pending.pop() {
        tokio::fs::create_dir_all(&to).await?;
        let mut dir = tokio::fs::read_dir(&from).await?;
        while let Some(child) = dir.next_entry().await? {
            let target = to.join(child.file_name());
            if child.file_type().await?.is_dir() {
                pending.push((child.path(), target));
            } else {
                tokio::fs::copy(child.path(), &target).await?;
            }
        }
    }
    Ok(())
}
