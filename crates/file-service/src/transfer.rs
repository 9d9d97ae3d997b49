//! Staged downloads.
//!
//! A download is fetched into the staging directory under a random name,
//! moved into place, and the result is relayed to the caller before any
//! cleanup runs. Cleanup is best effort and never reported.

use std::future::Future;
use std::sync::Arc;

use remotefs_protocol::constants::STAGING_DIR;
use remotefs_protocol::{Entry, Flags, Link};
use remotefs_vfs::{FileSystem, FsError};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Runs staged downloads against a [`FileSystem`].
///
/// Downloads may overlap. The number of downloads using the staging
/// directory is tracked under a lock that is also held while the directory
/// is created or removed, so the last download to finish removes it and
/// no download ever sees it vanish mid-transfer.
pub struct TransferOrchestrator<F: FileSystem> {
    fs: Arc<F>,
    staging_users: Mutex<usize>,
}

impl<F: FileSystem> TransferOrchestrator<F> {
    pub fn new(fs: Arc<F>) -> Self {
        Self {
            fs,
            staging_users: Mutex::new(0),
        }
    }

    /// Downloads `link` to `parent/name`.
    ///
    /// `relay` receives the outcome exactly once: the first failure of the
    /// setup or fetch steps, or the result of the final move. Cleanup only
    /// starts after the future `relay` returned has completed.
    pub async fn download<R, Fut>(&self, link: Link, parent: Entry, name: String, relay: R)
    where
        R: FnOnce(Result<Entry, FsError>) -> Fut + Send,
        Fut: Future<Output = ()> + Send,
    {
        let staging = match self.acquire_staging().await {
            Ok(dir) => dir,
            Err(e) => return relay(Err(e)).await,
        };

        let staged_name = uuid::Uuid::new_v4().to_string();
        debug!(href = %link.href, staged = %staged_name, "fetching into staging directory");
        let staged = match self.fs.download(link, staging.clone(), staged_name).await {
            Ok(entry) => entry,
            Err(e) => {
                relay(Err(e)).await;
                self.release_staging(&staging, None).await;
                return;
            }
        };

        let moved = self.fs.move_to(staged.clone(), parent, Some(name)).await;
        let leftover = moved.is_err().then_some(staged);
        if let Ok(entry) = &moved {
            info!(path = %entry.full_path, "download complete");
        }
        relay(moved).await;

        self.release_staging(&staging, leftover).await;
    }

    /// Removes the staging directory unless a download is using it.
    ///
    /// Every step is best effort; failures are logged at debug level.
    pub async fn purge(&self) {
        let users = self.staging_users.lock().await;
        if *users > 0 {
            debug!(users = *users, "staging directory in use, skipping purge");
            return;
        }

        let info = match self.fs.request_file_system().await {
            Ok(info) => info,
            Err(e) => {
                debug!(error = %e, "staging purge: filesystem unavailable");
                return;
            }
        };
        let staging = match self
            .fs
            .get_directory(info.root, STAGING_DIR.to_string(), Flags::default())
            .await
        {
            Ok(dir) => dir,
            Err(e) => {
                debug!(error = %e, "staging purge: no staging directory");
                return;
            }
        };
        match self.fs.remove_recursively(staging).await {
            Ok(()) => info!("purged staging directory"),
            Err(e) => debug!(error = %e, "staging purge failed"),
        }
        drop(users);
    }

    /// Number of downloads currently holding the staging directory.
    pub async fn in_flight(&self) -> usize {
        *self.staging_users.lock().await
    }

    async fn acquire_staging(&self) -> Result<Entry, FsError> {
        let mut users = self.staging_users.lock().await;
        let info = self.fs.request_file_system().await?;
        let create = Flags {
            create: true,
            exclusive: false,
        };
        let staging = self
            .fs
            .get_directory(info.root, STAGING_DIR.to_string(), create)
            .await?;
        *users += 1;
        Ok(staging)
    }

    /// Drops this download's hold on the staging directory.
    ///
    /// The last holder removes the whole directory; an earlier holder only
    /// removes its own `leftover` entry.
    async fn release_staging(&self, staging: &Entry, leftover: Option<Entry>) {
        let mut users = self.staging_users.lock().await;
        *users = users.saturating_sub(1);

        if *users == 0 {
            if let Err(e) = self.fs.remove_recursively(staging.clone()).await {
                debug!(error = %e, "staging cleanup failed");
            }
        } else if let Some(entry) = leftover {
            if let Err(e) = self.fs.remove(entry).await {
                debug!(error = %e, "staged entry cleanup failed");
            }
        }
    }
}
