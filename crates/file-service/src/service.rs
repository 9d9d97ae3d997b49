//! The service facade: one [`FileSystem`] call per inbound method.

use std::sync::Arc;

use remotefs_protocol::messages::{
    DownloadParams, EntryParams, LookupParams, ReadParams, TransferParams, TruncateParams,
    WriteParams,
};
use remotefs_protocol::{Message, RpcError};
use remotefs_rpc_server::{Handler, HandlerFuture, PeerMeta, Sender};
use remotefs_vfs::{FileSystem, FsError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::port::{ReadPort, WritePort};
use crate::transfer::TransferOrchestrator;

/// Serves a [`FileSystem`] to RPC peers.
///
/// Creating the service schedules a best-effort purge of the staging
/// directory left behind by earlier runs.
pub struct FileService<F: FileSystem> {
    fs: Arc<F>,
    transfers: Arc<TransferOrchestrator<F>>,
}

impl<F: FileSystem> FileService<F> {
    pub fn new(fs: Arc<F>) -> Self {
        let transfers = Arc::new(TransferOrchestrator::new(Arc::clone(&fs)));

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let sweep = Arc::clone(&transfers);
                runtime.spawn(async move { sweep.purge().await });
            }
            Err(_) => debug!("no runtime, skipping staging purge"),
        }

        Self { fs, transfers }
    }

    pub fn file_system(&self) -> &Arc<F> {
        &self.fs
    }

    pub fn transfers(&self) -> &Arc<TransferOrchestrator<F>> {
        &self.transfers
    }
}

/// Parses the request payload, answering `SyntaxError` when it is missing
/// or malformed.
async fn params<T: DeserializeOwned>(sender: &Sender, msg: &Message) -> Option<T> {
    let err = match msg.parse_payload::<T>() {
        Ok(Some(p)) => return Some(p),
        Ok(None) => RpcError::syntax("missing payload"),
        Err(e) => RpcError::syntax(e.to_string()),
    };
    if sender.send_error(msg, err).await.is_err() {
        debug!(id = %msg.id, "reply dropped");
    }
    None
}

async fn reply<T: Serialize>(sender: &Sender, msg: &Message, result: Result<T, FsError>) {
    let sent = match result {
        Ok(value) => sender.send_result(msg, Some(&value)).await,
        Err(e) => {
            debug!(id = %msg.id, msg_type = ?msg.msg_type, error = %e, "request failed");
            sender.send_error(msg, e.to_rpc_error()).await
        }
    };
    if sent.is_err() {
        debug!(id = %msg.id, "reply dropped");
    }
}

async fn reply_empty(sender: &Sender, msg: &Message, result: Result<(), FsError>) {
    let sent = match result {
        Ok(()) => sender.send_result::<()>(msg, None).await,
        Err(e) => {
            debug!(id = %msg.id, msg_type = ?msg.msg_type, error = %e, "request failed");
            sender.send_error(msg, e.to_rpc_error()).await
        }
    };
    if sent.is_err() {
        debug!(id = %msg.id, "reply dropped");
    }
}

impl<F: FileSystem> Handler for FileService<F> {
    fn on_request_file_system(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        // Requested type and size are ignored: there is one filesystem.
        Box::pin(async move {
            reply(&sender, &msg, self.fs.request_file_system().await).await;
        })
    }

    fn on_resolve_local_file_system_url(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let err = RpcError::not_supported("resolveLocalFileSystemURL");
            let _ = sender.send_error(&msg, err).await;
        })
    }

    fn on_get_metadata(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let Some(p) = params::<EntryParams>(&sender, &msg).await else {
                return;
            };
            reply(&sender, &msg, self.fs.get_metadata(p.entry).await).await;
        })
    }

    fn on_move_to(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let Some(p) = params::<TransferParams>(&sender, &msg).await else {
                return;
            };
            reply(&sender, &msg, self.fs.move_to(p.source, p.parent, p.new_name).await).await;
        })
    }

    fn on_copy_to(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let Some(p) = params::<TransferParams>(&sender, &msg).await else {
                return;
            };
            reply(&sender, &msg, self.fs.copy_to(p.source, p.parent, p.new_name).await).await;
        })
    }

    fn on_remove(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let Some(p) = params::<EntryParams>(&sender, &msg).await else {
                return;
            };
            reply_empty(&sender, &msg, self.fs.remove(p.entry).await).await;
        })
    }

    fn on_get_parent(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let Some(p) = params::<EntryParams>(&sender, &msg).await else {
                return;
            };
            reply(&sender, &msg, self.fs.get_parent(p.entry).await).await;
        })
    }

    fn on_get_file(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let Some(p) = params::<LookupParams>(&sender, &msg).await else {
                return;
            };
            let flags = p.options.unwrap_or_default();
            reply(&sender, &msg, self.fs.get_file(p.entry, p.path, flags).await).await;
        })
    }

    fn on_get_link(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let Some(p) = params::<EntryParams>(&sender, &msg).await else {
                return;
            };
            reply(&sender, &msg, self.fs.get_link(p.entry).await).await;
        })
    }

    fn on_truncate(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let Some(p) = params::<TruncateParams>(&sender, &msg).await else {
                return;
            };
            reply_empty(&sender, &msg, self.fs.truncate(p.entry, p.size).await).await;
        })
    }

    fn on_get_directory(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let Some(p) = params::<LookupParams>(&sender, &msg).await else {
                return;
            };
            let flags = p.options.unwrap_or_default();
            reply(&sender, &msg, self.fs.get_directory(p.entry, p.path, flags).await).await;
        })
    }

    fn on_remove_recursively(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let Some(p) = params::<EntryParams>(&sender, &msg).await else {
                return;
            };
            reply_empty(&sender, &msg, self.fs.remove_recursively(p.entry).await).await;
        })
    }

    fn on_read_entries(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let Some(p) = params::<EntryParams>(&sender, &msg).await else {
                return;
            };
            reply(&sender, &msg, self.fs.read_entries(p.entry).await).await;
        })
    }

    fn on_read(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let Some(p) = params::<ReadParams>(&sender, &msg).await else {
                return;
            };
            let autopause = p.options.autopause;
            match self.fs.create_read_stream(p.entry, p.options).await {
                Ok(stream) => ReadPort::new(sender, msg.id, stream, autopause).run().await,
                Err(e) => {
                    debug!(id = %msg.id, error = %e, "failed to open read stream");
                    let _ = sender.send_error(&msg, e.to_rpc_error()).await;
                }
            }
        })
    }

    fn on_write(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let Some(p) = params::<WriteParams>(&sender, &msg).await else {
                return;
            };
            match self.fs.create_write_stream(p.entry, p.options).await {
                Ok(stream) => WritePort::new(sender, msg.id, stream).run().await,
                Err(e) => {
                    debug!(id = %msg.id, error = %e, "failed to open write stream");
                    let _ = sender.send_error(&msg, e.to_rpc_error()).await;
                }
            }
        })
    }

    fn on_download(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let Some(p) = params::<DownloadParams>(&sender, &msg).await else {
                return;
            };
            let (sender, msg) = (&sender, &msg);
            self.transfers
                .download(p.link, p.parent, p.name, move |result| async move {
                    reply(sender, msg, result).await
                })
                .await;
        })
    }

    fn on_peer_disconnected(&self, peer: PeerMeta) -> HandlerFuture<'_> {
        Box::pin(async move {
            debug!(peer = peer.id, "peer ports released");
        })
    }
}
