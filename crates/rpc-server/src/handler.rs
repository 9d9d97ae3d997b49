//! Handler trait for processing peer requests.
//!
//! Implementors provide the filesystem semantics while the server framework
//! handles connection management, port routing and keep-alive.

use std::future::Future;
use std::pin::Pin;

use remotefs_protocol::{Message, MessageType, RpcError};

use crate::connection::{PeerMeta, Sender};

/// A boxed future returned by handler methods.
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

fn not_supported(sender: Sender, msg: Message) -> HandlerFuture<'static> {
    Box::pin(async move {
        let _ = sender
            .send_error(&msg, RpcError::not_supported("not implemented"))
            .await;
    })
}

/// Trait for handling requests from a peer.
///
/// The server dispatches each parsed request to the method matching its
/// `type`, on a task of its own. Each method receives:
/// - `sender`: channel to send replies and stream events back to the peer,
///   and access to the connection's port registry
/// - `msg`: the parsed JSON envelope
///
/// Default implementations reply with `NotSupportedError` so handlers only
/// need to override the methods they serve.
pub trait Handler: Send + Sync + 'static {
    /// `requestFileSystem`
    fn on_request_file_system(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        not_supported(sender, msg)
    }

    /// `resolveLocalFileSystemURL`
    fn on_resolve_local_file_system_url(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        not_supported(sender, msg)
    }

    /// `getMetadata`
    fn on_get_metadata(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        not_supported(sender, msg)
    }

    /// `moveTo`
    fn on_move_to(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        not_supported(sender, msg)
    }

    /// `copyTo`
    fn on_copy_to(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        not_supported(sender, msg)
    }

    /// `remove`
    fn on_remove(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        not_supported(sender, msg)
    }

    /// `getParent`
    fn on_get_parent(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        not_supported(sender, msg)
    }

    /// `getFile`
    fn on_get_file(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        not_supported(sender, msg)
    }

    /// `getLink`
    fn on_get_link(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        not_supported(sender, msg)
    }

    /// `truncate`
    fn on_truncate(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        not_supported(sender, msg)
    }

    /// `getDirectory`
    fn on_get_directory(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        not_supported(sender, msg)
    }

    /// `removeRecursively`
    fn on_remove_recursively(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        not_supported(sender, msg)
    }

    /// `readEntries`
    fn on_read_entries(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        not_supported(sender, msg)
    }

    /// `read`: opens a read stream and registers a port for it.
    fn on_read(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        not_supported(sender, msg)
    }

    /// `write`: opens a write stream and registers a port for it.
    fn on_write(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        not_supported(sender, msg)
    }

    /// `download`
    fn on_download(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        not_supported(sender, msg)
    }

    /// Called for `ping` messages.
    fn on_ping(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            if let Ok(reply) = msg.reply(MessageType::Pong, Option::<&()>::None) {
                let _ = sender.send_msg(reply);
            }
        })
    }

    /// Called once per connection after its port registry was cleared.
    fn on_peer_disconnected(&self, _peer: PeerMeta) -> HandlerFuture<'_> {
        Box::pin(async {})
    }
}
