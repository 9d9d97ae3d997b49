//! Wires the filesystem, the service and the RPC server together.

use std::sync::Arc;
use std::time::Duration;

use remotefs_file_service::FileService;
use remotefs_rpc_server::{RpcServer, ServerConfig};
use remotefs_vfs::LocalFileSystem;

use crate::config::Config;

/// Serves `config.root` until SIGINT or a server failure.
pub async fn run(config: Config) -> anyhow::Result<()> {
    if !config.root.is_dir() {
        anyhow::bail!("served root {} is not a directory", config.root.display());
    }

    let fs = LocalFileSystem::new(config.name.clone(), config.root.clone())
        .with_read_buffer_size(config.read_buffer_size)
        .with_write_high_water_mark(config.write_high_water_mark);
    let service = FileService::new(Arc::new(fs));

    let server_config = ServerConfig {
        bind: config.bind,
        port: config.port,
    };
    let server = RpcServer::new(server_config, service);
    let server_run = Arc::clone(&server);
    let mut serving = tokio::spawn(async move { server_run.run().await });

    // Wait for the server to bind.
    let port = loop {
        let p = server.port().await;
        if p > 0 {
            break p;
        }
        if serving.is_finished() {
            break 0;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    };
    if port > 0 {
        tracing::info!(bind = %config.bind, port, "agent ready");
    }

    tokio::select! {
        result = &mut serving => {
            result??;
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("SIGINT received, shutting down");
        }
    }

    server.shutdown();
    serving.await??;
    Ok(())
}
