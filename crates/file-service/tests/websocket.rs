use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use remotefs_file_service::FileService;
use remotefs_protocol::{Entry, ErrorName, Message, MessageType};
use remotefs_rpc_server::{RpcServer, ServerConfig};
use remotefs_vfs::LocalFileSystem;
use serde_json::json;
use tokio_tungstenite::tungstenite::Message as WsMessage;

type Ws = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn start(
    root: &std::path::Path,
) -> (
    Arc<RpcServer<FileService<LocalFileSystem>>>,
    tokio::task::JoinHandle<()>,
    String,
) {
    let fs = LocalFileSystem::new("e2e", root).with_read_buffer_size(3);
    let config = ServerConfig {
        bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
    };
    let server = RpcServer::new(config, FileService::new(Arc::new(fs)));
    let runner = Arc::clone(&server);
    let handle = tokio::spawn(async move {
        runner.run().await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    let url = format!("ws://127.0.0.1:{}", server.port().await);
    (server, handle, url)
}

async fn send(ws: &mut Ws, value: serde_json::Value) {
    ws.send(WsMessage::Text(value.to_string().into())).await.unwrap();
}

async fn recv(ws: &mut Ws) -> Message {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out")
            .unwrap()
            .unwrap();
        if let WsMessage::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn reads_a_file_over_websocket() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("hello.txt"), b"hello").unwrap();
    let (server, handle, url) = start(dir.path()).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();

    send(&mut ws, json!({ "id": "1", "type": "requestFileSystem", "payload": {} })).await;
    let reply = recv(&mut ws).await;
    assert_eq!(reply.msg_type, MessageType::Result);

    send(
        &mut ws,
        json!({
            "id": "2",
            "type": "read",
            "payload": { "entry": Entry::file("/hello.txt") }
        }),
    )
    .await;

    let mut kinds = Vec::new();
    let mut data = String::new();
    loop {
        let msg = recv(&mut ws).await;
        assert_eq!(msg.id, "2");
        if msg.msg_type == MessageType::Data {
            let payload: serde_json::Value = msg.parse_payload().unwrap().unwrap();
            data.push_str(payload["data"].as_str().unwrap());
        }
        let done = msg.msg_type == MessageType::Close;
        kinds.push(msg.msg_type);
        if done {
            break;
        }
    }
    assert_eq!(
        kinds,
        vec![
            MessageType::Ref,
            MessageType::Open,
            MessageType::Data,
            MessageType::Data,
            MessageType::End,
            MessageType::Close,
        ]
    );
    assert_eq!(data, "68656c6c6f");

    drop(ws);
    server.shutdown();
    handle.await.unwrap();
}

#[tokio::test]
async fn writes_a_file_over_websocket() {
    let dir = tempfile::tempdir().unwrap();
    let (server, handle, url) = start(dir.path()).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();

    send(
        &mut ws,
        json!({
            "id": "w",
            "type": "write",
            "payload": { "entry": Entry::file("/out.txt") }
        }),
    )
    .await;
    let announce = recv(&mut ws).await;
    assert_eq!(announce.msg_type, MessageType::Ref);
    let port: serde_json::Value = announce.parse_payload().unwrap().unwrap();
    let port = port["port"].as_str().unwrap().to_string();
    assert_eq!(recv(&mut ws).await.msg_type, MessageType::Open);

    send(
        &mut ws,
        json!({ "id": "c1", "type": "write", "port": port, "payload": { "data": "6869" } }),
    )
    .await;
    let ack = recv(&mut ws).await;
    assert_eq!(ack.id, "c1");
    assert_eq!(ack.msg_type, MessageType::Result);

    send(&mut ws, json!({ "id": "c2", "type": "end", "port": port })).await;
    let mut seen_ack = false;
    let mut seen_close = false;
    while !(seen_ack && seen_close) {
        let msg = recv(&mut ws).await;
        match (msg.id.as_str(), &msg.msg_type) {
            ("c2", MessageType::Result) => seen_ack = true,
            ("w", MessageType::Close) => seen_close = true,
            other => panic!("unexpected message {other:?}"),
        }
    }
    assert_eq!(std::fs::read(dir.path().join("out.txt")).unwrap(), b"hi");

    send(&mut ws, json!({ "id": "c3", "type": "end", "port": port })).await;
    let late = recv(&mut ws).await;
    assert_eq!(late.id, "c3");
    assert_eq!(late.error.unwrap().name, ErrorName::InvalidState);

    drop(ws);
    server.shutdown();
    handle.await.unwrap();
}

#[tokio::test]
async fn resolve_url_is_rejected_over_websocket() {
    let dir = tempfile::tempdir().unwrap();
    let (server, handle, url) = start(dir.path()).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();

    send(
        &mut ws,
        json!({ "id": "u", "type": "resolveLocalFileSystemURL", "payload": { "url": "file:///" } }),
    )
    .await;
    let reply = recv(&mut ws).await;
    assert_eq!(reply.id, "u");
    assert_eq!(reply.error.unwrap().name, ErrorName::NotSupported);

    drop(ws);
    server.shutdown();
    handle.await.unwrap();
}
