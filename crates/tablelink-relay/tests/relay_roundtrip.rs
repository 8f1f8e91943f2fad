//! End-to-end: a session transport talking to a live relay.

use std::time::Duration;
use tablelink_core::glam::Vec3;
use tablelink_core::{LinkTransport, LinkUpdate, LinkedMem, RelayTransport, WideEncoding};
use tablelink_relay::{MemorySink, Relay};
use tokio::net::TcpListener;

async fn wait_for_writes(sink: &MemorySink, count: u64) {
    for _ in 0..200 {
        if sink.write_count() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn wait_for_clients(relay: &Relay, count: usize) {
    for _ in 0..200 {
        if relay.client_count() == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn transport_updates_reach_the_sink() {
    let _ = env_logger::builder().is_test(true).try_init();

    let sink = MemorySink::new();
    let relay = Relay::new(Box::new(sink.clone()), WideEncoding::Utf16).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let server = tokio::spawn(relay.clone().serve_listener(listener));

    let sent = tokio::task::spawn_blocking(move || {
        let mut transport = RelayTransport::new(url);
        transport.connect().unwrap();

        transport.send(&LinkUpdate {
            version: Some(2),
            avatar_position: Some(Vec3::new(-35.0, 0.0, -35.0)),
            avatar_front: Some(Vec3::Z),
            avatar_top: Some(Vec3::Y),
            name: Some("Alice".to_string()),
            ..Default::default()
        });
        transport.send(&LinkUpdate::context(br#"{"world":"Greyhawk","scene":"scene-1"}"#.to_vec()));
        transport.send(&LinkUpdate::identity(r#"{"name":"Alice"}"#));

        let sent = transport.sent_count();
        transport.close();
        sent
    })
    .await
    .unwrap();
    assert_eq!(sent, 3);

    wait_for_writes(&sink, 3).await;
    assert_eq!(sink.write_count(), 3);

    let frame = sink.last_frame().unwrap();
    let mem = LinkedMem::decode(&frame, WideEncoding::Utf16).unwrap();
    assert_eq!(mem.tick, 3);
    assert_eq!(mem.name, "Alice");
    assert_eq!(mem.avatar_position, Vec3::new(-35.0, 0.0, -35.0));
    assert_eq!(mem.camera_position, mem.avatar_position);
    assert_eq!(mem.identity, r#"{"name":"Alice"}"#);
    assert_eq!(mem.context, br#"{"world":"Greyhawk","scene":"scene-1"}"#.to_vec());

    wait_for_clients(&relay, 0).await;
    assert_eq!(relay.client_count(), 0);

    server.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invalid_messages_keep_the_connection_open() {
    let sink = MemorySink::new();
    let relay = Relay::new(Box::new(sink.clone()), WideEncoding::Utf32).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let server = tokio::spawn(relay.clone().serve_listener(listener));

    tokio::task::spawn_blocking(move || {
        let (mut socket, _) = tungstenite::connect(url.as_str()).unwrap();
        socket
            .send(tungstenite::Message::Text("{not json".to_string()))
            .unwrap();
        socket
            .send(tungstenite::Message::Text(r#"{"name":"Bob"}"#.to_string()))
            .unwrap();
        let _ = socket.close(None);
        let _ = socket.flush();
    })
    .await
    .unwrap();

    wait_for_writes(&sink, 1).await;
    assert_eq!(sink.write_count(), 1);
    assert_eq!(relay.snapshot().name, "Bob");

    server.abort();
}
