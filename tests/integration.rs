//! End-to-end tests over real WebSocket connections.
//!
//! Each test starts a server on an ephemeral port and drives it with
//! tokio-tungstenite clients.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use hub_chat::{ChatHub, ChatServer, CircleId, InMemoryMessageStore, NewMessage, ServerConfig};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Duration};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Hub = Arc<ChatHub<InMemoryMessageStore>>;

/// Start a server on a free port, return its WebSocket URL and hub.
async fn start_server(config: ServerConfig) -> (String, Hub) {
    let hub = Arc::new(ChatHub::new(InMemoryMessageStore::new()));
    let server = ChatServer::new(
        config.bind("127.0.0.1:0".parse().unwrap()),
        Arc::clone(&hub),
    );

    let listener = server.bind().await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        server.serve(listener).await.unwrap();
    });

    (format!("ws://127.0.0.1:{port}/ws"), hub)
}

async fn connect(url: &str) -> Client {
    let (ws, _) = timeout(Duration::from_secs(2), connect_async(url))
        .await
        .expect("connect timed out")
        .expect("connect failed");
    ws
}

async fn join(ws: &mut Client, circle: &str) {
    let frame = format!(r#"{{"type":"join","circleId":"{circle}"}}"#);
    ws.send(Message::text(frame)).await.unwrap();
}

/// Wait until `n` connections are interested in `circle`.
async fn wait_for_interest(hub: &Hub, circle: &str, n: usize) {
    let circle = CircleId::new(circle);
    timeout(Duration::from_secs(2), async {
        while hub.registry().interested_in(&circle).await.len() != n {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("interest not registered");
}

async fn wait_for_connections(hub: &Hub, n: usize) {
    timeout(Duration::from_secs(2), async {
        while hub.registry().connection_count().await != n {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("connection count not reached");
}

/// Next text frame as JSON, or `None` if nothing arrives within `wait`.
async fn next_push(ws: &mut Client, wait: Duration) -> Option<Value> {
    timeout(wait, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Some(serde_json::from_str::<Value>(text.as_str()).unwrap());
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                _ => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

async fn expect_push(ws: &mut Client) -> Value {
    next_push(ws, Duration::from_secs(2))
        .await
        .expect("expected a push")
}

#[tokio::test]
async fn test_push_frame_shape() {
    let (url, hub) = start_server(ServerConfig::default()).await;
    let mut ws = connect(&url).await;
    join(&mut ws, "c1").await;
    wait_for_interest(&hub, "c1", 1).await;

    let stored = hub
        .post_message(NewMessage::new("c1", "u1", "hello"))
        .await
        .unwrap();

    let push = expect_push(&mut ws).await;
    assert_eq!(push["type"], "message");
    assert_eq!(push["circleId"], "c1");
    assert_eq!(push["message"]["id"], stored.id.as_str());
    assert_eq!(push["message"]["circleId"], "c1");
    assert_eq!(push["message"]["senderId"], "u1");
    assert_eq!(push["message"]["content"], "hello");
    assert!(push["message"]["createdAt"].is_string());
}

#[tokio::test]
async fn test_circles_are_isolated() {
    let (url, hub) = start_server(ServerConfig::default()).await;
    let mut a = connect(&url).await;
    let mut b = connect(&url).await;

    join(&mut a, "c1").await;
    join(&mut b, "c2").await;
    wait_for_interest(&hub, "c1", 1).await;
    wait_for_interest(&hub, "c2", 1).await;

    hub.post_message(NewMessage::new("c1", "u1", "for c1"))
        .await
        .unwrap();

    let push = expect_push(&mut a).await;
    assert_eq!(push["message"]["content"], "for c1");
    assert!(next_push(&mut b, Duration::from_millis(200)).await.is_none());
}

#[tokio::test]
async fn test_unjoined_connection_receives_nothing() {
    let (url, hub) = start_server(ServerConfig::default()).await;
    let mut ws = connect(&url).await;
    wait_for_connections(&hub, 1).await;

    hub.post_message(NewMessage::new("c1", "u1", "hello"))
        .await
        .unwrap();

    assert!(next_push(&mut ws, Duration::from_millis(200)).await.is_none());
}

#[tokio::test]
async fn test_joins_are_additive() {
    let (url, hub) = start_server(ServerConfig::default()).await;
    let mut ws = connect(&url).await;

    join(&mut ws, "c1").await;
    join(&mut ws, "c2").await;
    wait_for_interest(&hub, "c2", 1).await;
    wait_for_interest(&hub, "c1", 1).await;

    hub.post_message(NewMessage::new("c1", "u1", "one"))
        .await
        .unwrap();
    hub.post_message(NewMessage::new("c2", "u2", "two"))
        .await
        .unwrap();

    assert_eq!(expect_push(&mut ws).await["circleId"], "c1");
    assert_eq!(expect_push(&mut ws).await["circleId"], "c2");
}

#[tokio::test]
async fn test_closed_connection_is_removed() {
    let (url, hub) = start_server(ServerConfig::default()).await;
    let mut ws = connect(&url).await;
    join(&mut ws, "c1").await;
    wait_for_interest(&hub, "c1", 1).await;

    ws.close(None).await.unwrap();
    wait_for_connections(&hub, 0).await;
    assert!(hub
        .registry()
        .interested_in(&CircleId::new("c1"))
        .await
        .is_empty());

    hub.post_message(NewMessage::new("c1", "u1", "after close"))
        .await
        .unwrap();
    sleep(Duration::from_millis(50)).await;

    let stats = hub.stats();
    assert_eq!(stats.deliveries, 0);
    assert_eq!(stats.delivery_failures, 0);
    assert_eq!(stats.active_connections, 0);
}

#[tokio::test]
async fn test_dropped_client_is_removed() {
    let (url, hub) = start_server(ServerConfig::default()).await;
    let mut ws = connect(&url).await;
    join(&mut ws, "c1").await;
    wait_for_interest(&hub, "c1", 1).await;

    // No close handshake
    drop(ws);
    wait_for_connections(&hub, 0).await;
}

#[tokio::test]
async fn test_malformed_frames_keep_connection_open() {
    let (url, hub) = start_server(ServerConfig::default()).await;
    let mut ws = connect(&url).await;

    ws.send(Message::text("not json")).await.unwrap();
    ws.send(Message::text(r#"{"type":"join"}"#)).await.unwrap();
    ws.send(Message::text(r#"{"type":"leave","circleId":"c1"}"#))
        .await
        .unwrap();
    ws.send(Message::binary(vec![1u8, 2, 3])).await.unwrap();
    join(&mut ws, "c1").await;
    wait_for_interest(&hub, "c1", 1).await;

    hub.post_message(NewMessage::new("c1", "u1", "still here"))
        .await
        .unwrap();
    assert_eq!(
        expect_push(&mut ws).await["message"]["content"],
        "still here"
    );

    let stats = hub.stats();
    assert_eq!(stats.frames_received, 5);
    assert_eq!(stats.frames_dropped, 4);
}

#[tokio::test]
async fn test_binary_join_frame() {
    let (url, hub) = start_server(ServerConfig::default()).await;
    let mut ws = connect(&url).await;

    ws.send(Message::binary(
        br#"{"type":"join","circleId":"c1"}"#.to_vec(),
    ))
    .await
    .unwrap();
    wait_for_interest(&hub, "c1", 1).await;

    hub.post_message(NewMessage::new("c1", "u1", "via binary join"))
        .await
        .unwrap();
    assert_eq!(
        expect_push(&mut ws).await["message"]["content"],
        "via binary join"
    );
}

#[tokio::test]
async fn test_upgrade_on_wrong_path_is_rejected() {
    let (url, hub) = start_server(ServerConfig::default()).await;
    let root = url.trim_end_matches("/ws").to_string();

    let result = timeout(Duration::from_secs(2), connect_async(&root))
        .await
        .expect("rejection timed out");
    match result {
        Err(WsError::Http(response)) => assert_eq!(response.status(), StatusCode::NOT_FOUND),
        Err(e) => panic!("expected a 404, got {e}"),
        Ok(_) => panic!("upgrade on wrong path was accepted"),
    }
    assert_eq!(hub.registry().connection_count().await, 0);
}

#[tokio::test]
async fn test_any_path_accepted_when_unchecked() {
    let (url, hub) = start_server(ServerConfig::default().any_path()).await;
    let other = url.replace("/ws", "/elsewhere");

    let _ws = connect(&other).await;
    wait_for_connections(&hub, 1).await;
}

#[tokio::test]
async fn test_pushes_arrive_in_commit_order() {
    let (url, hub) = start_server(ServerConfig::default()).await;
    let mut a = connect(&url).await;
    let mut b = connect(&url).await;
    join(&mut a, "c1").await;
    join(&mut b, "c1").await;
    wait_for_interest(&hub, "c1", 2).await;

    let mut posted = Vec::new();
    for i in 0..20 {
        let message = hub
            .post_message(NewMessage::new("c1", "u1", format!("m{i}")))
            .await
            .unwrap();
        posted.push(message.id.to_string());
    }

    for ws in [&mut a, &mut b] {
        let mut received = Vec::new();
        for _ in 0..20 {
            let push = expect_push(ws).await;
            received.push(push["message"]["id"].as_str().unwrap().to_string());
        }
        assert_eq!(received, posted);
    }
}

#[tokio::test]
async fn test_connection_limit() {
    let (url, hub) = start_server(ServerConfig::default().max_connections(1)).await;
    let _first = connect(&url).await;
    wait_for_connections(&hub, 1).await;

    let second = timeout(Duration::from_secs(2), connect_async(&url))
        .await
        .expect("rejection timed out");
    assert!(second.is_err());
    assert_eq!(hub.registry().connection_count().await, 1);
}

#[tokio::test]
async fn test_idle_timeout_closes_connection() {
    let config = ServerConfig::default()
        .ping_interval(Duration::ZERO)
        .idle_timeout(Duration::from_millis(100));
    let (url, hub) = start_server(config).await;

    let mut ws = connect(&url).await;
    wait_for_connections(&hub, 1).await;

    let end = timeout(Duration::from_secs(2), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                _ => continue,
            }
        }
    })
    .await;
    assert!(end.is_ok());
    wait_for_connections(&hub, 0).await;
}
