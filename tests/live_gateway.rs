//! End-to-end tests against a real server on a loopback port, using the
//! in-memory identity service and message store.

#![allow(clippy::panic, clippy::indexing_slicing)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use murmur_gateway::app_state::AppState;
use murmur_gateway::config::GatewayConfig;
use murmur_gateway::domain::Session;
use murmur_gateway::identity::{IdentityService, InMemoryIdentity};
use murmur_gateway::persistence::{InMemoryMessageStore, MessageStore};
use murmur_gateway::server::build_app;
use murmur_gateway::service::LivenessMonitor;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

struct TestServer {
    addr: SocketAddr,
    state: AppState,
    identity: Arc<InMemoryIdentity>,
}

impl TestServer {
    async fn start() -> Self {
        Self::start_with(GatewayConfig::default()).await
    }

    async fn start_with(config: GatewayConfig) -> Self {
        let identity = Arc::new(InMemoryIdentity::default());
        let store: Arc<dyn MessageStore> = Arc::new(InMemoryMessageStore::new());
        let state = AppState::new(
            config,
            Arc::clone(&identity) as Arc<dyn IdentityService>,
            store,
        );
        let app = build_app(state.clone());

        let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            panic!("failed to bind loopback listener");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("listener has no local address");
        };
        tokio::spawn(async move {
            let _ = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await;
        });

        Self {
            addr,
            state,
            identity,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    async fn session(&self, username: &str) -> Session {
        self.identity.issue_session(username, LOOPBACK).await
    }

    async fn open(&self) -> Client {
        let Ok((ws, _)) = connect_async(format!("ws://{}/live", self.addr)).await else {
            panic!("websocket handshake failed");
        };
        ws
    }

    /// Opens a socket and completes the `connect` handshake.
    async fn connect(&self, session: &Session, channels: &[&str]) -> Client {
        let mut ws = self.open().await;
        send(
            &mut ws,
            json!({
                "type": "connect",
                "session_id": session.session_id.to_string(),
                "username": session.username,
                "subscriptions": channels,
            }),
        )
        .await;
        let Some(ack) = recv(&mut ws).await else {
            panic!("no connect acknowledgement for {}", session.username);
        };
        assert_eq!(ack["type"], "connection_successful");
        ws
    }
}

async fn send(ws: &mut Client, frame: Value) {
    let sent = ws.send(Message::text(frame.to_string())).await;
    assert!(sent.is_ok(), "failed to send frame");
}

/// Next JSON text frame, or `None` after two seconds or on close.
async fn recv(ws: &mut Client) -> Option<Value> {
    recv_within(ws, Duration::from_secs(2)).await
}

async fn recv_within(ws: &mut Client, wait: Duration) -> Option<Value> {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        let msg = tokio::time::timeout_at(deadline, ws.next()).await.ok()??;
        match msg {
            Ok(Message::Text(text)) => return serde_json::from_str(text.as_str()).ok(),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

async fn post(ws: &mut Client, content: &str, channel: Option<&str>, user: Option<&str>) {
    send(
        ws,
        json!({
            "type": "post_message",
            "content": content,
            "to_channel": channel,
            "to_username": user,
        }),
    )
    .await;
}

#[tokio::test]
async fn alice_and_bob_both_receive_home_channel_message() {
    let server = TestServer::start().await;
    let alice = server.session("alice").await;
    let bob = server.session("bob").await;
    let mut ws_alice = server.connect(&alice, &["home"]).await;
    let mut ws_bob = server.connect(&bob, &["home"]).await;

    post(&mut ws_alice, "hi", Some("home"), None).await;

    for ws in [&mut ws_alice, &mut ws_bob] {
        let Some(frame) = recv(ws).await else {
            panic!("channel message not delivered");
        };
        assert_eq!(frame["type"], "channel_message");
        assert_eq!(frame["channel_name"], "home");
        assert_eq!(frame["author_username"], "alice");
        assert_eq!(frame["content"], "hi");
        assert!(frame["timestamp"].is_string());
    }
}

#[tokio::test]
async fn private_message_reaches_only_the_two_participants() {
    let server = TestServer::start().await;
    let alice = server.session("alice").await;
    let bob = server.session("bob").await;
    let carol = server.session("carol").await;
    let mut ws_alice = server.connect(&alice, &["home"]).await;
    let mut ws_bob = server.connect(&bob, &[]).await;
    let mut ws_carol = server.connect(&carol, &["home"]).await;

    post(&mut ws_alice, "just us", None, Some("bob")).await;

    let Some(to_bob) = recv(&mut ws_bob).await else {
        panic!("bob should receive the private message");
    };
    assert_eq!(to_bob["type"], "private_message");
    assert_eq!(to_bob["author_username"], "alice");
    assert_eq!(to_bob["recipient_username"], "bob");
    let Some(echo) = recv(&mut ws_alice).await else {
        panic!("alice should receive her own private message");
    };
    assert_eq!(echo["content"], "just us");
    assert!(
        recv_within(&mut ws_carol, Duration::from_millis(300))
            .await
            .is_none()
    );
}

#[tokio::test]
async fn unknown_session_is_ignored_silently() {
    let server = TestServer::start().await;
    let mut ws = server.open().await;
    send(
        &mut ws,
        json!({"type": "connect", "session_id": uuid::Uuid::new_v4().to_string()}),
    )
    .await;
    send(&mut ws, json!({"type": "heartbeat"})).await;

    assert!(
        recv_within(&mut ws, Duration::from_millis(300))
            .await
            .is_none()
    );
    assert!(server.state.registry.is_empty().await);
}

#[tokio::test]
async fn replacing_subscriptions_drops_old_channels() {
    let server = TestServer::start().await;
    let alice = server.session("alice").await;
    let bob = server.session("bob").await;
    let mut ws_alice = server.connect(&alice, &["a", "b"]).await;
    let mut ws_bob = server.connect(&bob, &[]).await;

    send(&mut ws_alice, json!({"type": "subscribe", "subscriptions": ["b"]})).await;
    // Alice's frames are handled in order, so seeing her own post on `b`
    // means the subscribe has been applied.
    post(&mut ws_alice, "sync", Some("b"), None).await;
    let Some(sync) = recv(&mut ws_alice).await else {
        panic!("alice should see her own post on b");
    };
    assert_eq!(sync["content"], "sync");

    post(&mut ws_bob, "on a", Some("a"), None).await;
    post(&mut ws_bob, "on b", Some("b"), None).await;

    let Some(frame) = recv(&mut ws_alice).await else {
        panic!("alice should still receive b");
    };
    assert_eq!(frame["channel_name"], "b");
    assert_eq!(frame["content"], "on b");
    assert!(
        recv_within(&mut ws_alice, Duration::from_millis(300))
            .await
            .is_none()
    );
}

#[tokio::test]
async fn fifth_post_in_window_gets_error_frame() {
    let server = TestServer::start().await;
    let alice = server.session("alice").await;
    let mut ws = server.connect(&alice, &["home"]).await;

    for i in 0..5 {
        post(&mut ws, &format!("m{i}"), Some("home"), None).await;
    }
    let mut contents = Vec::new();
    for _ in 0..5 {
        let Some(frame) = recv(&mut ws).await else {
            panic!("expected five frames");
        };
        contents.push(frame);
    }
    assert!(contents[..4].iter().all(|f| f["type"] == "channel_message"));
    assert_eq!(contents[4]["type"], "error");
    assert_eq!(contents[4]["code"], 429);
}

#[tokio::test]
async fn silent_connection_is_evicted_and_heartbeats_keep_others() {
    let config = GatewayConfig {
        staleness_threshold_secs: 1,
        ..GatewayConfig::default()
    };
    let server = TestServer::start_with(config).await;
    let monitor = LivenessMonitor::new(
        Arc::clone(&server.state.registry),
        Duration::from_millis(100),
    )
    .spawn();

    let alice = server.session("alice").await;
    let bob = server.session("bob").await;
    let mut ws_alice = server.connect(&alice, &["home"]).await;
    let mut ws_bob = server.connect(&bob, &["home"]).await;

    for _ in 0..6 {
        tokio::time::sleep(Duration::from_millis(400)).await;
        send(&mut ws_bob, json!({"type": "heartbeat"})).await;
    }

    assert_eq!(server.state.registry.len().await, 1);
    // Evicted socket is closed by the server.
    assert!(recv(&mut ws_alice).await.is_none());

    post(&mut ws_bob, "still here", Some("home"), None).await;
    let Some(frame) = recv(&mut ws_bob).await else {
        panic!("bob should still be registered");
    };
    assert_eq!(frame["content"], "still here");
    monitor.abort();
}

#[tokio::test]
async fn rest_register_login_post_and_history() {
    let server = TestServer::start().await;
    let http = reqwest::Client::new();
    let creds = json!({"username": "alice", "password": "secret1"});

    let resp = tokio_test::assert_ok!(
        http.post(server.url("/api/v1/register"))
            .json(&creds)
            .send()
            .await
    );
    assert_eq!(resp.status(), reqwest::StatusCode::CREATED);

    let dup = tokio_test::assert_ok!(
        http.post(server.url("/api/v1/register"))
            .json(&creds)
            .send()
            .await
    );
    assert_eq!(dup.status(), reqwest::StatusCode::CONFLICT);

    let bad = tokio_test::assert_ok!(
        http.post(server.url("/api/v1/login"))
            .json(&json!({"username": "alice", "password": "wrong!!"}))
            .send()
            .await
    );
    assert_eq!(bad.status(), reqwest::StatusCode::UNAUTHORIZED);

    let login = tokio_test::assert_ok!(
        http.post(server.url("/api/v1/login"))
            .json(&creds)
            .send()
            .await
    );
    assert_eq!(login.status(), reqwest::StatusCode::OK);
    let body: Value = tokio_test::assert_ok!(login.json().await);
    let Some(session_id) = body["session_id"].as_str() else {
        panic!("login should return a session id");
    };

    let posted = tokio_test::assert_ok!(
        http.post(server.url("/api/v1/messages"))
            .json(&json!({"session_id": session_id, "content": "hello", "channel": "home"}))
            .send()
            .await
    );
    assert_eq!(posted.status(), reqwest::StatusCode::CREATED);

    let history = tokio_test::assert_ok!(
        http.get(server.url("/api/v1/channels/home/messages?limit=500"))
            .send()
            .await
    );
    let history: Value = tokio_test::assert_ok!(history.json().await);
    assert_eq!(history["limit"], 50);
    assert_eq!(history["messages"][0]["author_username"], "alice");
    assert_eq!(history["messages"][0]["content"], "hello");
}

#[tokio::test]
async fn rest_post_without_destination_or_session_is_rejected() {
    let server = TestServer::start().await;
    let http = reqwest::Client::new();
    let alice = server.session("alice").await;

    let no_target = tokio_test::assert_ok!(
        http.post(server.url("/api/v1/messages"))
            .header("x-access-token", alice.session_id.to_string())
            .json(&json!({"content": "nowhere"}))
            .send()
            .await
    );
    assert_eq!(no_target.status(), reqwest::StatusCode::BAD_REQUEST);

    let no_session = tokio_test::assert_ok!(
        http.post(server.url("/api/v1/messages"))
            .json(&json!({"content": "hi", "channel": "home"}))
            .send()
            .await
    );
    assert_eq!(no_session.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rest_posts_are_rate_limited_and_pushed_live() {
    let server = TestServer::start().await;
    let http = reqwest::Client::new();
    let alice = server.session("alice").await;
    let bob = server.session("bob").await;
    let mut ws_bob = server.connect(&bob, &["home"]).await;

    for i in 0..4 {
        let resp = tokio_test::assert_ok!(
            http.post(server.url("/api/v1/messages"))
                .header("x-access-token", alice.session_id.to_string())
                .json(&json!({"content": format!("m{i}"), "channel": "home"}))
                .send()
                .await
        );
        assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
        let Some(frame) = recv(&mut ws_bob).await else {
            panic!("REST post should reach live subscribers");
        };
        assert_eq!(frame["content"], format!("m{i}"));
    }

    let fifth = tokio_test::assert_ok!(
        http.post(server.url("/api/v1/messages"))
            .header("x-access-token", alice.session_id.to_string())
            .json(&json!({"content": "m4", "channel": "home"}))
            .send()
            .await
    );
    assert_eq!(fifth.status(), reqwest::StatusCode::TOO_MANY_REQUESTS);
    let body: Value = tokio_test::assert_ok!(fifth.json().await);
    assert_eq!(body["error"]["code"], 429);
}

#[tokio::test]
async fn private_history_is_scoped_to_the_caller() {
    let server = TestServer::start().await;
    let http = reqwest::Client::new();
    let alice = server.session("alice").await;
    let bob = server.session("bob").await;
    let carol = server.session("carol").await;
    let mut ws_alice = server.connect(&alice, &[]).await;
    let mut ws_bob = server.connect(&bob, &[]).await;

    post(&mut ws_alice, "to bob", None, Some("bob")).await;
    assert!(recv(&mut ws_alice).await.is_some());
    post(&mut ws_bob, "to alice", None, Some("alice")).await;
    assert!(recv(&mut ws_bob).await.is_some());

    let resp = tokio_test::assert_ok!(
        http.get(server.url("/api/v1/private/bob/messages"))
            .header("x-access-token", alice.session_id.to_string())
            .send()
            .await
    );
    let body: Value = tokio_test::assert_ok!(resp.json().await);
    let Some(messages) = body["messages"].as_array() else {
        panic!("messages should be an array");
    };
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["content"], "to alice");

    let outsider = tokio_test::assert_ok!(
        http.get(server.url("/api/v1/private/bob/messages"))
            .header("x-access-token", carol.session_id.to_string())
            .send()
            .await
    );
    let body: Value = tokio_test::assert_ok!(outsider.json().await);
    assert_eq!(body["messages"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn logout_closes_live_connections() {
    let server = TestServer::start().await;
    let http = reqwest::Client::new();
    let alice = server.session("alice").await;
    let mut ws = server.connect(&alice, &["home"]).await;

    let resp = tokio_test::assert_ok!(
        http.post(server.url("/api/v1/logout"))
            .header("x-access-token", alice.session_id.to_string())
            .send()
            .await
    );
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: Value = tokio_test::assert_ok!(resp.json().await);
    assert_eq!(body["closed_connections"], 1);

    assert!(recv(&mut ws).await.is_none());
    assert!(server.state.registry.is_empty().await);

    let stats = tokio_test::assert_ok!(http.get(server.url("/stats")).send().await);
    let stats: Value = tokio_test::assert_ok!(stats.json().await);
    assert_eq!(stats["connections"], 0);
}

#[tokio::test]
async fn middleware_stack_answers_cors_preflight() {
    let server = TestServer::start().await;
    let http = reqwest::Client::new();

    let resp = tokio_test::assert_ok!(
        http.request(reqwest::Method::OPTIONS, server.url("/api/v1/login"))
            .header("origin", "http://chat.example")
            .header("access-control-request-method", "POST")
            .send()
            .await
    );
    assert!(resp.status().is_success());
    assert!(
        resp.headers()
            .contains_key("access-control-allow-origin")
    );

    let health = tokio_test::assert_ok!(
        http.get(server.url("/health"))
            .header("origin", "http://chat.example")
            .send()
            .await
    );
    assert_eq!(health.status(), reqwest::StatusCode::OK);
    assert!(
        health
            .headers()
            .contains_key("access-control-allow-origin")
    );
}
