//! Integration tests for the Emberlink server, handlers, and client over
//! real WebSocket connections.

use std::time::Duration;

use emberlink::prelude::*;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

type Players = std::sync::Arc<emberlink::player::PlayerManager<StaticAccounts>>;

/// Subscriptions expire fast and pushes come often.
fn fast_config() -> PlayerConfig {
    PlayerConfig {
        subscription_ttl: Duration::from_millis(300),
        push_interval: Duration::from_millis(100),
        ..PlayerConfig::default()
    }
}

/// Starts a server on a random port and returns its address and players.
async fn start_server(config: PlayerConfig) -> (String, Players) {
    let server = EmberlinkServerBuilder::new()
        .bind("127.0.0.1:0")
        .player_config(config)
        .build(StaticAccounts::reference())
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let players = server.players();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    sleep(Duration::from_millis(10)).await;
    (addr, players)
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send_json(ws: &mut ClientWs, value: Value) {
    ws.send(Message::text(value.to_string()))
        .await
        .expect("send");
}

/// Next text document from the server, skipping control frames.
async fn recv_json(ws: &mut ClientWs) -> Value {
    timeout(Duration::from_secs(2), async {
        loop {
            let msg = ws.next().await.expect("stream ended").expect("recv");
            if msg.is_text() {
                return serde_json::from_slice(&msg.into_data()).expect("valid json");
            }
        }
    })
    .await
    .expect("timed out waiting for a message")
}

async fn login(ws: &mut ClientWs, account: &str) -> Value {
    send_json(
        ws,
        json!({ "$protocol-type": "GameCore.C2S_ClientLogin", "Account": account }),
    )
    .await;
    recv_json(ws).await
}

fn overing() -> PlayerKey {
    PlayerKey::from("overing")
}

async fn subscribers(players: &Players) -> usize {
    players
        .info(&overing())
        .await
        .map_or(0, |info| info.subscribers)
}

/// Polls until `overing` has `expected` subscribers or a second passes.
async fn wait_for_subscribers(players: &Players, expected: usize) -> usize {
    for _ in 0..50 {
        let count = subscribers(players).await;
        if count == expected {
            return count;
        }
        sleep(Duration::from_millis(20)).await;
    }
    subscribers(players).await
}

// =========================================================================
// Login
// =========================================================================

#[tokio::test]
async fn test_login_success() {
    let (addr, players) = start_server(PlayerConfig::default()).await;
    let mut ws = connect(&addr).await;

    let reply = login(&mut ws, "overing").await;

    assert_eq!(
        reply,
        json!({ "$protocol-type": "GameCore.S2C_ClientLogin", "Error": 0, "Name": "Overing" })
    );
    assert_eq!(subscribers(&players).await, 1);
}

#[tokio::test]
async fn test_login_unknown_account() {
    let (addr, players) = start_server(PlayerConfig::default()).await;
    let mut ws = connect(&addr).await;

    let reply = login(&mut ws, "someone_else").await;

    assert_eq!(
        reply,
        json!({ "$protocol-type": "GameCore.S2C_ClientLogin", "Error": 1, "Name": "" })
    );
    let info = players
        .info(&PlayerKey::from("someone_else"))
        .await
        .expect("actor was activated");
    assert_eq!(info.subscribers, 0);
}

#[tokio::test]
async fn test_unreadable_messages_are_skipped() {
    let (addr, _players) = start_server(PlayerConfig::default()).await;
    let mut ws = connect(&addr).await;

    send_json(&mut ws, json!({ "$protocol-type": "GameCore.Nope" })).await;
    ws.send(Message::text("not json")).await.expect("send");
    send_json(&mut ws, json!({ "Account": "overing" })).await;

    let reply = login(&mut ws, "overing").await;
    assert_eq!(reply["Name"], "Overing");
}

// =========================================================================
// Heartbeat
// =========================================================================

#[tokio::test]
async fn test_server_pushes_heartbeat_after_login() {
    let (addr, _players) = start_server(fast_config()).await;
    let mut ws = connect(&addr).await;
    login(&mut ws, "overing").await;

    let push = recv_json(&mut ws).await;
    assert_eq!(push, json!({ "$protocol-type": "GameCore.S2C_Heartbeat" }));
}

#[tokio::test]
async fn test_silent_client_expires() {
    let (addr, players) = start_server(fast_config()).await;
    let mut ws = connect(&addr).await;
    login(&mut ws, "overing").await;

    sleep(Duration::from_millis(600)).await;

    assert_eq!(subscribers(&players).await, 0);
}

#[tokio::test]
async fn test_heartbeat_on_unbound_connection_is_ignored() {
    let (addr, players) = start_server(PlayerConfig::default()).await;
    let mut ws = connect(&addr).await;

    send_json(&mut ws, json!({ "$protocol-type": "GameCore.C2S_Heartbeat" })).await;
    // A login reply proves the heartbeat before it was handled.
    login(&mut ws, "someone_else").await;

    assert!(players.info(&overing()).await.is_none());
}

#[tokio::test]
async fn test_heartbeat_renews_only_the_sending_connection() {
    let (addr, players) = start_server(fast_config()).await;
    let mut silent = connect(&addr).await;
    let mut beating = connect(&addr).await;
    login(&mut silent, "overing").await;
    login(&mut beating, "overing").await;
    assert_eq!(subscribers(&players).await, 2);

    // Twice the TTL, renewing one connection every push interval.
    for _ in 0..6 {
        sleep(Duration::from_millis(100)).await;
        send_json(
            &mut beating,
            json!({ "$protocol-type": "GameCore.C2S_Heartbeat" }),
        )
        .await;
    }

    assert_eq!(subscribers(&players).await, 1);
}

// =========================================================================
// Disconnect
// =========================================================================

#[tokio::test]
async fn test_clean_close_detaches_eagerly() {
    let (addr, players) = start_server(PlayerConfig::default()).await;
    let mut ws = connect(&addr).await;
    login(&mut ws, "overing").await;
    assert_eq!(subscribers(&players).await, 1);

    ws.close(None).await.expect("close");

    // Default TTL is 30s, so only the close can explain this.
    assert_eq!(wait_for_subscribers(&players, 0).await, 0);
}

// =========================================================================
// EmberlinkClient
// =========================================================================

/// Forwards every login reply into a channel.
struct LoginReplies(mpsc::UnboundedSender<S2CClientLogin>);

impl ProtocolHandler<S2CClientLogin> for LoginReplies {
    async fn handle(
        &self,
        _session: &SessionHandle,
        message: S2CClientLogin,
    ) -> Result<(), HandlerError> {
        let _ = self.0.send(message);
        Ok(())
    }
}

async fn start_client(addr: &str) -> (EmberlinkClient, mpsc::UnboundedReceiver<S2CClientLogin>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let dispatcher = Dispatcher::builder()
        .on::<S2CHeartbeat, _>(HeartbeatResponder)
        .on::<S2CClientLogin, _>(LoginReplies(tx))
        .build()
        .expect("dispatcher");
    let client = EmberlinkClient::connect(&format!("ws://{addr}"), dispatcher)
        .await
        .expect("client should connect");
    (client, rx)
}

#[tokio::test]
async fn test_client_login_roundtrip() {
    let (addr, _players) = start_server(PlayerConfig::default()).await;
    let (client, mut replies) = start_client(&addr).await;

    client
        .send(&C2SClientLogin { account: "overing".into() })
        .await
        .expect("send");

    let reply = timeout(Duration::from_secs(2), replies.recv())
        .await
        .expect("timed out")
        .expect("reply");
    assert_eq!(reply, S2CClientLogin::accepted("Overing".to_string()));
}

#[tokio::test]
async fn test_responding_client_stays_subscribed() {
    let (addr, players) = start_server(fast_config()).await;
    let (client, mut replies) = start_client(&addr).await;
    client
        .send(&C2SClientLogin { account: "overing".into() })
        .await
        .expect("send");
    replies.recv().await.expect("reply");

    // Several TTLs pass; the responder renews on every push.
    sleep(Duration::from_secs(1)).await;

    assert!(client.is_open());
    assert_eq!(subscribers(&players).await, 1);
}

#[tokio::test]
async fn test_client_close_is_idempotent_and_detaches() {
    let (addr, players) = start_server(PlayerConfig::default()).await;
    let (client, mut replies) = start_client(&addr).await;
    client
        .send(&C2SClientLogin { account: "overing".into() })
        .await
        .expect("send");
    replies.recv().await.expect("reply");

    client.close().await.expect("close");
    client.close().await.expect("second close");
    assert!(!client.is_open());
    assert!(client.send(&C2SHeartbeat {}).await.is_err());

    client.wait().await.expect("receive loop ends cleanly");
    assert_eq!(wait_for_subscribers(&players, 0).await, 0);
}
