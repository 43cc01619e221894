mod common;

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use realtime_api::config::Config;
use realtime_api::AppState;
use realtime_common::WsMessage;
use serde_json::json;
use tokio::time;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;

use common::WsStream;

async fn connect(addr: SocketAddr, query: &str) -> WsStream {
    let url = format!("ws://{addr}/api/ws{query}");
    let (ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");
    ws
}

async fn connect_admin(addr: SocketAddr) -> WsStream {
    let mut request = format!("ws://{addr}/api/ws")
        .into_client_request()
        .unwrap();
    request
        .headers_mut()
        .insert("x-admin-api-key", common::ADMIN_KEY.parse().unwrap());
    let (ws, _) = tokio_tungstenite::connect_async(request)
        .await
        .expect("admin ws connect");
    ws
}

/// Next text frame, skipping control frames.
async fn next_text(ws: &mut WsStream) -> String {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for ws message")
            .expect("ws stream ended")
            .expect("ws read error");
        match msg {
            Message::Text(text) => return text.as_str().to_owned(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

async fn expect_silence(ws: &mut WsStream) {
    let result = time::timeout(Duration::from_millis(200), ws.next()).await;
    assert!(result.is_err(), "unexpected ws frame: {result:?}");
}

fn state_with_pong_wait(pong_wait: Duration) -> AppState {
    AppState::new(Config {
        ws_pong_wait: pong_wait,
        ws_write_wait: Duration::from_secs(1),
        ..common::test_config()
    })
}

#[tokio::test]
async fn anonymous_client_receives_broadcast_verbatim() {
    let state = common::test_state();
    let addr = common::start_http_server(state.clone()).await;

    let mut ws = connect(addr, "").await;
    let stats = common::wait_for_ws_connections(&state, 1).await;
    assert_eq!(stats.anonymous_users, 1);
    let info = &stats.connections[0];
    assert!(info.session_id.as_deref().unwrap().starts_with("anon_"));
    assert!(info.user_id.is_none());
    assert!(!info.is_admin);

    let msg = WsMessage::new("announcement", json!({"text": "sale starts now"}));
    state.ws.broadcast(&msg).unwrap();

    let text = next_text(&mut ws).await;
    assert_eq!(text, serde_json::to_string(&msg).unwrap());

    let decoded: WsMessage = serde_json::from_str(&text).unwrap();
    assert_eq!(decoded, msg);
}

#[tokio::test]
async fn user_targeting_reaches_every_tab_of_that_user_only() {
    let state = common::test_state();
    let addr = common::start_http_server(state.clone()).await;

    let u1 = common::mint_token("u1", None);
    let u2 = common::mint_token("u2", None);
    let mut tab_a = connect(addr, &format!("?token={u1}")).await;
    let mut tab_b = connect(addr, &format!("?token={u1}")).await;
    let mut other = connect(addr, &format!("?token={u2}")).await;

    let stats = common::wait_for_ws_connections(&state, 3).await;
    assert_eq!(stats.logged_in_users, 3);

    let msg = WsMessage::new("order_updated", json!({"order_id": 9, "status": "shipped"}));
    state.ws.send_to_user("u1", &msg).unwrap();

    let expected = serde_json::to_string(&msg).unwrap();
    assert_eq!(next_text(&mut tab_a).await, expected);
    assert_eq!(next_text(&mut tab_b).await, expected);
    expect_silence(&mut other).await;
}

#[tokio::test]
async fn user_can_be_targeted_by_email() {
    let state = common::test_state();
    let addr = common::start_http_server(state.clone()).await;

    let token = common::mint_token("u1", Some("ada@example.com"));
    let mut ws = connect(addr, &format!("?token={token}")).await;
    let stats = common::wait_for_ws_connections(&state, 1).await;
    assert_eq!(stats.connections[0].email.as_deref(), Some("ada@example.com"));

    let msg = WsMessage::new("greeting", json!("hello"));
    state.ws.send_to_user("ada@example.com", &msg).unwrap();
    assert_eq!(next_text(&mut ws).await, serde_json::to_string(&msg).unwrap());
}

#[tokio::test]
async fn admin_targeting_skips_users_and_anonymous_clients() {
    let state = common::test_state();
    let addr = common::start_http_server(state.clone()).await;

    let token = common::mint_token("u1", None);
    let mut admin = connect_admin(addr).await;
    let mut user = connect(addr, &format!("?token={token}")).await;
    let mut anon = connect(addr, "").await;

    let stats = common::wait_for_ws_connections(&state, 3).await;
    assert_eq!(stats.admin_users, 1);
    assert_eq!(stats.logged_in_users, 1);
    assert_eq!(stats.anonymous_users, 1);

    let msg = WsMessage::new("new_order", json!({"order_id": 1}));
    state.ws.send_to_admin(&msg).unwrap();

    assert_eq!(next_text(&mut admin).await, serde_json::to_string(&msg).unwrap());
    expect_silence(&mut user).await;
    expect_silence(&mut anon).await;
}

#[tokio::test]
async fn admin_key_in_query_makes_an_admin_connection() {
    let state = common::test_state();
    let addr = common::start_http_server(state.clone()).await;

    let _ws = connect(addr, &format!("?admin_key={}", common::ADMIN_KEY)).await;
    let stats = common::wait_for_ws_connections(&state, 1).await;
    assert_eq!(stats.admin_users, 1);
    assert!(stats.connections[0].is_admin);
}

#[tokio::test]
async fn invalid_token_connects_anonymously() {
    let state = common::test_state();
    let addr = common::start_http_server(state.clone()).await;

    let expired = common::mint_expired_token("u1");
    let _ws = connect(addr, &format!("?token={expired}")).await;

    let stats = common::wait_for_ws_connections(&state, 1).await;
    assert_eq!(stats.anonymous_users, 1);
    assert_eq!(stats.logged_in_users, 0);
}

#[tokio::test]
async fn client_close_unregisters() {
    let state = common::test_state();
    let addr = common::start_http_server(state.clone()).await;

    let mut ws = connect(addr, "").await;
    common::wait_for_ws_connections(&state, 1).await;

    ws.close(None).await.unwrap();
    common::wait_for_ws_connections(&state, 0).await;
}

#[tokio::test]
async fn oversized_inbound_message_disconnects() {
    let state = common::test_state();
    let addr = common::start_http_server(state.clone()).await;

    let mut ws = connect(addr, "").await;
    common::wait_for_ws_connections(&state, 1).await;

    ws.send(Message::Text("x".repeat(1024).into())).await.unwrap();
    common::wait_for_ws_connections(&state, 0).await;
}

#[tokio::test]
async fn server_pings_and_responsive_client_stays_connected() {
    let state = state_with_pong_wait(Duration::from_secs(1));
    let addr = common::start_http_server(state.clone()).await;

    let mut ws = connect(addr, "").await;
    common::wait_for_ws_connections(&state, 1).await;

    // Reading lets the client answer pings automatically.
    let mut pings = 0;
    let until = time::Instant::now() + Duration::from_millis(2500);
    while let Ok(frame) = time::timeout_at(until, ws.next()).await {
        match frame.expect("ws stream ended").expect("ws read error") {
            Message::Ping(_) => pings += 1,
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    assert!(pings >= 2, "expected repeated pings, got {pings}");
    let stats = state.ws.stats().await.unwrap();
    assert_eq!(stats.total_connections, 1);
}

#[tokio::test]
async fn silent_peer_is_dropped_after_pong_wait() {
    let state = state_with_pong_wait(Duration::from_secs(1));
    let addr = common::start_http_server(state.clone()).await;

    // Never polled, so pings are never answered.
    let _ws = connect(addr, "").await;
    common::wait_for_ws_connections(&state, 1).await;

    common::wait_for_ws_connections(&state, 0).await;
}
