#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use tokio::time;

use realtime_api::auth::tokens::AccessClaims;
use realtime_api::config::Config;
use realtime_api::hub::ConnectionStats;
use realtime_api::AppState;

pub const ADMIN_KEY: &str = "test-admin-key";
pub const JWT_SECRET: &str = "test-access-secret";

pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Configuration with small queues and short keepalive timings.
pub fn test_config() -> Config {
    Config {
        port: 0,
        bridge_port: 0,
        admin_api_key: ADMIN_KEY.to_string(),
        jwt_access_secret: JWT_SECRET.to_string(),
        client_queue_capacity: 16,
        ws_pong_wait: Duration::from_secs(60),
        ws_write_wait: Duration::from_secs(10),
    }
}

pub fn test_state() -> AppState {
    AppState::new(test_config())
}

/// Build the browser-facing router wired to a fresh state.
pub fn test_app() -> (Router, AppState) {
    let state = test_state();
    let app = realtime_api::routes::router().with_state(state.clone());
    (app, state)
}

fn mint(user_id: &str, email: Option<&str>, exp_offset_secs: i64) -> String {
    let claims = AccessClaims {
        user_id: Some(user_id.to_string()),
        sub: None,
        email: email.map(String::from),
        first_name: Some("Test".to_string()),
        last_name: Some("User".to_string()),
        exp: (chrono::Utc::now() + chrono::Duration::seconds(exp_offset_secs)).timestamp(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("mint test token")
}

/// Mint a valid access token for a user.
pub fn mint_token(user_id: &str, email: Option<&str>) -> String {
    mint(user_id, email, 600)
}

pub fn mint_expired_token(user_id: &str) -> String {
    mint(user_id, None, -600)
}

/// Serve the browser-facing router on a real TCP listener.
pub async fn start_http_server(state: AppState) -> SocketAddr {
    let app = realtime_api::routes::router().with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

/// Serve the bridge router on a real TCP listener.
pub async fn start_bridge_server(state: AppState) -> SocketAddr {
    let app = realtime_api::bridge::router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

/// Poll the WebSocket hub until it reports `expected` connections.
pub async fn wait_for_ws_connections(state: &AppState, expected: usize) -> ConnectionStats {
    time::timeout(Duration::from_secs(5), async {
        loop {
            let stats = state.ws.stats().await.expect("ws hub running");
            if stats.total_connections == expected {
                return stats;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timed out waiting for ws connections")
}

/// Poll the SSE hub until it reports `expected` connections.
pub async fn wait_for_sse_connections(state: &AppState, expected: usize) -> ConnectionStats {
    time::timeout(Duration::from_secs(5), async {
        loop {
            let stats = state.sse.stats();
            if stats.total_connections == expected {
                return stats;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timed out waiting for sse connections")
}
