use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::Path;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use realtime_api::config::Config;
use realtime_api::AppState;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing, env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let http_addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let bridge_addr = SocketAddr::from(([0, 0, 0, 0], config.bridge_port));

    tracing::info!(
        queue_capacity = config.client_queue_capacity,
        pong_wait_secs = config.ws_pong_wait.as_secs(),
        "realtime-api configured"
    );

    let state = AppState::new(config);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(realtime_api::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let bridge = realtime_api::bridge::router(state);

    let http_listener = TcpListener::bind(http_addr)
        .await
        .expect("failed to bind http listener");
    let bridge_listener = TcpListener::bind(bridge_addr)
        .await
        .expect("failed to bind bridge listener");

    tracing::info!(%http_addr, "realtime-api listening");
    tracing::info!(%bridge_addr, "notification bridge listening");

    // Open SSE and WebSocket connections never drain; stop on the signal.
    tokio::select! {
        result = axum::serve(http_listener, app).into_future() => result.expect("http server error"),
        result = axum::serve(bridge_listener, bridge).into_future() => result.expect("bridge server error"),
        _ = shutdown_signal() => {}
    }

    tracing::info!("realtime-api stopped");
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(?err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
