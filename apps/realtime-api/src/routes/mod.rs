pub mod health;
pub mod sse;

use axum::Router;
use realtime_common::bridge::ADMIN_KEY_HEADER;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::gateway::server as ws;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/api", sse::router().merge(ws::router()))
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
            components.add_security_scheme(
                "admin_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(ADMIN_KEY_HEADER))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        sse::admin_stream,
        sse::user_stream,
        ws::ws_upgrade,
        ws::notify,
        ws::stats,
    ),
    components(
        schemas(
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::hub::ConnectionStats,
            crate::hub::ClientInfo,
            health::HealthResponse,
            ws::NotifyRequest,
            ws::NotifyResponse,
            ws::NotificationLevel,
            ws::NotificationTarget,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check"),
        (name = "SSE", description = "Server-sent event streams"),
        (name = "WebSocket", description = "WebSocket connections and admin notifications"),
    )
)]
pub struct ApiDoc;
