//! Request extractors for the two credentials the service accepts: a user
//! access token and the static admin key.
//!
//! Both may arrive as a header or, for browser `EventSource` / `WebSocket`
//! clients that cannot set headers, as a query parameter.

use std::convert::Infallible;

use axum::extract::{FromRequestParts, Query};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use realtime_common::bridge::ADMIN_KEY_HEADER;
use realtime_common::id::{prefix, prefixed_ulid};
use serde::Deserialize;

use crate::auth::tokens::VerifiedUser;
use crate::hub::Identity;
use crate::AppState;

/// Authenticated user extracted from a bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub VerifiedUser);

/// Marker extractor: the request carried the configured admin key.
#[derive(Debug, Clone, Copy)]
pub struct AdminKey;

/// Identity of a WebSocket client. Never rejects: an admin key wins, then a
/// valid token, and anything else connects anonymously.
#[derive(Debug, Clone)]
pub struct ConnectionIdentity(pub Identity);

/// Rejection returned when a credential is missing or invalid.
#[derive(Debug)]
pub struct AuthError {
    message: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "code": "UNAUTHORIZED",
                "message": self.message
            }
        });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
struct CredentialQuery {
    token: Option<String>,
    admin_key: Option<String>,
}

fn credential_query(parts: &Parts) -> CredentialQuery {
    Query::<CredentialQuery>::try_from_uri(&parts.uri)
        .map(|Query(q)| q)
        .unwrap_or_default()
}

/// Bearer token from the `Authorization` header, else the `token` query
/// parameter.
fn bearer_token(parts: &Parts) -> Option<String> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    match header {
        Some(token) => Some(token.to_string()),
        None => credential_query(parts).token.filter(|t| !t.is_empty()),
    }
}

/// Whether the request carries the configured admin key, either in the
/// `X-Admin-API-Key` header or the `admin_key` query parameter. An empty
/// header counts as absent.
pub fn has_admin_key(parts: &Parts, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }

    let header = parts
        .headers
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|k| !k.is_empty());

    match header {
        Some(key) => key == expected,
        None => credential_query(parts).admin_key.as_deref() == Some(expected),
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AuthError {
            message: "Missing access token",
        })?;

        let user = state.tokens.verify(&token).map_err(|err| {
            tracing::debug!(%err, "rejected access token");
            AuthError {
                message: "Invalid or expired token",
            }
        })?;

        Ok(AuthUser(user))
    }
}

impl FromRequestParts<AppState> for AdminKey {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if has_admin_key(parts, &state.config.admin_api_key) {
            Ok(AdminKey)
        } else {
            Err(AuthError {
                message: "Missing or invalid admin key",
            })
        }
    }
}

impl FromRequestParts<AppState> for ConnectionIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if has_admin_key(parts, &state.config.admin_api_key) {
            return Ok(ConnectionIdentity(Identity::admin()));
        }

        if let Some(token) = bearer_token(parts) {
            match state.tokens.verify(&token) {
                Ok(user) => return Ok(ConnectionIdentity(Identity::user(user.user_id, user.email))),
                Err(err) => tracing::debug!(%err, "ignoring invalid ws token"),
            }
        }

        let session = prefixed_ulid(prefix::ANONYMOUS_SESSION);
        Ok(ConnectionIdentity(Identity::anonymous(session)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(uri: &str, headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_header_beats_query() {
        let p = parts("/x?token=from-query", &[("authorization", "Bearer from-header")]);
        assert_eq!(bearer_token(&p).as_deref(), Some("from-header"));

        let p = parts("/x?token=from-query", &[]);
        assert_eq!(bearer_token(&p).as_deref(), Some("from-query"));

        let p = parts("/x", &[("authorization", "Basic abc")]);
        assert_eq!(bearer_token(&p), None);
    }

    #[test]
    fn admin_key_from_header_or_query() {
        assert!(has_admin_key(&parts("/x", &[("x-admin-api-key", "k")]), "k"));
        assert!(has_admin_key(&parts("/x?admin_key=k", &[]), "k"));
        assert!(!has_admin_key(&parts("/x?admin_key=nope", &[]), "k"));
        assert!(!has_admin_key(&parts("/x", &[("x-admin-api-key", "nope")]), "k"));
        assert!(has_admin_key(&parts("/x?admin_key=k", &[("x-admin-api-key", "")]), "k"));
        assert!(!has_admin_key(&parts("/x", &[("x-admin-api-key", "")]), "k"));
    }

    #[test]
    fn empty_configured_key_never_matches() {
        assert!(!has_admin_key(&parts("/x?admin_key=", &[]), ""));
        assert!(!has_admin_key(&parts("/x", &[("x-admin-api-key", "")]), ""));
    }
}
