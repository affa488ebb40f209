// =============================================================================
// SESSION MODULE
// =============================================================================
// Resolves `Authorization: Bearer <token>` to the signed-in owner.
//
// Sessions are issued by the shop's sign-in flow, which writes
// `session:<token>` -> owner UUID into Redis. This service only reads the key
// on every /api/v1 request and deletes it on logout.
// =============================================================================

use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use redis::aio::ConnectionManager;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::AppState;

/// The owner behind the request's session token
#[derive(Debug, Clone)]
pub struct Owner {
    pub id: Uuid,
    pub token: String,
}

pub fn session_key(token: &str) -> String {
    format!("session:{}", token)
}

/// Token from a `Bearer` authorization header, if well formed
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Owner {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AppError::Unauthorized)?;

        let stored: Option<String> = redis::cmd("GET")
            .arg(session_key(token))
            .query_async(&mut state.redis.clone())
            .await?;

        let id = stored
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
            .ok_or(AppError::Unauthorized)?;

        Ok(Owner {
            id,
            token: token.to_string(),
        })
    }
}

/// Deletes the session key; the token stops resolving immediately.
pub async fn end_session(redis: &ConnectionManager, token: &str) -> AppResult<()> {
    let _: i64 = redis::cmd("DEL")
        .arg(session_key(token))
        .query_async(&mut redis.clone())
        .await?;
    Ok(())
}
