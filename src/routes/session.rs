use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use super::extract::JsonBody;
use crate::error::AppError;
use crate::models::access_code::{AuthenticateRequest, AuthenticateResponse, SessionRequest};
use crate::AppState;

/// Optional client key that makes a retried authenticate return the same session.
const IDEMPOTENCY_HEADER: &str = "idempotency-key";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/authenticate", post(authenticate))
        .route("/api/ping", post(ping))
        .route("/api/logout", post(logout))
}

async fn authenticate(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(body): JsonBody<AuthenticateRequest>,
) -> Result<Json<AuthenticateResponse>, AppError> {
    let code = body.access_code.unwrap_or_default();
    let claim_token = headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty());

    let claimed = state.leases.claim(&code, claim_token).await?;

    Ok(Json(AuthenticateResponse {
        success: true,
        session_id: claimed.session_id,
        user_name: claimed.display_name,
        referrer_code: claimed.referrer_code,
    }))
}

async fn ping(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<SessionRequest>,
) -> Result<Json<Value>, AppError> {
    state
        .leases
        .renew(&body.session_id.unwrap_or_default())
        .await?;
    Ok(Json(json!({ "success": true })))
}

async fn logout(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<SessionRequest>,
) -> Result<Json<Value>, AppError> {
    state
        .leases
        .release(&body.session_id.unwrap_or_default())
        .await?;
    Ok(Json(json!({ "success": true })))
}
