use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use super::extract::JsonBody;
use crate::error::AppError;
use crate::models::access_code::{
    AdminCodeRequest, CodeSummary, GenerateCodeRequest, GenerateCodeResponse, ReferralsResponse,
};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/generate_code", post(generate_code))
        .route("/api/admin/deactivate", post(deactivate))
        .route("/api/admin/referrals", post(referrals))
}

async fn generate_code(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<GenerateCodeRequest>,
) -> Result<(StatusCode, Json<GenerateCodeResponse>), AppError> {
    let new_code = state
        .admin
        .issue_code(
            body.admin_secret.as_deref(),
            body.referrer_code.as_deref(),
            body.user_name.as_deref(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(GenerateCodeResponse {
            success: true,
            new_code,
        }),
    ))
}

async fn deactivate(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<AdminCodeRequest>,
) -> Result<Json<Value>, AppError> {
    state
        .admin
        .deactivate_code(
            body.admin_secret.as_deref(),
            body.code.as_deref().unwrap_or_default(),
        )
        .await?;
    Ok(Json(json!({ "success": true })))
}

async fn referrals(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<AdminCodeRequest>,
) -> Result<Json<ReferralsResponse>, AppError> {
    let referrals = state
        .admin
        .list_referrals(
            body.admin_secret.as_deref(),
            body.code.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok(Json(ReferralsResponse {
        success: true,
        referrals: referrals.into_iter().map(CodeSummary::from).collect(),
    }))
}
