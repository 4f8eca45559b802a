use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::store::StoreError;

#[derive(Debug)]
pub enum AppError {
    /// A required field was absent or empty. Carries the wire field name.
    MissingInput(&'static str),
    /// The body or a header could not be understood.
    InvalidInput(String),
    /// No matching code or session. Deliberately says nothing about why.
    NotFound,
    Inactive,
    AlreadyLeased,
    InvalidReferrer(String),
    Unauthorized,
    /// Generated identifier collided with an existing one; retry with a new one.
    Conflict,
    StoreUnavailable(String),
    Internal(String),
    Store(StoreError),
}

impl AppError {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingInput(_) => "MISSING_INPUT",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::NotFound => "NOT_FOUND",
            Self::Inactive => "INACTIVE",
            Self::AlreadyLeased => "ALREADY_LEASED",
            Self::InvalidReferrer(_) => "INVALID_REFERRER",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Conflict => "CONFLICT",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::Internal(_) | Self::Store(_) => "INTERNAL",
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingInput(field) => write!(f, "{field} is required"),
            Self::InvalidInput(msg) => write!(f, "{msg}"),
            Self::NotFound => write!(f, "Access code or session is invalid or has expired"),
            Self::Inactive => write!(f, "Access code has been deactivated"),
            Self::AlreadyLeased => write!(f, "Access code is in use by another device"),
            Self::InvalidReferrer(code) => {
                write!(f, "Referrer code '{code}' does not exist or is not active")
            }
            Self::Unauthorized => write!(f, "Not authorized"),
            Self::Conflict => write!(f, "Generated code collided with an existing one, please retry"),
            Self::StoreUnavailable(msg) => write!(f, "Store unavailable: {msg}"),
            Self::Internal(msg) => write!(f, "Internal error: {msg}"),
            Self::Store(e) => write!(f, "Store error: {e}"),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::MissingInput(_) | Self::InvalidInput(_) | Self::InvalidReferrer(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            Self::NotFound => (StatusCode::UNAUTHORIZED, self.to_string()),
            Self::Inactive | Self::Unauthorized => (StatusCode::FORBIDDEN, self.to_string()),
            Self::AlreadyLeased | Self::Conflict => (StatusCode::CONFLICT, self.to_string()),
            Self::StoreUnavailable(_) => {
                tracing::error!("{self}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service temporarily unavailable".to_string(),
                )
            }
            Self::Internal(_) | Self::Store(_) => {
                tracing::error!("{self}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        if status.is_client_error() {
            tracing::warn!(status = status.as_u16(), reason = self.reason(), "{message}");
        }

        (
            status,
            Json(json!({ "success": false, "error": self.reason(), "message": message })),
        )
            .into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(msg) => Self::StoreUnavailable(msg),
            StoreError::Conflict(_) => Self::Conflict,
            other => Self::Store(other),
        }
    }
}
