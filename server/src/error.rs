use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sqlx::error::DatabaseError;

pub type AppResult<T> = Result<T, AppError>;
pub type AppJsonResult<T> = AppResult<Json<T>>;

/// The error taxonomy the ingestion core propagates: a single-message error
/// never aborts a page, a provider error is recorded per-message, a
/// store-transient error aborts the invocation (the next run retries the
/// page), and a store-integrity error is a lost insert-if-missing race the
/// caller recovers from inline rather than treating as fatal.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Internal(anyhow::Error),
    Conflict(String),
    DbError(sea_orm::error::DbErr),
    /// Mail provider request failed after exhausting retries.
    ProviderTransient(anyhow::Error),
    /// The provider reports the stored cursor (historyId / page token) no
    /// longer resolves; the coordinator falls back to `full_sync`.
    ProviderCursorExpired,
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(error)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        tracing::error!("Reqwest error: {:?}", error);
        match error.status() {
            Some(StatusCode::BAD_REQUEST) => AppError::BadRequest(error.to_string()),
            Some(StatusCode::NOT_FOUND) => AppError::ProviderCursorExpired,
            Some(StatusCode::TOO_MANY_REQUESTS)
            | Some(StatusCode::INTERNAL_SERVER_ERROR)
            | Some(StatusCode::SERVICE_UNAVAILABLE) => AppError::ProviderTransient(error.into()),
            _ => AppError::Internal(error.into()),
        }
    }
}

impl From<sea_orm::error::DbErr> for AppError {
    fn from(error: sea_orm::error::DbErr) -> Self {
        AppError::DbError(error)
    }
}

impl AppError {
    /// A unique-violation on an insert-if-missing statement is a lost race
    /// between two account workers creating the same Company/Domain row, not
    /// a real failure — callers match on this to re-read and proceed.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            AppError::DbError(err)
                if extract_database_error_code(err) == Some(DatabaseErrorCode::UniqueViolation as u32)
        )
    }
}

// This centralizes all different errors from our app in one place
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let err = match self {
            AppError::BadRequest(error) => (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": {
                    "code": StatusCode::BAD_REQUEST.as_u16(),
                    "message": error
                }})),
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "code": StatusCode::NOT_FOUND.as_u16(),
                    "message": msg
                })),
            ),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": {
                        "code": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                        "message": "Internal server error"
                    }})),
                )
            }
            AppError::Conflict(msg) => (
                StatusCode::CONFLICT,
                Json(json!({
                    "code": StatusCode::CONFLICT.as_u16(),
                    "message": msg
                })),
            ),
            AppError::DbError(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": {
                        "code": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                        "message": "Database error"
                    }})),
                )
            }
            AppError::ProviderTransient(e) => {
                tracing::error!("Mail provider error: {:?}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({"error": {
                        "code": StatusCode::BAD_GATEWAY.as_u16(),
                        "message": "Mail provider request failed"
                    }})),
                )
            }
            AppError::ProviderCursorExpired => (
                StatusCode::BAD_GATEWAY,
                Json(json!({"error": {
                    "code": StatusCode::BAD_GATEWAY.as_u16(),
                    "message": "Mail provider cursor expired"
                }})),
            ),
        };
        tracing::error!("Error: {:?}", err.1);

        err.into_response()
    }
}

#[allow(clippy::borrowed_box)]
fn get_code(error: &Box<dyn DatabaseError>) -> Option<u32> {
    error.code().and_then(|c| c.parse::<u32>().ok())
}

pub fn extract_database_error_code(err: &sea_orm::error::DbErr) -> Option<u32> {
    match err {
        sea_orm::error::DbErr::Query(sea_orm::error::RuntimeErr::SqlxError(
            sqlx::Error::Database(error),
        )) => get_code(error),
        _ => None,
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum DatabaseErrorCode {
    UniqueViolation = 23505,
}
