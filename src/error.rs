use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::db::StoreError;

pub const INVALID_CREDENTIALS: &str = "Invalid Credentials";
pub const NOT_AUTHORIZED: &str = "User not authorized";

/// A single failed input check, reported under `errors`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    pub msg: String,
}

impl FieldError {
    pub fn new(param: &str, msg: impl Into<String>) -> Self {
        Self {
            param: Some(param.to_string()),
            msg: msg.into(),
        }
    }

    pub fn message(msg: impl Into<String>) -> Self {
        Self {
            param: None,
            msg: msg.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("{0}")]
    Unauthorized(String),
    #[error("not the owner of this resource")]
    Forbidden,
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) | AppError::Conflict(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::InvalidCredentials | AppError::Unauthorized(_) | AppError::Forbidden => {
                StatusCode::UNAUTHORIZED
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(what) => AppError::Conflict(format!("{what} already exists")),
            StoreError::NotFound(what) => AppError::NotFound(format!("{what} not found")),
            StoreError::Backend(e) => AppError::Internal(e),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(vec![FieldError::message(rejection.body_text())])
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::Validation(errors) => json!({ "errors": errors }),
            AppError::Conflict(msg) => json!({ "errors": [FieldError::message(msg)] }),
            AppError::InvalidCredentials => {
                json!({ "errors": [FieldError::message(INVALID_CREDENTIALS)] })
            }
            AppError::Forbidden => json!({ "msg": NOT_AUTHORIZED }),
            AppError::BadRequest(msg) | AppError::Unauthorized(msg) | AppError::NotFound(msg) => {
                json!({ "msg": msg })
            }
            AppError::Internal(e) => {
                error!(error = ?e, "request failed");
                json!({ "msg": "Server Error" })
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let res = err.into_response();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn internal_errors_do_not_leak_details() {
        let (status, body) =
            body_json(AppError::Internal(anyhow::anyhow!("connection refused on 10.0.0.3"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "msg": "Server Error" }));
    }

    #[tokio::test]
    async fn validation_errors_list_params() {
        let (status, body) = body_json(AppError::Validation(vec![
            FieldError::new("email", "Please include a valid email"),
            FieldError::new("password", "Password is required"),
        ]))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["param"], "email");
        assert_eq!(body["errors"][1]["msg"], "Password is required");
    }

    #[tokio::test]
    async fn forbidden_reports_as_unauthorized() {
        let (status, body) = body_json(AppError::Forbidden).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["msg"], NOT_AUTHORIZED);
    }

    #[tokio::test]
    async fn vanished_parent_becomes_not_found() {
        let err: AppError = StoreError::NotFound("Post").into();
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "msg": "Post not found" }));
    }

    #[tokio::test]
    async fn duplicate_store_key_becomes_conflict() {
        let err: AppError = StoreError::Duplicate("User").into();
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["msg"], "User already exists");
    }
}
