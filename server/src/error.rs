use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use banana_shared::ErrorBody;

use crate::upstream::{upstream_error_message, UpstreamError};

pub const RETRY_AFTER: &str = "60s";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("rate limited: {message}")]
    RateLimited { message: String, retry_after: String },
    #[error("upstream {status}: {message}")]
    Upstream { status: StatusCode, message: String },
    #[error("{0}")]
    Internal(String),
}

impl From<UpstreamError> for ApiError {
    fn from(error: UpstreamError) -> Self {
        match error {
            UpstreamError::Status { status: 429, body } => ApiError::RateLimited {
                message: upstream_error_message(&body)
                    .unwrap_or_else(|| "请求过于频繁，请稍后重试".to_string()),
                retry_after: RETRY_AFTER.to_string(),
            },
            UpstreamError::Status { status, body } => {
                // Only structured upstream errors keep their status code.
                let parsed = serde_json::from_str::<serde_json::Value>(&body).is_ok();
                match StatusCode::from_u16(status) {
                    Ok(code) if parsed => ApiError::Upstream {
                        status: code,
                        message: upstream_error_message(&body)
                            .unwrap_or_else(|| format!("请求失败: {status}")),
                    },
                    _ => ApiError::Internal(format!("API request failed: {status}")),
                }
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream { status, .. } => *status,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        match self {
            ApiError::BadRequest(message) => ErrorBody {
                error: message.clone(),
                message: message.clone(),
                retry_after: None,
            },
            ApiError::RateLimited {
                message,
                retry_after,
            } => ErrorBody {
                error: "API 配额超限".to_string(),
                message: message.clone(),
                retry_after: Some(retry_after.clone()),
            },
            ApiError::Upstream { message, .. } => ErrorBody {
                error: "API 请求失败".to_string(),
                message: message.clone(),
                retry_after: None,
            },
            ApiError::Internal(message) => ErrorBody {
                error: "Failed to generate image".to_string(),
                message: message.clone(),
                retry_after: None,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
