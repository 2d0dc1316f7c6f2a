use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestInit, Response};

use banana_shared::{
    AnalyzeRequest, AnalyzeResponse, ErrorBody, GenerateRequest, GenerateResponse,
};

pub const ANALYZE_PATH: &str = "/analyze";
pub const GENERATE_PATH: &str = "/generate";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    Status {
        status: u16,
        message: String,
        retry_after: Option<String>,
    },
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Text for the alert shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Status {
                status: 429,
                message,
                retry_after,
            } => match retry_after {
                Some(delay) => format!("{message} (retry after {delay})"),
                None => message.clone(),
            },
            other => other.to_string(),
        }
    }
}

fn js_error(value: JsValue) -> ApiError {
    ApiError::Network(value.as_string().unwrap_or_else(|| format!("{value:?}")))
}

/// Any JSON object carrying a `message`, such as the strict `/analyze` failure body.
#[derive(Deserialize)]
struct MessageOnly {
    message: String,
}

/// Builds the error for a non-2xx reply from its body text.
pub fn status_error(status: u16, body: &str) -> ApiError {
    if let Ok(body) = serde_json::from_str::<ErrorBody>(body) {
        return ApiError::Status {
            status,
            message: if body.message.is_empty() {
                body.error
            } else {
                body.message
            },
            retry_after: body.retry_after,
        };
    }
    let message = serde_json::from_str::<MessageOnly>(body)
        .ok()
        .map(|body| body.message)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| format!("request failed with status {status}"));
    ApiError::Status {
        status,
        message,
        retry_after: None,
    }
}

async fn post_json<B: Serialize, R: DeserializeOwned>(path: &str, body: &B) -> Result<R, ApiError> {
    let window = web_sys::window().ok_or_else(|| ApiError::Network("no window".to_string()))?;
    let payload = serde_json::to_string(body).map_err(|error| ApiError::Decode(error.to_string()))?;

    let init = RequestInit::new();
    init.set_method("POST");
    init.set_body(&JsValue::from_str(&payload));
    let request = Request::new_with_str_and_init(path, &init).map_err(js_error)?;
    request
        .headers()
        .set("Content-Type", "application/json")
        .map_err(js_error)?;

    let response: Response = JsFuture::from(window.fetch_with_request(&request))
        .await
        .map_err(js_error)?
        .dyn_into()
        .map_err(js_error)?;
    let text = JsFuture::from(response.text().map_err(js_error)?)
        .await
        .map_err(js_error)?
        .as_string()
        .unwrap_or_default();

    if !response.ok() {
        log::warn!("{path} answered {}", response.status());
        return Err(status_error(response.status(), &text));
    }
    serde_json::from_str(&text).map_err(|error| ApiError::Decode(error.to_string()))
}

pub async fn analyze(images: Vec<String>) -> Result<AnalyzeResponse, ApiError> {
    post_json(ANALYZE_PATH, &AnalyzeRequest { images }).await
}

pub async fn generate(request: &GenerateRequest) -> Result<GenerateResponse, ApiError> {
    post_json(GENERATE_PATH, request).await
}
