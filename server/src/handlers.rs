use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use banana_shared::{AnalyzeRequest, AnalyzeResponse, GenerateRequest, GenerateResponse};
use tracing::info;

use crate::analysis::analyze_images;
use crate::error::ApiError;
use crate::generation::generate_image;
use crate::state::AppState;

pub async fn ping_handler() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

pub async fn analyze_handler(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return ApiError::BadRequest(rejection.body_text()).into_response(),
    };
    if request.images.is_empty() {
        return ApiError::BadRequest("No images provided".to_string()).into_response();
    }
    info!(images = request.images.len(), "analyzing images");

    let outcome = analyze_images(state.model.as_ref(), &state.analyze, &request.images).await;
    match outcome.fallback_reason {
        None => Json(AnalyzeResponse {
            tags: outcome.tags,
            ..Default::default()
        })
        .into_response(),
        Some(reason) if state.analyze_strict => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(AnalyzeResponse {
                tags: Vec::new(),
                error: Some(true),
                message: Some(reason),
                ..Default::default()
            }),
        )
            .into_response(),
        Some(reason) => Json(AnalyzeResponse {
            tags: outcome.tags,
            is_mock: Some(true),
            message: Some(format!("Using fallback tags due to API error: {reason}")),
            ..Default::default()
        })
        .into_response(),
    }
}

pub async fn generate_handler(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let response = generate_image(state.model.as_ref(), &state.generate, request).await?;
    info!(mode = ?response.mode, with_text = response.text.is_some(), "generation finished");
    Ok(Json(response))
}
