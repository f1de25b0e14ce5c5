//! 生成中继 HTTP 处理器

use axum::{
    Json,
    extract::State,
    http::header::CACHE_CONTROL,
    response::{IntoResponse, Response},
};
use bytes::Bytes;

use crate::error::{NO_STORE, RelayError};

use super::router::GenerationState;
use super::types::{ChatRequest, ImageRequest, parse_body};

/// POST /api/openai-image
/// 生成图片，返回 `{ ok: 1, b64_json }`
pub async fn generate_image(State(state): State<GenerationState>, body: Bytes) -> Response {
    let request: ImageRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(_) => return RelayError::bad_request("invalid request body").into_json_response(),
    };

    match state.service.generate_image(request).await {
        Ok(response) => ([(CACHE_CONTROL, NO_STORE)], Json(response)).into_response(),
        Err(e) => e.into_json_response(),
    }
}

/// POST /api/llm
/// 生成文本，返回 `{ ok: 1, text }`
pub async fn complete_chat(State(state): State<GenerationState>, body: Bytes) -> Response {
    let request: ChatRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(_) => return RelayError::bad_request("invalid request body").into_json_response(),
    };

    match state.service.complete_chat(request).await {
        Ok(response) => ([(CACHE_CONTROL, NO_STORE)], Json(response)).into_response(),
        Err(e) => e.into_json_response(),
    }
}

/// POST 以外的方法
pub async fn method_not_allowed() -> Response {
    RelayError::MethodNotAllowed { allow: "POST" }.into_json_response()
}
