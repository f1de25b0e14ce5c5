//! 生成中继路由

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::post,
};

use crate::common::auth;
use crate::model::config::Config;

use super::handlers::{complete_chat, generate_image, method_not_allowed};
use super::service::GenerationService;

/// 生成中继状态
#[derive(Clone)]
pub struct GenerationState {
    pub config: Arc<Config>,
    pub service: Arc<GenerationService>,
}

impl GenerationState {
    pub fn new(config: Arc<Config>) -> anyhow::Result<Self> {
        let service = GenerationService::new(config.clone())?;
        Ok(Self {
            config,
            service: Arc::new(service),
        })
    }
}

/// 共享密钥认证中间件（JSON 错误）
async fn generation_auth_middleware(
    State(state): State<GenerationState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match auth::authorize(&request, state.config.effective_secret()) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            tracing::warn!(path = %request.uri().path(), "密钥校验失败");
            e.into_json_response()
        }
    }
}

/// 创建生成中继路由
///
/// # 端点
/// - `POST /api/openai-image` - 图片生成
/// - `POST /api/llm` - 文本生成
pub fn create_generation_router(state: GenerationState) -> Router {
    Router::new()
        .route(
            "/api/openai-image",
            post(generate_image).fallback(method_not_allowed),
        )
        .route("/api/llm", post(complete_chat).fallback(method_not_allowed))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            generation_auth_middleware,
        ))
        .with_state(state)
}
