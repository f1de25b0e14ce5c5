//! 数据中继中间件

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::common::auth;
use crate::http_client::build_client;
use crate::model::config::Config;

use super::policy::{AllowPolicy, redirect_policy};

/// 数据中继共享状态
#[derive(Clone)]
pub struct RelayState {
    /// 只读配置
    pub config: Arc<Config>,
    /// 主机白名单
    pub policy: Arc<AllowPolicy>,
    /// 出站客户端（带截止时间和白名单重定向策略）
    pub client: reqwest::Client,
}

impl RelayState {
    pub fn new(config: Arc<Config>) -> anyhow::Result<Self> {
        let policy = Arc::new(config.allow_policy());
        let client = build_client(
            config.proxy_url.as_deref(),
            config.timeout(),
            redirect_policy(policy.clone()),
        )?;

        Ok(Self {
            config,
            policy,
            client,
        })
    }
}

/// 共享密钥认证中间件（纯文本错误）
pub async fn relay_auth_middleware(
    State(state): State<RelayState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match auth::authorize(&request, state.config.effective_secret()) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            tracing::warn!(path = %request.uri().path(), "密钥校验失败");
            e.into_text_response()
        }
    }
}

/// CORS 中间件层
///
/// 允许所有来源，密钥通过请求头或查询参数传递，不依赖 Cookie。
pub fn cors_layer() -> tower_http::cors::CorsLayer {
    use tower_http::cors::{Any, CorsLayer};

    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// 为每个请求创建 tracing span
///
/// 只记录路径，查询参数中可能携带密钥
pub fn request_span(request: &Request<Body>) -> tracing::Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id,
    )
}
