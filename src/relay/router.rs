//! 数据中继路由配置

use axum::{Router, middleware, routing::get};

use super::{
    handlers::{fetch, health, method_not_allowed},
    middleware::{RelayState, relay_auth_middleware},
};

/// 创建数据中继路由
///
/// # 端点
/// - `GET /api/fetch?url=<absolute url>` - 转发到白名单内的上游
/// - `GET /api/fetch?info=1` - 返回白名单和部署标识
/// - `GET /health` - 健康检查
///
/// # 认证
/// 所有端点都需要共享密钥，支持：
/// - `x-proxy-secret` header
/// - `Authorization: Bearer <token>` header
/// - `?secret=<token>` 查询参数
pub fn create_relay_router(state: RelayState) -> Router {
    Router::new()
        .route("/api/fetch", get(fetch).fallback(method_not_allowed))
        .route("/health", get(health))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            relay_auth_middleware,
        ))
        .with_state(state)
}
