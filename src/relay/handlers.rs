//! 数据中继 HTTP 处理器

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    http::{
        HeaderValue,
        header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE, USER_AGENT},
    },
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::{NO_STORE, RelayError};

use super::middleware::RelayState;

/// 上游未返回 content-type 时使用的默认值
const DEFAULT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// GET /api/fetch 查询参数
///
/// `secret` 由认证中间件处理，这里忽略
#[derive(Debug, Deserialize)]
pub struct FetchQuery {
    pub url: Option<String>,
    pub info: Option<String>,
}

/// 诊断信息响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub ok: u8,
    pub allow_hosts: Vec<String>,
    pub allow_suffixes: Vec<String>,
    pub deployment: Option<String>,
    pub timeout_ms: u64,
    pub server_time: String,
}

/// GET /api/fetch
/// 转发到白名单内的上游并原样返回；`info=1` 时返回诊断信息
pub async fn fetch(
    State(state): State<RelayState>,
    query: Result<Query<FetchQuery>, QueryRejection>,
) -> Response {
    // 重复参数、非法百分号编码等一律按 bad url 处理
    let Query(query) = match query {
        Ok(query) => query,
        Err(e) => {
            tracing::debug!("查询参数解析失败: {}", e);
            return RelayError::bad_request("bad url").into_text_response();
        }
    };

    if query.info.as_deref().map(str::trim) == Some("1") {
        return info(&state).into_response();
    }

    match relay(&state, query.url.as_deref()).await {
        Ok(response) => response,
        Err(e) => e.into_text_response(),
    }
}

fn info(state: &RelayState) -> impl IntoResponse {
    let response = InfoResponse {
        ok: 1,
        allow_hosts: state.policy.hosts().into_iter().map(String::from).collect(),
        allow_suffixes: state
            .policy
            .suffixes()
            .into_iter()
            .map(String::from)
            .collect(),
        deployment: state.config.deployment_id.clone(),
        timeout_ms: state.config.timeout_ms,
        server_time: chrono::Utc::now().to_rfc3339(),
    };

    ([(CACHE_CONTROL, NO_STORE)], Json(response))
}

async fn relay(state: &RelayState, raw_url: Option<&str>) -> Result<Response, RelayError> {
    let raw_url = raw_url
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| RelayError::bad_request("missing url"))?;

    let url = state.policy.check_url(raw_url)?;
    let host = url.host_str().unwrap_or_default().to_string();

    let upstream = state
        .client
        .get(url)
        .header(USER_AGENT, state.config.user_agent.as_str())
        .header(ACCEPT, state.config.accept.as_str())
        .send()
        .await
        .map_err(|e| {
            tracing::warn!(host = %host, timeout = e.is_timeout(), "上游请求失败: {}", e);
            RelayError::UpstreamUnavailable(e.to_string())
        })?;

    let status = upstream.status();
    let content_type = upstream
        .headers()
        .get(CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));

    let body = upstream.bytes().await.map_err(|e| {
        tracing::warn!(host = %host, timeout = e.is_timeout(), "读取上游响应体失败: {}", e);
        RelayError::UpstreamUnavailable(e.to_string())
    })?;

    tracing::info!(
        host = %host,
        status = status.as_u16(),
        bytes = body.len(),
        "上游响应已转发"
    );

    Ok((
        status,
        [
            (CONTENT_TYPE, content_type),
            (CACHE_CONTROL, HeaderValue::from_static(NO_STORE)),
        ],
        body,
    )
        .into_response())
}

/// GET 以外的方法
pub async fn method_not_allowed() -> Response {
    RelayError::MethodNotAllowed { allow: "GET" }.into_text_response()
}

/// GET /health
pub async fn health() -> &'static str {
    "ok"
}
