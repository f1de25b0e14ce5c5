//! 中继错误类型
//!
//! 数据中继以纯文本返回错误，生成中继以 `{ ok: 0, error, detail? }` JSON 返回错误。

use std::fmt;

use axum::{
    Json,
    http::{
        HeaderValue, StatusCode,
        header::{ALLOW, CACHE_CONTROL},
    },
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// 禁止缓存的响应头值
pub const NO_STORE: &str = "no-store";

#[derive(Debug)]
pub enum RelayError {
    /// 密钥缺失或不匹配
    Unauthorized,
    /// 缺少参数、URL 非法、协议不支持、缺少必填字段
    BadRequest(String),
    /// 目标主机不在白名单中
    Forbidden(String),
    /// 请求方法不被允许
    MethodNotAllowed { allow: &'static str },
    /// 超时或网络错误（内容仅用于日志）
    UpstreamUnavailable(String),
    /// 上游返回非 2xx（生成中继透传状态码）
    UpstreamRejected { status: StatusCode, detail: String },
    /// 上游成功返回但响应结构不符合预期
    UpstreamMalformed { error: &'static str, detail: String },
    /// 服务端缺少必要配置
    ServerMisconfigured(String),
}

impl RelayError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::UpstreamUnavailable(_) | Self::UpstreamMalformed { .. } => {
                StatusCode::BAD_GATEWAY
            }
            Self::UpstreamRejected { status, .. } => *status,
            Self::ServerMisconfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 数据中继使用的简短文本
    pub fn plain_message(&self) -> String {
        match self {
            Self::Unauthorized => "unauthorized".to_string(),
            Self::BadRequest(msg) | Self::Forbidden(msg) => msg.clone(),
            Self::MethodNotAllowed { .. } => "method not allowed".to_string(),
            Self::UpstreamUnavailable(_) | Self::UpstreamMalformed { .. } => {
                "fetch error".to_string()
            }
            Self::UpstreamRejected { status, .. } => format!("upstream error {}", status.as_u16()),
            Self::ServerMisconfigured(_) => "server misconfigured".to_string(),
        }
    }

    /// 生成中继使用的 JSON 错误信封
    pub fn to_envelope(&self) -> ErrorEnvelope {
        let (error, detail) = match self {
            Self::Unauthorized => ("unauthorized".to_string(), None),
            Self::BadRequest(msg) | Self::Forbidden(msg) | Self::ServerMisconfigured(msg) => {
                (msg.clone(), None)
            }
            Self::MethodNotAllowed { .. } => ("method not allowed".to_string(), None),
            Self::UpstreamUnavailable(_) => ("upstream_unavailable".to_string(), None),
            Self::UpstreamRejected { status, detail } => (
                format!("openai_error_{}", status.as_u16()),
                Some(detail.clone()),
            ),
            Self::UpstreamMalformed { error, detail } => {
                (error.to_string(), Some(detail.clone()))
            }
        };

        ErrorEnvelope {
            ok: 0,
            error,
            detail,
        }
    }

    /// 纯文本错误响应（数据中继）
    pub fn into_text_response(self) -> Response {
        let mut response = (self.status_code(), self.plain_message()).into_response();
        self.decorate(&mut response);
        response
    }

    /// JSON 错误响应（生成中继）
    pub fn into_json_response(self) -> Response {
        let mut response = (self.status_code(), Json(self.to_envelope())).into_response();
        self.decorate(&mut response);
        response
    }

    fn decorate(&self, response: &mut Response) {
        let headers = response.headers_mut();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static(NO_STORE));
        if let Self::MethodNotAllowed { allow } = self {
            headers.insert(ALLOW, HeaderValue::from_static(*allow));
        }
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::BadRequest(msg) => write!(f, "bad request: {}", msg),
            Self::Forbidden(msg) => write!(f, "forbidden: {}", msg),
            Self::MethodNotAllowed { allow } => write!(f, "method not allowed (allow: {})", allow),
            Self::UpstreamUnavailable(msg) => write!(f, "upstream unavailable: {}", msg),
            Self::UpstreamRejected { status, .. } => write!(f, "upstream rejected: {}", status),
            Self::UpstreamMalformed { error, .. } => write!(f, "upstream malformed: {}", error),
            Self::ServerMisconfigured(msg) => write!(f, "server misconfigured: {}", msg),
        }
    }
}

impl std::error::Error for RelayError {}

/// 失败响应信封
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub ok: u8,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
