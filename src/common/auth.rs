//! 共享密钥认证
//!
//! Input: 请求头、查询参数、配置的密钥
//! Output: 认证结果
//! Pos: 所有中继路由共用的密钥校验

use axum::{
    body::Body,
    extract::Query,
    http::{Request, header::AUTHORIZATION},
};
use serde::Deserialize;
use subtle::ConstantTimeEq;

use crate::error::RelayError;

/// 自定义密钥请求头
pub const SECRET_HEADER: &str = "x-proxy-secret";

#[derive(Debug, Deserialize)]
struct SecretQuery {
    secret: Option<String>,
}

/// 从请求中提取候选密钥
///
/// 优先级：`x-proxy-secret` 头 > `Authorization: Bearer <token>` > `?secret=` 查询参数。
/// 空白值视为缺失。
pub fn extract_secret(request: &Request<Body>) -> Option<String> {
    let headers = request.headers();

    let from_header = headers
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(token) = from_header {
        return Some(token.to_string());
    }

    let from_bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(strip_bearer)
        .filter(|v| !v.is_empty());
    if let Some(token) = from_bearer {
        return Some(token.to_string());
    }

    Query::<SecretQuery>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(q)| q.secret)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// 去掉 `Bearer ` 前缀（大小写不敏感）
fn strip_bearer(value: &str) -> Option<&str> {
    const PREFIX: &str = "bearer ";

    let value = value.trim_start();
    let head = value.get(..PREFIX.len())?;
    if head.eq_ignore_ascii_case(PREFIX) {
        Some(value[PREFIX.len()..].trim())
    } else {
        None
    }
}

/// 常量时间字符串比较，防止时序攻击
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// 校验请求携带的密钥
///
/// 未配置密钥时一律拒绝
pub fn authorize(request: &Request<Body>, secret: Option<&str>) -> Result<(), RelayError> {
    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        return Err(RelayError::Unauthorized);
    };

    match extract_secret(request) {
        Some(token) if constant_time_eq(&token, secret) => Ok(()),
        _ => Err(RelayError::Unauthorized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str, headers: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_extract_from_custom_header() {
        let req = request("/api/fetch", &[("x-proxy-secret", "  s3cret ")]);
        assert_eq!(extract_secret(&req).as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_extract_from_bearer_case_insensitive() {
        let req = request("/api/fetch", &[("authorization", "BEARER abc")]);
        assert_eq!(extract_secret(&req).as_deref(), Some("abc"));

        let req = request("/api/fetch", &[("authorization", "Basic abc")]);
        assert_eq!(extract_secret(&req), None);
    }

    #[test]
    fn test_extract_from_query() {
        let req = request("/api/fetch?url=x&secret=q%20v", &[]);
        assert_eq!(extract_secret(&req).as_deref(), Some("q v"));
    }

    #[test]
    fn test_extract_priority() {
        let req = request(
            "/api/fetch?secret=from-query",
            &[
                ("authorization", "Bearer from-bearer"),
                ("x-proxy-secret", "from-header"),
            ],
        );
        assert_eq!(extract_secret(&req).as_deref(), Some("from-header"));

        let req = request(
            "/api/fetch?secret=from-query",
            &[("authorization", "Bearer from-bearer")],
        );
        assert_eq!(extract_secret(&req).as_deref(), Some("from-bearer"));
    }

    #[test]
    fn test_blank_header_falls_through() {
        let req = request("/api/fetch?secret=q", &[("x-proxy-secret", "   ")]);
        assert_eq!(extract_secret(&req).as_deref(), Some("q"));
    }

    #[test]
    fn test_authorize() {
        let req = request("/", &[("x-proxy-secret", "s3cret")]);
        assert!(authorize(&req, Some("s3cret")).is_ok());
        assert!(authorize(&req, Some("other")).is_err());
        assert!(authorize(&req, Some("")).is_err());
        assert!(authorize(&req, None).is_err());

        let req = request("/", &[]);
        assert!(authorize(&req, Some("s3cret")).is_err());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
    }
}
