//! 目标主机白名单
//!
//! Input: 调用方提供的目标 URL
//! Output: 校验后的 `Url` 或 `RelayError`
//! Pos: 数据中继的 SSRF 防护层

use std::collections::BTreeSet;
use std::sync::Arc;

use reqwest::{Url, redirect};

use crate::error::RelayError;

/// 最多跟随的重定向次数
const MAX_REDIRECTS: usize = 10;

/// 主机白名单：精确主机集合 + 后缀域名集合
///
/// 后缀域名 `d` 匹配 `d` 本身以及以 `.d` 结尾的主机，
/// 比较忽略 ASCII 大小写和末尾的 `.`。后缀可以写成 `.d`，
/// IPv6 地址带不带方括号均可。
#[derive(Debug, Clone, Default)]
pub struct AllowPolicy {
    hosts: BTreeSet<String>,
    suffixes: BTreeSet<String>,
}

fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    host.trim_end_matches('.').to_ascii_lowercase()
}

fn normalize_suffix(domain: &str) -> String {
    let domain = normalize_host(domain);
    domain
        .strip_prefix('.')
        .map(str::to_string)
        .unwrap_or(domain)
}

impl AllowPolicy {
    pub fn new<H, S>(hosts: H, suffixes: S) -> Self
    where
        H: IntoIterator,
        H::Item: AsRef<str>,
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        let collect = |items: Vec<String>| {
            items
                .into_iter()
                .filter(|h| !h.is_empty())
                .collect::<BTreeSet<_>>()
        };

        Self {
            hosts: collect(hosts.into_iter().map(|h| normalize_host(h.as_ref())).collect()),
            suffixes: collect(
                suffixes
                    .into_iter()
                    .map(|d| normalize_suffix(d.as_ref()))
                    .collect(),
            ),
        }
    }

    /// 主机是否被允许
    pub fn is_allowed(&self, host: &str) -> bool {
        let host = normalize_host(host);
        if host.is_empty() {
            return false;
        }
        if self.hosts.contains(&host) {
            return true;
        }
        self.suffixes.iter().any(|domain| {
            host == *domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|rest| rest.ends_with('.'))
        })
    }

    pub fn hosts(&self) -> Vec<&str> {
        self.hosts.iter().map(String::as_str).collect()
    }

    pub fn suffixes(&self) -> Vec<&str> {
        self.suffixes.iter().map(String::as_str).collect()
    }

    /// 解析并校验目标 URL
    ///
    /// 协议必须是 http/https，主机必须在白名单中
    pub fn check_url(&self, raw: &str) -> Result<Url, RelayError> {
        let url = Url::parse(raw.trim()).map_err(|_| RelayError::bad_request("bad url"))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(RelayError::bad_request("bad protocol"));
        }

        let host = url
            .host_str()
            .ok_or_else(|| RelayError::bad_request("bad url"))?;
        if !self.is_allowed(host) {
            tracing::debug!(host = %host, "目标主机不在白名单中");
            return Err(RelayError::forbidden("host not allowed"));
        }

        Ok(url)
    }
}

/// 重定向策略：每一跳都重新校验白名单
pub fn redirect_policy(policy: Arc<AllowPolicy>) -> redirect::Policy {
    redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }

        let url = attempt.url();
        let allowed = matches!(url.scheme(), "http" | "https")
            && url.host_str().is_some_and(|host| policy.is_allowed(host));
        if allowed {
            attempt.follow()
        } else {
            let host = url.host_str().unwrap_or_default().to_string();
            tracing::warn!(host = %host, "拒绝跟随重定向到白名单以外的主机");
            attempt.error(format!("redirect to host not allowed: {}", host))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact() -> AllowPolicy {
        AllowPolicy::new(["www.cnbc.com", "stooq.com"], Vec::<String>::new())
    }

    fn suffix() -> AllowPolicy {
        AllowPolicy::new(Vec::<String>::new(), ["cnbc.com", "treasury.gov."])
    }

    #[test]
    fn test_exact_match() {
        let policy = exact();
        assert!(policy.is_allowed("www.cnbc.com"));
        assert!(policy.is_allowed("STOOQ.com"));
        assert!(policy.is_allowed("stooq.com."));
        // 精确模式不允许子域名
        assert!(!policy.is_allowed("api.stooq.com"));
        assert!(!policy.is_allowed("cnbc.com"));
    }

    #[test]
    fn test_suffix_match_on_dot_boundary() {
        let policy = suffix();
        assert!(policy.is_allowed("cnbc.com"));
        assert!(policy.is_allowed("www.cnbc.com"));
        assert!(policy.is_allowed("a.b.cnbc.com"));
        assert!(policy.is_allowed("home.treasury.gov"));
    }

    #[test]
    fn test_lookalike_domains_rejected() {
        let policy = suffix();
        assert!(!policy.is_allowed("notcnbc.com"));
        assert!(!policy.is_allowed("evilcnbc.com"));
        assert!(!policy.is_allowed("cnbc.com.evil.net"));
        assert!(!policy.is_allowed("com"));
        assert!(!policy.is_allowed(""));
    }

    #[test]
    fn test_empty_entries_never_match() {
        let policy = AllowPolicy::new(["", "  "], ["."]);
        assert!(policy.hosts().is_empty());
        assert!(policy.suffixes().is_empty());
        assert!(!policy.is_allowed("example.com"));
    }

    #[test]
    fn test_check_url_errors() {
        let policy = exact();

        let err = policy.check_url("not a url").unwrap_err();
        assert!(matches!(err, RelayError::BadRequest(ref m) if m == "bad url"));

        let err = policy.check_url("ftp://stooq.com/q.csv").unwrap_err();
        assert!(matches!(err, RelayError::BadRequest(ref m) if m == "bad protocol"));

        let err = policy.check_url("javascript:alert(1)").unwrap_err();
        assert!(matches!(err, RelayError::BadRequest(ref m) if m == "bad protocol"));

        let err = policy.check_url("https://notcnbc.com/rss").unwrap_err();
        assert!(matches!(err, RelayError::Forbidden(_)));

        // 主机名在路径或查询参数中出现不算匹配
        let err = policy
            .check_url("https://evil.example/www.cnbc.com?h=stooq.com")
            .unwrap_err();
        assert!(matches!(err, RelayError::Forbidden(_)));
    }

    #[test]
    fn test_check_url_ok() {
        let policy = exact();
        let url = policy
            .check_url("https://stooq.com/q/l/?s=spy.us&f=sd2t2ohlcv&e=csv")
            .unwrap();
        assert_eq!(url.host_str(), Some("stooq.com"));

        let url = policy.check_url("http://WWW.CNBC.COM/id/100003114/device/rss").unwrap();
        assert_eq!(url.host_str(), Some("www.cnbc.com"));
    }

    #[test]
    fn test_leading_dot_suffix() {
        let policy = AllowPolicy::new(Vec::<String>::new(), [".cnbc.com", " .Treasury.gov. "]);
        assert_eq!(policy.suffixes(), vec!["cnbc.com", "treasury.gov"]);
        assert!(policy.is_allowed("www.cnbc.com"));
        assert!(policy.is_allowed("cnbc.com"));
        assert!(policy.is_allowed("home.treasury.gov"));
        assert!(!policy.is_allowed("notcnbc.com"));
    }

    #[test]
    fn test_ipv6_hosts() {
        for entry in ["::1", "[::1]"] {
            let policy = AllowPolicy::new([entry], Vec::<String>::new());
            assert_eq!(policy.hosts(), vec!["::1"]);

            let url = policy.check_url("http://[::1]:8080/x").unwrap();
            assert_eq!(url.port(), Some(8080));

            let err = policy.check_url("http://[::2]/x").unwrap_err();
            assert!(matches!(err, RelayError::Forbidden(_)));
        }
    }
}
