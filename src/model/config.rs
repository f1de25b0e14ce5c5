use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::relay::policy::AllowPolicy;

/// 数据源白名单默认值（精确匹配）
const DEFAULT_ALLOW_HOSTS: &[&str] = &[
    "www.federalreserve.gov",
    "www.ecb.europa.eu",
    "finance.yahoo.com",
    "www.reuters.com",
    "www.cnbc.com",
    "feeds.content.dowjones.io",
    "www.coindesk.com",
    "www.bls.gov",
    "www.bea.gov",
    "home.treasury.gov",
    "stooq.com",
    "stooq.pl",
];

/// 中继服务配置
///
/// 启动时构建一次，之后只读共享
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// 共享密钥（环境变量 FETCH_SECRET / VERCEL_FETCH_SECRET）
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    /// 精确匹配的主机白名单
    #[serde(default = "default_allow_hosts")]
    pub allow_hosts: Vec<String>,

    /// 后缀匹配的域名白名单（`domain` 本身及其子域名）
    #[serde(default)]
    pub allow_suffixes: Vec<String>,

    /// 数据中继上游超时（毫秒）
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// 数据中继请求的 Accept 头
    #[serde(default = "default_accept")]
    pub accept: String,

    /// OpenAI API 密钥（仅服务端持有，不接受调用方传入）
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,

    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    #[serde(default = "default_image_model")]
    pub image_model: String,

    #[serde(default = "default_image_size")]
    pub image_size: String,

    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// 生成中继上游超时（毫秒）
    #[serde(default = "default_generation_timeout_ms")]
    pub generation_timeout_ms: u64,

    /// 部署标识，仅在诊断端点中展示
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<String>,

    /// 出站 HTTP 代理（可选）
    /// 支持格式: http://host:port, https://host:port, socks5://host:port
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,

    /// 配置文件路径（运行时元数据，不写入 JSON）
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_allow_hosts() -> Vec<String> {
    DEFAULT_ALLOW_HOSTS.iter().map(|h| h.to_string()).collect()
}

fn default_timeout_ms() -> u64 {
    12_000
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (FinFeed Fetch Relay)".to_string()
}

fn default_accept() -> String {
    "text/csv, application/rss+xml, application/xml, text/xml, application/json, text/html, text/plain, */*;q=0.1"
        .to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_image_model() -> String {
    "gpt-image-1".to_string()
}

fn default_image_size() -> String {
    "1792x1024".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f64 {
    0.3
}

fn default_generation_timeout_ms() -> u64 {
    120_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            secret: None,
            allow_hosts: default_allow_hosts(),
            allow_suffixes: Vec::new(),
            timeout_ms: default_timeout_ms(),
            user_agent: default_user_agent(),
            accept: default_accept(),
            openai_api_key: None,
            openai_base_url: default_openai_base_url(),
            image_model: default_image_model(),
            image_size: default_image_size(),
            chat_model: default_chat_model(),
            temperature: default_temperature(),
            generation_timeout_ms: default_generation_timeout_ms(),
            deployment_id: None,
            proxy_url: None,
            config_path: None,
        }
    }
}

impl Config {
    /// 获取默认配置文件路径
    pub fn default_config_path() -> &'static str {
        "config.json"
    }

    /// 从文件加载配置
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            // 配置文件不存在，返回默认配置
            let mut config = Self::default();
            config.config_path = Some(path.to_path_buf());
            return Ok(config);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        let mut config: Config = serde_json::from_str(&content)
            .with_context(|| format!("解析配置文件失败: {}", path.display()))?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// 获取配置文件路径（如果有）
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// 用进程环境变量覆盖配置
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// 用给定的查找函数覆盖配置，空白值视为未设置
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let first = |keys: &[&str]| keys.iter().find_map(|k| get(*k));

        if let Some(host) = get("HOST") {
            self.host = host;
        }
        if let Some(port) = get("PORT") {
            match port.parse() {
                Ok(port) => self.port = port,
                Err(_) => tracing::warn!("忽略无效的 PORT: {}", port),
            }
        }
        if let Some(secret) = first(&["FETCH_SECRET", "VERCEL_FETCH_SECRET"]) {
            self.secret = Some(secret);
        }
        if let Some(hosts) = get("RELAY_ALLOW_HOSTS") {
            self.allow_hosts = split_list(&hosts);
        }
        if let Some(suffixes) = get("RELAY_ALLOW_SUFFIXES") {
            self.allow_suffixes = split_list(&suffixes);
        }
        if let Some(timeout) = get("RELAY_TIMEOUT_MS") {
            match timeout.parse() {
                Ok(ms) => self.timeout_ms = ms,
                Err(_) => tracing::warn!("忽略无效的 RELAY_TIMEOUT_MS: {}", timeout),
            }
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.openai_api_key = Some(key);
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.openai_base_url = url;
        }
        if let Some(model) = get("OPENAI_IMAGE_MODEL") {
            self.image_model = model;
        }
        if let Some(size) = get("OPENAI_IMAGE_SIZE") {
            self.image_size = size;
        }
        if let Some(model) = get("OPENAI_CHAT_MODEL") {
            self.chat_model = model;
        }
        if let Some(timeout) = get("OPENAI_TIMEOUT_MS") {
            match timeout.parse() {
                Ok(ms) => self.generation_timeout_ms = ms,
                Err(_) => tracing::warn!("忽略无效的 OPENAI_TIMEOUT_MS: {}", timeout),
            }
        }
        if let Some(id) = first(&["RELAY_DEPLOYMENT_ID", "VERCEL_DEPLOYMENT_ID", "VERCEL_URL"]) {
            self.deployment_id = Some(id);
        }
        if let Some(proxy) = get("RELAY_PROXY_URL") {
            self.proxy_url = Some(proxy);
        }
    }

    /// 构建主机白名单策略
    pub fn allow_policy(&self) -> AllowPolicy {
        AllowPolicy::new(&self.allow_hosts, &self.allow_suffixes)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }

    /// 有效的共享密钥（空串视为未配置）
    pub fn effective_secret(&self) -> Option<&str> {
        self.secret
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// 有效的 OpenAI API 密钥（空串视为未配置）
    pub fn effective_openai_api_key(&self) -> Option<&str> {
        self.openai_api_key
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
