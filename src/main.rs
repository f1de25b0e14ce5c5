//! finfeed-relay 入口
//!
//! 加载配置、初始化日志、组装路由并启动 HTTP 服务

mod common;
mod error;
mod generation;
mod http_client;
mod model;
mod relay;

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use generation::{GenerationState, create_generation_router};
use model::config::Config;
use relay::{RelayState, cors_layer, create_relay_router, request_span};

/// 带密钥校验和主机白名单的 HTTP 中继
#[derive(Parser, Debug)]
#[command(name = "finfeed-relay", version, about)]
struct Args {
    /// 配置文件路径（不存在时使用默认配置）
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 文件可选
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config_path = args
        .config
        .unwrap_or_else(|| Config::default_config_path().to_string());

    let mut config = Config::load(&config_path)
        .with_context(|| format!("加载配置失败: {}", config_path))?;
    config.apply_env();
    if let Some(path) = config.config_path().filter(|p| p.exists()) {
        tracing::info!("已加载配置文件: {}", path.display());
    }

    if config.effective_secret().is_none() {
        tracing::warn!("未配置 FETCH_SECRET / VERCEL_FETCH_SECRET，所有请求都将返回 401");
    }
    if config.effective_openai_api_key().is_none() {
        tracing::warn!("未配置 OPENAI_API_KEY，生成接口将返回 500");
    }
    tracing::info!(
        hosts = config.allow_hosts.len(),
        suffixes = config.allow_suffixes.len(),
        timeout_ms = config.timeout_ms,
        "白名单已加载"
    );

    let config = Arc::new(config);
    let relay_state = RelayState::new(config.clone()).context("创建数据中继失败")?;
    let generation_state = GenerationState::new(config.clone()).context("创建生成中继失败")?;

    let app = Router::new()
        .merge(create_relay_router(relay_state))
        .merge(create_generation_router(generation_state))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(cors_layer());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("监听地址失败: {}", addr))?;
    tracing::info!("服务已启动: http://{}", addr);

    axum::serve(listener, app).await.context("HTTP 服务异常退出")?;
    Ok(())
}
