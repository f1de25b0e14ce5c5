//! 生成中继业务逻辑
//!
//! Input: 已通过密钥校验的生成请求
//! Output: 归一化的 `{ ok, ... }` 响应或 `RelayError`
//! Pos: OpenAI 兼容接口的转发层

use std::sync::Arc;

use reqwest::{Client, redirect};
use serde::Serialize;

use crate::common::{LOG_EXCERPT_BYTES, error_detail, truncate_with_ellipsis};
use crate::error::RelayError;
use crate::http_client::build_client;
use crate::model::config::Config;

use super::types::{
    ChatMessage, ChatPayload, ChatRequest, ImagePayload, ImageRequest, ImageResponse,
    TextResponse,
};

/// 生成服务
///
/// API 密钥只来自服务端配置
pub struct GenerationService {
    config: Arc<Config>,
    client: Client,
}

/// 取出非空的 prompt
fn require_prompt(prompt: &str) -> Result<String, RelayError> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(RelayError::bad_request("missing prompt"));
    }
    Ok(prompt.to_string())
}

/// 可选字段：空白视为缺失
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl GenerationService {
    pub fn new(config: Arc<Config>) -> anyhow::Result<Self> {
        let client = build_client(
            config.proxy_url.as_deref(),
            config.generation_timeout(),
            redirect::Policy::none(),
        )?;
        Ok(Self { config, client })
    }

    /// 图片生成，返回 `data[0].b64_json`
    pub async fn generate_image(&self, request: ImageRequest) -> Result<ImageResponse, RelayError> {
        let prompt = require_prompt(&request.prompt)?;

        let payload = ImagePayload {
            model: non_blank(request.model).unwrap_or_else(|| self.config.image_model.clone()),
            prompt,
            size: non_blank(request.size).unwrap_or_else(|| self.config.image_size.clone()),
            response_format: "b64_json",
            quality: non_blank(request.quality),
            style: non_blank(request.style),
            n: request.n,
        };

        tracing::info!(model = %payload.model, size = %payload.size, "转发图片生成请求");
        let text = self.post_json("images/generations", &payload).await?;

        let parsed = serde_json::from_str::<serde_json::Value>(&text).ok();
        let b64 = parsed
            .as_ref()
            .and_then(|v| v.pointer("/data/0/b64_json"))
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty());

        match b64 {
            Some(b64) => Ok(ImageResponse {
                ok: 1,
                b64_json: b64.to_string(),
            }),
            None => {
                tracing::warn!("上游响应中缺少 b64_json");
                let detail = match parsed {
                    Some(value) => error_detail(&value.to_string()),
                    None => error_detail(&text),
                };
                Err(RelayError::UpstreamMalformed {
                    error: "no_b64_json",
                    detail,
                })
            }
        }
    }

    /// 文本生成，返回 `choices[0].message.content`
    pub async fn complete_chat(&self, request: ChatRequest) -> Result<TextResponse, RelayError> {
        let prompt = require_prompt(&request.prompt)?;

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = non_blank(request.system) {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let payload = ChatPayload {
            model: non_blank(request.model).unwrap_or_else(|| self.config.chat_model.clone()),
            messages,
            temperature: request.temperature.unwrap_or(self.config.temperature),
        };

        tracing::info!(model = %payload.model, "转发文本生成请求");
        let text = self.post_json("chat/completions", &payload).await?;

        let value: serde_json::Value = serde_json::from_str(&text).map_err(|_| {
            tracing::warn!("上游返回了无法解析的 JSON");
            RelayError::UpstreamMalformed {
                error: "invalid_upstream_json",
                detail: error_detail(&text),
            }
        })?;

        let content = value
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        Ok(TextResponse {
            ok: 1,
            text: content,
        })
    }

    /// 发送 JSON POST 请求，成功时返回原始响应文本
    async fn post_json<P: Serialize>(&self, path: &str, payload: &P) -> Result<String, RelayError> {
        let api_key = self.config.effective_openai_api_key().ok_or_else(|| {
            tracing::error!("OPENAI_API_KEY 未配置");
            RelayError::ServerMisconfigured("OPENAI_API_KEY is missing".to_string())
        })?;

        let url = format!(
            "{}/{}",
            self.config.openai_base_url.trim_end_matches('/'),
            path
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(path = %path, timeout = e.is_timeout(), "生成接口请求失败: {}", e);
                RelayError::UpstreamUnavailable(e.to_string())
            })?;

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) if status.is_success() => {
                tracing::warn!(path = %path, timeout = e.is_timeout(), "读取生成接口响应失败: {}", e);
                return Err(RelayError::UpstreamUnavailable(e.to_string()));
            }
            // 错误响应体读取失败时只保留状态码
            Err(_) => String::new(),
        };

        // 生成客户端不跟随重定向，3xx 等非错误状态视为上游响应异常
        if !status.is_success() && !status.is_client_error() && !status.is_server_error() {
            tracing::warn!(path = %path, status = status.as_u16(), "生成接口返回了意外的状态码");
            return Err(RelayError::UpstreamMalformed {
                error: "unexpected_upstream_status",
                detail: error_detail(&format!("status {}: {}", status.as_u16(), text)),
            });
        }

        if !status.is_success() {
            tracing::warn!(
                path = %path,
                status = status.as_u16(),
                "生成接口返回错误: {}",
                truncate_with_ellipsis(&text, LOG_EXCERPT_BYTES)
            );
            #[cfg(feature = "sensitive-logs")]
            tracing::debug!(path = %path, body = %text, "生成接口完整错误响应");

            return Err(RelayError::UpstreamRejected {
                status,
                detail: error_detail(&text),
            });
        }

        Ok(text)
    }
}
