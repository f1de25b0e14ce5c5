//! 生成中继类型定义

use serde::{Deserialize, Serialize};

// === 入站请求 ===

/// POST /api/openai-image 请求体
#[derive(Debug, Default, Deserialize)]
pub struct ImageRequest {
    #[serde(default)]
    pub prompt: String,
    pub model: Option<String>,
    pub size: Option<String>,
    pub quality: Option<String>,
    pub style: Option<String>,
    pub n: Option<u32>,
}

/// POST /api/llm 请求体
#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub prompt: String,
    pub system: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
}

// === 上游请求 ===

/// 图片生成上游请求体
#[derive(Debug, Serialize)]
pub struct ImagePayload {
    pub model: String,
    pub prompt: String,
    pub size: String,
    pub response_format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
}

/// Chat Completions 上游请求体
#[derive(Debug, Serialize)]
pub struct ChatPayload {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

// === 出站响应 ===

/// 图片生成成功响应
#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub ok: u8,
    pub b64_json: String,
}

/// 文本生成成功响应
#[derive(Debug, Serialize)]
pub struct TextResponse {
    pub ok: u8,
    pub text: String,
}

/// 宽松解析请求体：非法 JSON 按空对象处理
pub fn parse_body<T>(body: &[u8]) -> Result<T, serde_json::Error>
where
    T: Default + for<'de> Deserialize<'de>,
{
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(serde_json::Value::Null) | Err(_) => Ok(T::default()),
        Ok(value) => serde_json::from_value(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_request_optional_fields() {
        let json = r#"{"prompt": "bull market at dawn", "quality": "hd", "n": 1}"#;
        let req: ImageRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.prompt, "bull market at dawn");
        assert_eq!(req.quality.as_deref(), Some("hd"));
        assert_eq!(req.n, Some(1));
        assert!(req.model.is_none());
        assert!(req.size.is_none());
    }

    #[test]
    fn test_image_payload_skips_absent_fields() {
        let payload = ImagePayload {
            model: "gpt-image-1".to_string(),
            prompt: "chart".to_string(),
            size: "1792x1024".to_string(),
            response_format: "b64_json",
            quality: None,
            style: Some("vivid".to_string()),
            n: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["response_format"], "b64_json");
        assert_eq!(json["style"], "vivid");
        assert!(json.get("quality").is_none());
        assert!(json.get("n").is_none());
    }

    #[test]
    fn test_parse_body_tolerates_invalid_json() {
        let req: ChatRequest = parse_body(b"not json").unwrap();
        assert!(req.prompt.is_empty());

        let req: ChatRequest = parse_body(b"").unwrap();
        assert!(req.prompt.is_empty());

        let req: ChatRequest = parse_body(b"null").unwrap();
        assert!(req.prompt.is_empty());
    }

    #[test]
    fn test_parse_body_rejects_wrong_types() {
        let result: Result<ImageRequest, _> = parse_body(br#"{"prompt": 42}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_chat_request() {
        let req: ChatRequest = parse_body(
            br#"{"system": "You are a markets analyst", "prompt": "Summarize CPI", "temperature": 0.7}"#,
        )
        .unwrap();
        assert_eq!(req.system.as_deref(), Some("You are a markets analyst"));
        assert_eq!(req.prompt, "Summarize CPI");
        assert_eq!(req.temperature, Some(0.7));
    }
}
