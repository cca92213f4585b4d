//! Anthropic Messages API
//!
//! 直接用 `reqwest` 调 `/messages`，取第一个文本块

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::ModelBackend;
use crate::config::Config;
use crate::error::{BackendError, ConfigError};
use crate::models::PromptContext;

const PROVIDER: &str = "anthropic";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Anthropic 模型后端
pub struct AnthropicBackend {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
    model_name: String,
    max_tokens: u32,
    temperature: f32,
}

impl AnthropicBackend {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let api_key = config
            .anthropic_api_key
            .clone()
            .ok_or_else(|| ConfigError::Missing {
                var_name: "ANTHROPIC_API_KEY".to_string(),
                hint: "使用 Anthropic 时必须提供".to_string(),
            })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.llm_timeout_secs))
            .build()
            .map_err(|e| ConfigError::invalid("LLM_TIMEOUT", e.to_string()))?;

        Ok(Self {
            api_key,
            http,
            base_url: config.anthropic_api_base_url.trim_end_matches('/').to_string(),
            model_name: config.anthropic_model.clone(),
            max_tokens: config.llm_max_tokens,
            temperature: config.llm_temperature,
        })
    }

    fn headers(&self) -> Result<HeaderMap, BackendError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&self.api_key).map_err(|e| BackendError::RequestBuild {
            provider: PROVIDER.to_string(),
            message: e.to_string(),
        })?;
        headers.insert("x-api-key", key);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn request_failed(e: reqwest::Error) -> BackendError {
        BackendError::RequestFailed {
            provider: PROVIDER.to_string(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl ModelBackend for AnthropicBackend {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn solve(&self, context: &PromptContext) -> Result<String, BackendError> {
        let url = format!("{}/messages", self.base_url);
        let request = MessagesRequest {
            model: &self.model_name,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: &context.system_instruction,
            messages: vec![Message {
                role: "user",
                content: context.user_message(),
            }],
        };

        debug!(model = %self.model_name, "Anthropic 请求");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await
            .map_err(Self::request_failed)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.map_err(Self::request_failed)?;
            warn!("Anthropic API 返回错误 ({}): {}", status, body);
            return Err(BackendError::BadStatus {
                provider: PROVIDER.to_string(),
                status,
                body,
            });
        }

        let parsed: MessagesResponse = response.json().await.map_err(Self::request_failed)?;
        first_text_block(parsed).ok_or_else(|| BackendError::EmptyCompletion {
            provider: PROVIDER.to_string(),
        })
    }
}

fn first_text_block(response: MessagesResponse) -> Option<String> {
    response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .map(|text| text.trim().to_string())
        .find(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_text_block() {
        let response: MessagesResponse = serde_json::from_str(
            r#"{"content": [
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "  {\"answer\": 1}  "}
            ]}"#,
        )
        .unwrap();
        assert_eq!(first_text_block(response).as_deref(), Some(r#"{"answer": 1}"#));

        let empty: MessagesResponse = serde_json::from_str(r#"{"content": []}"#).unwrap();
        assert_eq!(first_text_block(empty), None);
    }

    #[test]
    fn test_request_shape() {
        let request = MessagesRequest {
            model: "claude-sonnet-4-20250514",
            max_tokens: 4000,
            temperature: 0.1,
            system: "sys",
            messages: vec![Message {
                role: "user",
                content: "hi".to_string(),
            }],
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["max_tokens"], 4000);
        assert_eq!(body["system"], "sys");
    }
}
