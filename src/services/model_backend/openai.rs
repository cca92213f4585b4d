//! OpenAI 兼容接口
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型（默认走 aipipe 代理）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use super::ModelBackend;
use crate::config::Config;
use crate::error::{BackendError, ConfigError};
use crate::models::PromptContext;

const PROVIDER: &str = "openai";

/// OpenAI 兼容的模型后端
pub struct OpenAiBackend {
    client: Client<OpenAIConfig>,
    model_name: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiBackend {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let api_key = config
            .openai_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::Missing {
                var_name: "OPENAI_API_KEY".to_string(),
                hint: "使用 OpenAI 兼容接口时必须提供".to_string(),
            })?;

        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(&config.openai_api_base_url);

        Ok(Self {
            client: Client::with_config(openai_config),
            model_name: config.openai_model.clone(),
            max_tokens: config.llm_max_tokens,
            temperature: config.llm_temperature,
        })
    }

    fn build_error(e: impl std::fmt::Display) -> BackendError {
        BackendError::RequestBuild {
            provider: PROVIDER.to_string(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl ModelBackend for OpenAiBackend {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn solve(&self, context: &PromptContext) -> Result<String, BackendError> {
        let user_message = context.user_message();
        debug!("调用 OpenAI API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(context.system_instruction.as_str())
            .build()
            .map_err(Self::build_error)?;
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(Self::build_error)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![
                ChatCompletionRequestMessage::System(system_msg),
                ChatCompletionRequestMessage::User(user_msg),
            ])
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(Self::build_error)?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("OpenAI API 调用失败: {}", e);
            BackendError::RequestFailed {
                provider: PROVIDER.to_string(),
                message: e.to_string(),
            }
        })?;

        debug!("OpenAI API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| BackendError::EmptyCompletion {
                provider: PROVIDER.to_string(),
            })?;

        Ok(content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 需要有效的 OPENAI_API_KEY
    #[tokio::test]
    #[ignore]
    async fn test_solve_simple_quiz() {
        let _ = tracing_subscriber::fmt::try_init();

        let config = Config::from_env().unwrap();
        let backend = OpenAiBackend::new(&config).unwrap();
        let context = PromptContext::for_quiz(
            "https://quiz.example/q/1",
            "What is 2 + 3? Post your answer to https://quiz.example/submit",
        );

        let raw = backend.solve(&context).await.unwrap();
        println!("{}", raw);
        assert!(!raw.is_empty());
    }
}
