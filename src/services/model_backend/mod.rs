//! 模型后端 - 业务能力层
//!
//! 不同的推理服务实现同一个 `ModelBackend` 能力，
//! 启动时按配置选定一个，之后流程层只看到 trait 对象

mod anthropic;
mod openai;

pub use anthropic::AnthropicBackend;
pub use openai::OpenAiBackend;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::{BackendError, ConfigError};
use crate::models::{PromptContext, ProviderKind};

/// 模型推理能力
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// 服务名称（用于日志和错误信息）
    fn name(&self) -> &str;

    /// 发送一次请求，返回模型的原始文本输出
    async fn solve(&self, context: &PromptContext) -> Result<String, BackendError>;
}

/// 按配置构建模型后端
pub fn build_backend(config: &Config) -> Result<Arc<dyn ModelBackend>, ConfigError> {
    let backend: Arc<dyn ModelBackend> = match config.provider()? {
        ProviderKind::OpenAi => Arc::new(OpenAiBackend::new(config)?),
        ProviderKind::Anthropic => Arc::new(AnthropicBackend::new(config)?),
    };
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_backend_by_alias() {
        let config = Config {
            llm_provider: "claude".to_string(),
            anthropic_api_key: Some("test-key".to_string()),
            ..Config::default()
        };
        let backend = build_backend(&config).unwrap();
        assert_eq!(backend.name(), "anthropic");

        let config = Config {
            llm_provider: "aipipe".to_string(),
            openai_api_key: Some("test-key".to_string()),
            ..Config::default()
        };
        let backend = build_backend(&config).unwrap();
        assert_eq!(backend.name(), "openai");
    }

    #[test]
    fn test_build_backend_requires_key() {
        let config = Config {
            llm_provider: "openai".to_string(),
            openai_api_key: None,
            ..Config::default()
        };
        assert!(matches!(
            build_backend(&config),
            Err(ConfigError::Missing { .. })
        ));
    }
}
