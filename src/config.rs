use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::models::ProviderKind;

/// 默认配置文件
pub const DEFAULT_CONFIG_FILE: &str = "quiz_solver.toml";

/// 链路预算上限（秒）
pub const MAX_QUIZ_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// 程序配置
///
/// 启动后只读，通过 `Arc` 或克隆注入各个组件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 学生身份 ---
    pub student_email: String,
    pub student_secret: String,
    // --- LLM 配置 ---
    pub llm_provider: String,
    pub openai_api_key: Option<String>,
    pub openai_api_base_url: String,
    pub openai_model: String,
    pub anthropic_api_key: Option<String>,
    pub anthropic_api_base_url: String,
    pub anthropic_model: String,
    pub llm_max_tokens: u32,
    pub llm_temperature: f32,
    // --- 时限与重试 ---
    /// 整条链路的时间预算（秒）
    pub quiz_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub llm_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    /// 提交失败后的最大重试次数
    pub max_submit_retries: u32,
    pub submit_backoff_ms: u64,
    /// 提交内容大小上限（字节）
    pub max_payload_bytes: usize,
    // --- 浏览器 ---
    pub headless: bool,
    pub chrome_executable: Option<String>,
    /// 设置后连接已打开的浏览器，而不是启动新的
    pub browser_debug_port: Option<u16>,
    /// 页面加载后等待脚本执行的时间（毫秒）
    pub render_settle_ms: u64,
    // --- 服务 ---
    pub server_host: String,
    pub server_port: u16,
    /// 同时运行的链路数量
    pub max_concurrent_chains: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            student_email: "your-email@example.com".to_string(),
            student_secret: "your-secret-string".to_string(),
            llm_provider: "anthropic".to_string(),
            openai_api_key: None,
            openai_api_base_url: "https://aipipe.org/openai/v1".to_string(),
            openai_model: "gpt-4-turbo-preview".to_string(),
            anthropic_api_key: None,
            anthropic_api_base_url: "https://api.anthropic.com/v1".to_string(),
            anthropic_model: "claude-sonnet-4-20250514".to_string(),
            llm_max_tokens: 4000,
            llm_temperature: 0.1,
            quiz_timeout_secs: 170,
            http_timeout_secs: 30,
            llm_timeout_secs: 90,
            fetch_timeout_secs: 45,
            max_submit_retries: 2,
            submit_backoff_ms: 500,
            max_payload_bytes: 1024 * 1024,
            headless: true,
            chrome_executable: None,
            browser_debug_port: None,
            render_settle_ms: 2000,
            server_host: "0.0.0.0".to_string(),
            server_port: 8000,
            max_concurrent_chains: 16,
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 只从环境变量读取（缺省值见 `Default`）
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// 默认值 ← 配置文件 ← 环境变量
    ///
    /// 配置文件路径取 `QUIZ_CONFIG_FILE`，未设置时若当前目录存在
    /// `quiz_solver.toml` 则读取它
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var("QUIZ_CONFIG_FILE") {
            Ok(path) => Self::from_toml_file(Path::new(&path))?,
            Err(_) if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_toml_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            Err(_) => Self::default(),
        };
        let config = base.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// 解析 TOML 配置文件，未出现的键取默认值
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 数值类变量无法解析时返回 `EnvVarParseFailed`
    fn with_env_overrides(self) -> Result<Self, ConfigError> {
        Ok(Self {
            student_email: env_or("STUDENT_EMAIL", self.student_email),
            student_secret: env_or("STUDENT_SECRET", self.student_secret),
            llm_provider: env_opt("LLM_PROVIDER")
                .or_else(|| env_opt("DEFAULT_LLM_PROVIDER"))
                .unwrap_or(self.llm_provider),
            openai_api_key: env_opt("OPENAI_API_KEY").or(self.openai_api_key),
            openai_api_base_url: env_or("OPENAI_API_BASE_URL", self.openai_api_base_url),
            openai_model: env_or("OPENAI_MODEL", self.openai_model),
            anthropic_api_key: env_opt("ANTHROPIC_API_KEY").or(self.anthropic_api_key),
            anthropic_api_base_url: env_or("ANTHROPIC_API_BASE_URL", self.anthropic_api_base_url),
            anthropic_model: env_or("ANTHROPIC_MODEL", self.anthropic_model),
            llm_max_tokens: env_parse("LLM_MAX_TOKENS", self.llm_max_tokens)?,
            llm_temperature: env_parse("LLM_TEMPERATURE", self.llm_temperature)?,
            quiz_timeout_secs: env_parse("QUIZ_TIMEOUT", self.quiz_timeout_secs)?,
            http_timeout_secs: env_parse("HTTP_TIMEOUT", self.http_timeout_secs)?,
            llm_timeout_secs: env_parse("LLM_TIMEOUT", self.llm_timeout_secs)?,
            fetch_timeout_secs: env_parse("FETCH_TIMEOUT", self.fetch_timeout_secs)?,
            max_submit_retries: env_parse("MAX_RETRIES", self.max_submit_retries)?,
            submit_backoff_ms: env_parse("SUBMIT_BACKOFF_MS", self.submit_backoff_ms)?,
            max_payload_bytes: env_parse("MAX_PAYLOAD_BYTES", self.max_payload_bytes)?,
            headless: env_bool("HEADLESS", self.headless),
            chrome_executable: env_opt("CHROME_EXECUTABLE").or(self.chrome_executable),
            browser_debug_port: match env_opt("BROWSER_DEBUG_PORT") {
                Some(raw) => Some(parse_value("BROWSER_DEBUG_PORT", &raw)?),
                None => self.browser_debug_port,
            },
            render_settle_ms: env_parse("RENDER_SETTLE_MS", self.render_settle_ms)?,
            server_host: env_or("SERVER_HOST", self.server_host),
            server_port: env_parse("SERVER_PORT", self.server_port)?,
            max_concurrent_chains: env_parse("MAX_CONCURRENT_CHAINS", self.max_concurrent_chains)?,
            verbose_logging: env_bool("VERBOSE_LOGGING", self.verbose_logging),
        })
    }

    /// 校验必需配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        let provider = self.provider()?;
        match provider {
            ProviderKind::Anthropic if self.anthropic_api_key.is_none() => {
                return Err(ConfigError::Missing {
                    var_name: "ANTHROPIC_API_KEY".to_string(),
                    hint: "使用 Anthropic 时必须提供".to_string(),
                });
            }
            ProviderKind::OpenAi if self.openai_api_key.is_none() => {
                return Err(ConfigError::Missing {
                    var_name: "OPENAI_API_KEY".to_string(),
                    hint: "使用 OpenAI 兼容接口时必须提供".to_string(),
                });
            }
            _ => {}
        }

        if self.quiz_timeout_secs == 0 {
            return Err(ConfigError::invalid("QUIZ_TIMEOUT", "时间预算必须大于 0"));
        }
        if self.quiz_timeout_secs > MAX_QUIZ_TIMEOUT_SECS {
            return Err(ConfigError::invalid(
                "QUIZ_TIMEOUT",
                format!("时间预算不能超过 {} 秒", MAX_QUIZ_TIMEOUT_SECS),
            ));
        }
        for (name, secs) in [
            ("HTTP_TIMEOUT", self.http_timeout_secs),
            ("LLM_TIMEOUT", self.llm_timeout_secs),
            ("FETCH_TIMEOUT", self.fetch_timeout_secs),
        ] {
            if secs == 0 || secs >= self.quiz_timeout_secs {
                return Err(ConfigError::invalid(
                    name,
                    format!(
                        "单次调用时限 {} 秒必须大于 0 且小于链路预算 {} 秒",
                        secs, self.quiz_timeout_secs
                    ),
                ));
            }
        }
        if self.max_concurrent_chains == 0 {
            return Err(ConfigError::invalid("MAX_CONCURRENT_CHAINS", "必须大于 0"));
        }
        Ok(())
    }

    /// 当前选择的模型服务
    pub fn provider(&self) -> Result<ProviderKind, ConfigError> {
        ProviderKind::parse(&self.llm_provider).ok_or_else(|| ConfigError::EnvVarParseFailed {
            var_name: "LLM_PROVIDER".to_string(),
            value: self.llm_provider.clone(),
            expected_type: "openai | anthropic".to_string(),
        })
    }

    pub fn quiz_budget(&self) -> Duration {
        Duration::from_secs(self.quiz_timeout_secs)
    }
}

fn env_or(name: &str, default: String) -> String {
    std::env::var(name).unwrap_or(default)
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env_opt(name) {
        Some(raw) => parse_value(name, &raw),
        None => Ok(default),
    }
}

fn parse_value<T: FromStr>(name: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::EnvVarParseFailed {
            var_name: name.to_string(),
            value: raw.to_string(),
            expected_type: std::any::type_name::<T>().to_string(),
        })
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}
