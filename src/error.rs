use std::fmt;

use thiserror::Error;

use crate::models::ExtractionPhase;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// 服务监听失败
    #[error("服务启动失败 ({addr}): {source}")]
    Server {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 连接浏览器失败
    #[error("无法连接到浏览器 (端口: {port}): {source}")]
    ConnectionFailed {
        port: u16,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 启动浏览器失败
    #[error("启动无头浏览器失败: {message}")]
    LaunchFailed { message: String },
    /// 浏览器配置失败
    #[error("浏览器配置失败: {message}")]
    ConfigurationFailed { message: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 缺少必需的配置项
    #[error("缺少必需配置 {var_name}: {hint}")]
    Missing { var_name: String, hint: String },
    /// 配置值不合法
    #[error("配置 {var_name} 不合法: {reason}")]
    Invalid { var_name: String, reason: String },
    /// 配置文件读取失败
    #[error("读取配置文件失败 ({path}): {source}")]
    FileReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 配置文件 TOML 解析失败
    #[error("配置文件解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

// ========== 链路步骤错误 ==========

/// 页面抓取错误（可重试一次）
#[derive(Debug, Error)]
pub enum FetchError {
    /// 打开页面或导航失败
    #[error("导航到 {url} 失败: {message}")]
    NavigationFailed { url: String, message: String },
    /// 读取渲染后的文本失败
    #[error("读取页面文本失败 ({url}): {message}")]
    ScriptFailed { url: String, message: String },
    /// 页面没有任何文本
    #[error("页面内容为空: {url}")]
    EmptyContent { url: String },
    /// 超过单次调用时限
    #[error("抓取 {url} 超时 ({secs} 秒)")]
    Timeout { url: String, secs: u64 },
}

/// 模型后端错误（不重试）
#[derive(Debug, Error)]
pub enum BackendError {
    /// 构建请求失败
    #[error("构建 {provider} 请求失败: {message}")]
    RequestBuild { provider: String, message: String },
    /// 网络请求失败
    #[error("{provider} API 调用失败: {message}")]
    RequestFailed { provider: String, message: String },
    /// 服务端返回非成功状态
    #[error("{provider} API 返回错误 ({status}): {body}")]
    BadStatus {
        provider: String,
        status: u16,
        body: String,
    },
    /// 返回内容为空
    #[error("{provider} 返回内容为空")]
    EmptyCompletion { provider: String },
    /// 超过单次调用时限
    #[error("{provider} 调用超时 ({secs} 秒)")]
    Timeout { provider: String, secs: u64 },
}

/// 答案提取失败
///
/// 记录每个尝试过的阶段及其诊断信息
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ExtractionFailure {
    pub attempts: Vec<(ExtractionPhase, String)>,
}

impl fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "无法从模型输出中提取答案")?;
        for (phase, diagnostic) in &self.attempts {
            write!(f, "; [{}] {}", phase, diagnostic)?;
        }
        Ok(())
    }
}

/// 提交错误（有限次退避重试）
#[derive(Debug, Error)]
pub enum SubmitError {
    /// 网络请求失败
    #[error("提交请求失败 ({endpoint}): {message}")]
    RequestFailed { endpoint: String, message: String },
    /// 服务端错误
    #[error("提交端点返回错误 ({endpoint}): HTTP {status}: {body}")]
    ServerError {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// 返回内容无法解析为判定结果
    #[error("无法解析提交结果 ({endpoint}): {message}")]
    MalformedVerdict { endpoint: String, message: String },
    /// 超过单次调用时限
    #[error("提交到 {endpoint} 超时 ({secs} 秒)")]
    Timeout { endpoint: String, secs: u64 },
}

/// 单个步骤的错误
#[derive(Debug, Error)]
pub enum StepError {
    #[error("抓取错误: {0}")]
    Fetch(#[from] FetchError),
    #[error("模型错误: {0}")]
    Backend(#[from] BackendError),
    #[error("提取错误: {0}")]
    Extraction(#[from] ExtractionFailure),
    #[error("提交错误: {0}")]
    Submit(#[from] SubmitError),
    /// 本地拒绝，不发起网络请求
    #[error("提交内容过大: {size} 字节 (上限 {limit} 字节)")]
    PayloadTooLarge { size: usize, limit: usize },
    /// 链路入参不合法
    #[error("输入不合法: {0}")]
    InvalidInput(String),
}

/// 终止原因中的错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Fetch,
    Backend,
    Extraction,
    Submit,
    PayloadTooLarge,
    InvalidInput,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Fetch => "FetchError",
            ErrorKind::Backend => "BackendError",
            ErrorKind::Extraction => "ExtractionFailure",
            ErrorKind::Submit => "SubmitError",
            ErrorKind::PayloadTooLarge => "PayloadTooLarge",
            ErrorKind::InvalidInput => "InvalidInput",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl StepError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StepError::Fetch(_) => ErrorKind::Fetch,
            StepError::Backend(_) => ErrorKind::Backend,
            StepError::Extraction(_) => ErrorKind::Extraction,
            StepError::Submit(_) => ErrorKind::Submit,
            StepError::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            StepError::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }
}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        BrowserError::LaunchFailed {
            message: err.to_string(),
        }
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建服务监听错误
    pub fn server_failed(addr: impl Into<String>, source: std::io::Error) -> Self {
        AppError::Server {
            addr: addr.into(),
            source,
        }
    }
}

impl ConfigError {
    pub fn invalid(var_name: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            var_name: var_name.into(),
            reason: reason.into(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

/// 单步结果类型
pub type StepResult<T> = Result<T, StepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_error_kind_mapping() {
        let err = StepError::from(FetchError::EmptyContent {
            url: "https://q/1".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::Fetch);

        let err = StepError::PayloadTooLarge {
            size: 2_000_000,
            limit: 1_048_576,
        };
        assert_eq!(err.kind(), ErrorKind::PayloadTooLarge);
        assert!(err.to_string().contains("2000000"));
    }

    #[test]
    fn test_extraction_failure_lists_phases() {
        let failure = ExtractionFailure {
            attempts: vec![
                (ExtractionPhase::Strict, "不是 JSON".to_string()),
                (ExtractionPhase::Heuristic, "没有找到提交地址".to_string()),
            ],
        };
        let text = failure.to_string();
        assert!(text.contains("strict"));
        assert!(text.contains("heuristic"));
        assert!(text.contains("没有找到提交地址"));
    }
}
