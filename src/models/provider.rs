use phf::phf_map;

/// 模型服务提供方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ProviderKind {
    /// OpenAI 兼容接口（含代理）
    OpenAi,
    /// Anthropic Messages API
    Anthropic,
}

/// 配置中允许的别名
static PROVIDER_ALIASES: phf::Map<&'static str, ProviderKind> = phf_map! {
    "openai" => ProviderKind::OpenAi,
    "gpt" => ProviderKind::OpenAi,
    "aipipe" => ProviderKind::OpenAi,
    "openai-compatible" => ProviderKind::OpenAi,
    "anthropic" => ProviderKind::Anthropic,
    "claude" => ProviderKind::Anthropic,
};

impl ProviderKind {
    /// 获取标准名称
    pub fn name(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
        }
    }

    /// 从配置字符串解析（忽略大小写和首尾空白）
    pub fn parse(s: &str) -> Option<Self> {
        let key = s.trim().to_ascii_lowercase();
        PROVIDER_ALIASES.get(key.as_str()).copied()
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
