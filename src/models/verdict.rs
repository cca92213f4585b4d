use serde::{Deserialize, Deserializer, Serialize};

/// 提交后的判定结果
///
/// 线上格式：`{"correct": bool, "url": string|null, "reason": string|null}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub correct: bool,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub reason: Option<String>,
}

impl Verdict {
    pub fn correct(next_url: Option<&str>) -> Self {
        Self {
            correct: true,
            url: next_url.map(str::to_string),
            reason: None,
        }
    }

    pub fn incorrect(next_url: Option<&str>, reason: Option<&str>) -> Self {
        Self {
            correct: false,
            url: next_url.map(str::to_string),
            reason: reason.map(str::to_string),
        }
    }

    /// 下一题地址
    pub fn next_url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}
