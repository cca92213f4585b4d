//! 答案数据模型
//!
//! 答案的运行时类型由其在模型输出中的字面语法决定，提交时原样保留：
//! 数字字面量不会变成字符串，带引号的 `"42"` 也不会变成数字。

use serde::Serialize;
use serde_json::{Number, Value as JsonValue};
use std::fmt;

/// 提交的答案值
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnswerValue {
    /// 数字（整数与浮点保持原样）
    Number(Number),
    /// 字符串
    Text(String),
    /// 布尔值
    Bool(bool),
    /// 结构化记录（对象或数组）
    Record(JsonValue),
    /// 以文本形式携带的二进制内容（`data:<mime>;base64,...`）
    Bytes(String),
}

impl AnswerValue {
    /// 从 JSON 值构造答案
    ///
    /// `null` 视为没有答案，返回 `None`
    pub fn from_json(value: JsonValue) -> Option<Self> {
        match value {
            JsonValue::Null => None,
            JsonValue::Bool(b) => Some(AnswerValue::Bool(b)),
            JsonValue::Number(n) => Some(AnswerValue::Number(n)),
            JsonValue::String(s) => Some(Self::from_text(s)),
            record @ (JsonValue::Object(_) | JsonValue::Array(_)) => {
                Some(AnswerValue::Record(record))
            }
        }
    }

    /// 字符串答案；data URI 归为二进制文本
    pub fn from_text(text: String) -> Self {
        if is_data_uri(&text) {
            AnswerValue::Bytes(text)
        } else {
            AnswerValue::Text(text)
        }
    }

    /// 类型名称（用于日志）
    pub fn type_name(&self) -> &'static str {
        match self {
            AnswerValue::Number(_) => "number",
            AnswerValue::Text(_) => "string",
            AnswerValue::Bool(_) => "boolean",
            AnswerValue::Record(_) => "record",
            AnswerValue::Bytes(_) => "bytes",
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            AnswerValue::Number(n) => JsonValue::Number(n.clone()),
            AnswerValue::Text(s) | AnswerValue::Bytes(s) => JsonValue::String(s.clone()),
            AnswerValue::Bool(b) => JsonValue::Bool(*b),
            AnswerValue::Record(v) => v.clone(),
        }
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

fn is_data_uri(text: &str) -> bool {
    text.starts_with("data:") && text.contains(";base64,")
}

/// 答案提取阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractionPhase {
    /// 整段文本按 JSON 严格解析
    Strict,
    /// 扫描内嵌的 `{...}` 对象
    Embedded,
    /// 按字段标签启发式恢复
    Heuristic,
}

impl ExtractionPhase {
    pub fn name(self) -> &'static str {
        match self {
            ExtractionPhase::Strict => "strict",
            ExtractionPhase::Embedded => "embedded",
            ExtractionPhase::Heuristic => "heuristic",
        }
    }
}

impl fmt::Display for ExtractionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 模型解出的答案
#[derive(Debug, Clone, PartialEq)]
pub struct SolvedAnswer {
    /// 答案提交地址
    pub submit_url: String,
    /// 答案值
    pub answer: AnswerValue,
    /// 解题思路（可选）
    pub reasoning: Option<String>,
    /// 使用到的数据源
    pub data_sources: Vec<String>,
    /// 处理步骤
    pub processing_steps: Vec<String>,
    /// 由哪个阶段提取成功
    pub recovered_by: ExtractionPhase,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_keeps_literal_type() {
        assert_eq!(
            AnswerValue::from_json(json!(42)),
            Some(AnswerValue::Number(Number::from(42)))
        );
        assert_eq!(
            AnswerValue::from_json(json!("42")),
            Some(AnswerValue::Text("42".to_string()))
        );
        assert_eq!(AnswerValue::from_json(json!(false)), Some(AnswerValue::Bool(false)));
        assert_eq!(AnswerValue::from_json(JsonValue::Null), None);
    }

    #[test]
    fn test_data_uri_becomes_bytes() {
        let value = AnswerValue::from_json(json!("data:image/png;base64,iVBORw0KGgo=")).unwrap();
        assert_eq!(value.type_name(), "bytes");
        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!("data:image/png;base64,iVBORw0KGgo=")
        );
    }

    #[test]
    fn test_serializes_untagged() {
        let record = AnswerValue::Record(json!({"total": 3, "ok": true}));
        assert_eq!(serde_json::to_string(&record).unwrap(), r#"{"ok":true,"total":3}"#);
        let number = AnswerValue::Number(Number::from(7));
        assert_eq!(serde_json::to_string(&number).unwrap(), "7");
    }
}
