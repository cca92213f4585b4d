//! 答案提取 - 业务能力层
//!
//! 把模型的自由文本输出转换成带类型的 `SolvedAnswer`。纯函数，
//! 同样的输入永远得到同样的结果，不依赖网络。
//!
//! 按顺序尝试三个阶段，先成功者胜出：
//! 1. 严格解析：整段文本（去掉 Markdown 代码块围栏后）是一个 JSON 对象
//! 2. 内嵌对象扫描：找出成对的 `{...}` 区域（正确跳过字符串字面量里的括号），逐个严格解析
//! 3. 字段启发式：分别按标签找提交地址和答案，答案类型由其字面语法决定

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Number, Value as JsonValue};

use crate::error::ExtractionFailure;
use crate::models::{AnswerValue, ExtractionPhase, SolvedAnswer};

/// 可接受的提交地址字段名
const SUBMIT_URL_KEYS: &[&str] = &[
    "submit_url",
    "submitUrl",
    "submit-url",
    "submission_url",
    "submissionUrl",
    "submit",
];
const REASONING_KEYS: &[&str] = &["reasoning"];
const DATA_SOURCES_KEYS: &[&str] = &["data_sources", "dataSources"];
const PROCESSING_STEPS_KEYS: &[&str] = &["processing_steps", "processingSteps"];

/// 提交标签后面的 URL
static SUBMIT_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(?:submit[_\s-]?url|submission[_\s-]?url|submit[_\s-]?to|post(?:\s+(?:your\s+)?(?:answer|it))?\s+to|submit)["']?\s*(?:[:=]|\bis\b|\bat\b)?\s*["'`(<]?(https?://[^\s"'`<>()\[\]{},]+)"#,
    )
    .expect("提交标签正则无效")
});

/// 兜底：路径中包含 /submit 的任意 URL
static SUBMIT_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s"'`<>()\[\]{},]+/submit[^\s"'`<>()\[\]{},]*"#)
        .expect("提交路径正则无效")
});

static ANSWER_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)["']?\b(?:final[_\s]+)?answer["']?\s*(?:[:=]|\bis\b)\s*"#)
        .expect("答案标签正则无效")
});

static REASONING_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)["']?\breasoning["']?\s*[:=]\s*"#).expect("思路标签正则无效")
});

static DATA_SOURCES_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)["']?\bdata[_\s]?sources["']?\s*[:=]\s*"#).expect("数据源标签正则无效")
});

static PROCESSING_STEPS_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)["']?\bprocessing[_\s]?steps["']?\s*[:=]\s*"#).expect("步骤标签正则无效")
});

static BARE_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+(?:\.\d+)?|\.\d+)(?:[eE][+-]?\d+)?$").expect("数字正则无效")
});

/// 从模型输出中提取答案
pub fn extract(raw_text: &str) -> Result<SolvedAnswer, ExtractionFailure> {
    let mut attempts = Vec::with_capacity(3);

    match strict_parse(raw_text) {
        Ok(solved) => return Ok(solved),
        Err(diagnostic) => attempts.push((ExtractionPhase::Strict, diagnostic)),
    }

    match embedded_scan(raw_text) {
        Ok(solved) => return Ok(solved),
        Err(diagnostic) => attempts.push((ExtractionPhase::Embedded, diagnostic)),
    }

    match heuristic_recovery(raw_text) {
        Ok(solved) => return Ok(solved),
        Err(diagnostic) => attempts.push((ExtractionPhase::Heuristic, diagnostic)),
    }

    Err(ExtractionFailure { attempts })
}

// ========== 阶段 1：严格解析 ==========

fn strict_parse(raw_text: &str) -> Result<SolvedAnswer, String> {
    let cleaned = strip_code_fence(raw_text.trim());
    let document: JsonValue =
        serde_json::from_str(cleaned).map_err(|e| format!("整段文本不是合法 JSON: {}", e))?;
    from_document(document, ExtractionPhase::Strict)
}

/// 去掉包裹整段输出的 Markdown 代码块围栏
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches("json"),
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// 从已解析的 JSON 文档中取出各字段
fn from_document(document: JsonValue, phase: ExtractionPhase) -> Result<SolvedAnswer, String> {
    let JsonValue::Object(map) = document else {
        return Err("顶层不是 JSON 对象".to_string());
    };

    let submit_url = SUBMIT_URL_KEYS
        .iter()
        .filter_map(|key| map.get(*key))
        .filter_map(JsonValue::as_str)
        .map(str::trim)
        .find(|url| !url.is_empty())
        .ok_or_else(|| "缺少提交地址字段".to_string())?
        .to_string();

    let answer = map
        .get("answer")
        .cloned()
        .and_then(AnswerValue::from_json)
        .ok_or_else(|| "缺少 answer 字段或其值为 null".to_string())?;

    Ok(SolvedAnswer {
        submit_url,
        answer,
        reasoning: first_string(&map, REASONING_KEYS),
        data_sources: string_list(&map, DATA_SOURCES_KEYS),
        processing_steps: string_list(&map, PROCESSING_STEPS_KEYS),
        recovered_by: phase,
    })
}

fn first_string(map: &Map<String, JsonValue>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .filter_map(JsonValue::as_str)
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
}

fn string_list(map: &Map<String, JsonValue>, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .find_map(|key| map.get(*key))
        .map(json_to_strings)
        .unwrap_or_default()
}

fn json_to_strings(value: &JsonValue) -> Vec<String> {
    match value {
        JsonValue::Array(items) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(|item| match item {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        JsonValue::String(s) if !s.trim().is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

// ========== 阶段 2：内嵌对象扫描 ==========

fn embedded_scan(raw_text: &str) -> Result<SolvedAnswer, String> {
    let candidates = candidate_regions(raw_text);
    if candidates.is_empty() {
        return Err("没有找到成对的花括号区域".to_string());
    }

    let mut last_diagnostic = String::new();
    for region in &candidates {
        match serde_json::from_str::<JsonValue>(region) {
            Ok(document) => match from_document(document, ExtractionPhase::Embedded) {
                Ok(solved) => return Ok(solved),
                Err(diagnostic) => last_diagnostic = diagnostic,
            },
            Err(e) => last_diagnostic = format!("不是合法 JSON: {}", e),
        }
    }

    Err(format!(
        "找到 {} 个候选对象，均未能解析出必需字段 (最后一个: {})",
        candidates.len(),
        last_diagnostic
    ))
}

/// 最多尝试的候选区域数
const MAX_CANDIDATES: usize = 64;

/// 按出现顺序列出成对的 `{...}` 区域，外层在前，内层紧随其后
///
/// 单趟扫描，用显式栈记录未闭合的开括号；嵌套深度不影响调用栈。
/// 位于某个区域内部时跟踪双引号字符串，区域之外的引号视为普通文字。
fn candidate_regions(text: &str) -> Vec<&str> {
    let mut open_positions: Vec<usize> = Vec::new();
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in text.as_bytes().iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' if !open_positions.is_empty() => in_string = true,
            b'{' => open_positions.push(i),
            b'}' => {
                if let Some(start) = open_positions.pop() {
                    spans.push((start, i));
                }
            }
            _ => {}
        }
    }

    spans.sort_unstable_by_key(|&(start, _)| start);
    spans
        .into_iter()
        .take(MAX_CANDIDATES)
        .map(|(start, end)| &text[start..=end])
        .collect()
}

/// 找到与 `start` 处开括号配对的闭括号位置
///
/// 双引号字符串内的括号和转义字符不参与计数。分隔符都是 ASCII，
/// 按字节扫描不会切到多字节字符中间。
fn matching_close(bytes: &[u8], start: usize) -> Option<usize> {
    let open = bytes[start];
    let close = match open {
        b'{' => b'}',
        b'[' => b']',
        _ => return None,
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        if b == b'"' {
            in_string = true;
        } else if b == open {
            depth += 1;
        } else if b == close {
            depth -= 1;
            if depth == 0 {
                return Some(start + offset);
            }
        }
    }

    None
}

// ========== 阶段 3：字段启发式 ==========

fn heuristic_recovery(raw_text: &str) -> Result<SolvedAnswer, String> {
    let submit_url = find_submit_url(raw_text);
    let answer = find_labeled_value(raw_text, &ANSWER_LABEL_RE);

    let (submit_url, answer) = match (submit_url, answer) {
        (Some(url), Some(answer)) => (url, answer),
        (None, Some(_)) => return Err("没有找到提交地址".to_string()),
        (Some(_), None) => return Err("没有找到答案".to_string()),
        (None, None) => return Err("没有找到提交地址和答案".to_string()),
    };

    let reasoning = match find_labeled_value(raw_text, &REASONING_LABEL_RE) {
        Some(AnswerValue::Text(text)) => Some(text),
        _ => None,
    };

    Ok(SolvedAnswer {
        submit_url,
        answer,
        reasoning,
        data_sources: find_labeled_list(raw_text, &DATA_SOURCES_LABEL_RE),
        processing_steps: find_labeled_list(raw_text, &PROCESSING_STEPS_LABEL_RE),
        recovered_by: ExtractionPhase::Heuristic,
    })
}

fn find_submit_url(text: &str) -> Option<String> {
    let labeled = SUBMIT_LABEL_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str());
    let url = labeled.or_else(|| SUBMIT_PATH_RE.find(text).map(|m| m.as_str()))?;
    let url = url.trim_end_matches(['.', ',', ';', ':', '!', '?']);
    (!url.is_empty()).then(|| url.to_string())
}

/// 第一个能解析出值的标签
fn find_labeled_value(text: &str, label: &Regex) -> Option<AnswerValue> {
    label
        .find_iter(text)
        .find_map(|m| scan_value(&text[m.end()..]))
}

fn find_labeled_list(text: &str, label: &Regex) -> Vec<String> {
    match find_labeled_value(text, label) {
        Some(AnswerValue::Record(value)) => json_to_strings(&value),
        Some(AnswerValue::Text(text)) => vec![text],
        _ => Vec::new(),
    }
}

/// 从标签之后的位置读取一个值，类型由字面语法决定
fn scan_value(rest: &str) -> Option<AnswerValue> {
    let rest = rest.trim_start();
    let first = rest.chars().next()?;

    match first {
        '"' => {
            let end = closing_quote(rest.as_bytes(), b'"')?;
            let literal = &rest[..=end];
            let text = serde_json::from_str::<String>(literal)
                .unwrap_or_else(|_| literal[1..literal.len() - 1].to_string());
            Some(AnswerValue::from_text(text))
        }
        '\'' => {
            let end = closing_quote(rest.as_bytes(), b'\'')?;
            Some(AnswerValue::from_text(rest[1..end].to_string()))
        }
        '`' => {
            let inner = rest[1..].split('`').next()?;
            scan_value(inner)
        }
        '{' | '[' => {
            let end = matching_close(rest.as_bytes(), 0)?;
            let region = &rest[..=end];
            match serde_json::from_str::<JsonValue>(region) {
                Ok(value) => AnswerValue::from_json(value),
                Err(_) => Some(AnswerValue::Text(region.trim().to_string())),
            }
        }
        _ => scan_bare_token(rest),
    }
}

fn closing_quote(bytes: &[u8], quote: u8) -> Option<usize> {
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(1) {
        if escaped {
            escaped = false;
        } else if b == b'\\' {
            escaped = true;
        } else if b == quote {
            return Some(i);
        }
    }
    None
}

/// 未加引号的值：截到行尾、逗号或右括号为止
fn scan_bare_token(rest: &str) -> Option<AnswerValue> {
    let end = rest.find(['\n', '\r', ',', '}', ']']).unwrap_or(rest.len());
    let token = rest[..end].trim();
    let token = token.strip_suffix('.').unwrap_or(token).trim();
    if token.is_empty() {
        return None;
    }

    if BARE_NUMBER_RE.is_match(token) {
        let normalized = token.strip_prefix('+').unwrap_or(token);
        if let Ok(number) = serde_json::from_str::<Number>(&normalize_leading_dot(normalized)) {
            return Some(AnswerValue::Number(number));
        }
    }

    match token.to_ascii_lowercase().as_str() {
        "true" => Some(AnswerValue::Bool(true)),
        "false" => Some(AnswerValue::Bool(false)),
        "null" | "none" => None,
        _ => Some(AnswerValue::from_text(token.to_string())),
    }
}

/// JSON 不接受 `.5` / `-.5` 这样的写法
fn normalize_leading_dot(token: &str) -> String {
    if let Some(rest) = token.strip_prefix("-.") {
        format!("-0.{}", rest)
    } else if let Some(rest) = token.strip_prefix('.') {
        format!("0.{}", rest)
    } else {
        token.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strict_json_document() {
        let raw = r#"{
            "submit_url": "https://quiz.example/submit",
            "answer": 12345,
            "reasoning": "Summed the value column",
            "data_sources": ["https://quiz.example/data.csv"],
            "processing_steps": ["download", "sum"]
        }"#;

        let solved = extract(raw).unwrap();
        assert_eq!(solved.recovered_by, ExtractionPhase::Strict);
        assert_eq!(solved.submit_url, "https://quiz.example/submit");
        assert_eq!(solved.answer, AnswerValue::Number(Number::from(12345)));
        assert_eq!(solved.reasoning.as_deref(), Some("Summed the value column"));
        assert_eq!(solved.data_sources, vec!["https://quiz.example/data.csv"]);
        assert_eq!(solved.processing_steps, vec!["download", "sum"]);
    }

    #[test]
    fn test_strict_strips_code_fence() {
        let raw = "```json\n{\"submitUrl\": \"https://x/submit\", \"answer\": true}\n```";
        let solved = extract(raw).unwrap();
        assert_eq!(solved.recovered_by, ExtractionPhase::Strict);
        assert_eq!(solved.answer, AnswerValue::Bool(true));
    }

    #[test]
    fn test_embedded_object_in_prose() {
        let raw = r#"Here is my result: {"submitUrl":"https://x/y","answer":7} Thanks"#;
        let solved = extract(raw).unwrap();
        assert_eq!(solved.recovered_by, ExtractionPhase::Embedded);
        assert_eq!(solved.submit_url, "https://x/y");
        assert_eq!(solved.answer, AnswerValue::Number(Number::from(7)));
        assert!(solved.reasoning.is_none());
        assert!(solved.data_sources.is_empty());
        assert!(solved.processing_steps.is_empty());
    }

    #[test]
    fn test_embedded_ignores_braces_inside_strings() {
        let raw = r#"Use the {placeholder} format. Result:
{"submit_url": "https://x/submit", "answer": "a } tricky { value", "reasoning": "quote \" inside"}
done"#;
        let solved = extract(raw).unwrap();
        assert_eq!(solved.recovered_by, ExtractionPhase::Embedded);
        assert_eq!(solved.answer, AnswerValue::Text("a } tricky { value".to_string()));
        assert_eq!(solved.reasoning.as_deref(), Some("quote \" inside"));
    }

    #[test]
    fn test_embedded_finds_nested_object() {
        let raw = r#"Output: {"result": {"submit_url": "https://x/submit", "answer": [1, 2]}}"#;
        let solved = extract(raw).unwrap();
        assert_eq!(solved.answer, AnswerValue::Record(json!([1, 2])));
    }

    #[test]
    fn test_number_and_quoted_number_keep_type() {
        let bare = "Submit to https://x/submit\nanswer: 42";
        let quoted = "Submit to https://x/submit\nanswer: \"42\"";

        let bare = extract(bare).unwrap();
        assert_eq!(bare.recovered_by, ExtractionPhase::Heuristic);
        assert_eq!(bare.answer, AnswerValue::Number(Number::from(42)));

        let quoted = extract(quoted).unwrap();
        assert_eq!(quoted.answer, AnswerValue::Text("42".to_string()));
    }

    #[test]
    fn test_heuristic_value_types() {
        let cases = [
            ("answer: -3.5", json!(-3.5)),
            ("answer = true", json!(true)),
            ("Final answer: False", json!(false)),
            (r#"answer: {"total": 3, "ok": true}"#, json!({"total": 3, "ok": true})),
            ("The answer is Paris.", json!("Paris")),
            ("answer: 'single quoted'", json!("single quoted")),
            ("answer: `17`", json!(17)),
        ];

        for (line, expected) in cases {
            let raw = format!("POST your answer to https://quiz.example/submit\n{}", line);
            let solved = extract(&raw).unwrap_or_else(|e| panic!("{}: {}", line, e));
            assert_eq!(solved.answer.to_json(), expected, "{}", line);
        }
    }

    #[test]
    fn test_heuristic_recovers_broken_json() {
        let raw = r#"{"submit_url": "https://quiz.example/demo/submit", "answer": 99, "reasoning": "counted rows",
"data_sources": ["https://quiz.example/a.csv", "https://quiz.example/b.csv"]"#;
        let solved = extract(raw).unwrap();
        assert_eq!(solved.recovered_by, ExtractionPhase::Heuristic);
        assert_eq!(solved.submit_url, "https://quiz.example/demo/submit");
        assert_eq!(solved.answer, AnswerValue::Number(Number::from(99)));
        assert_eq!(solved.reasoning.as_deref(), Some("counted rows"));
        assert_eq!(solved.data_sources.len(), 2);
        assert!(solved.processing_steps.is_empty());
    }

    #[test]
    fn test_heuristic_falls_back_to_submit_path() {
        let raw = "I computed it. See https://tds.example/quiz/submit?id=3.\nAnswer: 1024";
        let solved = extract(raw).unwrap();
        assert_eq!(solved.submit_url, "https://tds.example/quiz/submit?id=3");
        assert_eq!(solved.answer, AnswerValue::Number(Number::from(1024)));
    }

    #[test]
    fn test_data_uri_answer_is_bytes() {
        let raw = r#"{"submit_url": "https://x/submit", "answer": "data:image/png;base64,iVBORw0KGgo="}"#;
        let solved = extract(raw).unwrap();
        assert_eq!(solved.answer.type_name(), "bytes");
    }

    #[test]
    fn test_null_answer_is_not_recovered() {
        let raw = r#"{"submit_url": "https://x/submit", "answer": null}"#;
        let failure = extract(raw).unwrap_err();
        assert_eq!(failure.attempts.len(), 3);
    }

    #[test]
    fn test_failure_reports_every_phase() {
        let failure = extract("I could not solve this quiz.").unwrap_err();
        let phases: Vec<_> = failure.attempts.iter().map(|(phase, _)| *phase).collect();
        assert_eq!(
            phases,
            vec![
                ExtractionPhase::Strict,
                ExtractionPhase::Embedded,
                ExtractionPhase::Heuristic
            ]
        );
        assert!(failure.attempts[2].1.contains("提交地址"));
    }

    #[test]
    fn test_missing_answer_fails() {
        let failure = extract("submit_url: https://x/submit").unwrap_err();
        assert_eq!(failure.attempts[2].1, "没有找到答案");
    }

    #[test]
    fn test_extract_is_deterministic() {
        let inputs = [
            r#"{"submit_url": "https://x/submit", "answer": 3.25}"#,
            r#"noise {"submitUrl":"https://x/y","answer":{"k":[1,2]}} more"#,
            "Submit to https://x/submit\nanswer: hello world",
            "nothing useful here",
            "",
        ];
        for raw in inputs {
            assert_eq!(extract(raw), extract(raw));
        }
    }

    #[test]
    fn test_candidate_regions_outer_first() {
        let text = r#"a {"x": {"y": 1}} b {"z": "}"} {"#;
        assert_eq!(
            candidate_regions(text),
            vec![r#"{"x": {"y": 1}}"#, r#"{"y": 1}"#, r#"{"z": "}"}"#]
        );
    }

    #[test]
    fn test_deeply_nested_braces_do_not_overflow() {
        let depth = 20_000;
        let raw = format!("{}{}", "{".repeat(depth), "}".repeat(depth));
        assert_eq!(candidate_regions(&raw).len(), MAX_CANDIDATES);

        let failure = extract(&raw).unwrap_err();
        assert_eq!(failure.attempts.len(), 3);

        // 深层嵌套后面跟着一个正常答案时仍能在字段启发式阶段恢复
        let raw = format!("{}\nSubmit to https://x/submit\nanswer: 7", raw);
        let solved = extract(&raw).unwrap();
        assert_eq!(solved.recovered_by, ExtractionPhase::Heuristic);
        assert_eq!(solved.answer, AnswerValue::Number(Number::from(7)));
    }

    #[test]
    fn test_matching_close_handles_escapes() {
        let text = br#"{"a": "\\", "b": "\"}"}"#;
        assert_eq!(matching_close(text, 0), Some(text.len() - 1));
        assert_eq!(matching_close(b"{ unbalanced", 0), None);
    }
}
