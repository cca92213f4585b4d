use serde::Serialize;

use crate::error::StepError;
use crate::models::AnswerValue;

/// 提交给判题端点的内容
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionPayload {
    pub email: String,
    pub secret: String,
    /// 题目页面地址（不是提交地址）
    pub url: String,
    pub answer: AnswerValue,
}

/// 一次提交请求
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    /// 提交地址，由模型从题目页面中提取
    pub submit_url: String,
    pub payload: SubmissionPayload,
}

impl SubmitRequest {
    pub fn new(submit_url: impl Into<String>, payload: SubmissionPayload) -> Self {
        Self {
            submit_url: submit_url.into(),
            payload,
        }
    }

    /// 序列化后的字节数
    pub fn encoded_len(&self) -> usize {
        serde_json::to_vec(&self.payload)
            .map(|bytes| bytes.len())
            .unwrap_or(usize::MAX)
    }

    /// 超过上限时在本地拒绝
    pub fn ensure_within(&self, limit: usize) -> Result<(), StepError> {
        let size = self.encoded_len();
        if size > limit {
            return Err(StepError::PayloadTooLarge { size, limit });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn request_with(answer: AnswerValue) -> SubmitRequest {
        SubmitRequest::new(
            "https://quiz.example/submit",
            SubmissionPayload {
                email: "student@example.com".to_string(),
                secret: "s3cret".to_string(),
                url: "https://quiz.example/q/1".to_string(),
                answer,
            },
        )
    }

    #[test]
    fn test_payload_keeps_answer_type() {
        let request = request_with(AnswerValue::Number(42.into()));
        let body = serde_json::to_value(&request.payload).unwrap();
        assert_eq!(body["answer"], serde_json::json!(42));
        assert_eq!(body["url"], "https://quiz.example/q/1");
    }

    #[test]
    fn test_ensure_within_limit() {
        let small = request_with(AnswerValue::Bool(true));
        assert!(small.ensure_within(1024 * 1024).is_ok());

        let huge = request_with(AnswerValue::Text("x".repeat(1024 * 1024)));
        let err = huge.ensure_within(1024 * 1024).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PayloadTooLarge);
    }
}
