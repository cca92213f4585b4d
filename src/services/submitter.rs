//! 答案提交 - 业务能力层
//!
//! 把答案 POST 到题目给出的提交地址，返回判定结果

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::SubmitError;
use crate::models::{SubmitRequest, Verdict};
use crate::utils::truncate_text;

/// 提交能力
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, request: &SubmitRequest) -> Result<Verdict, SubmitError>;
}

/// 基于 reqwest 的 HTTP 提交
pub struct HttpSubmitter {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpSubmitter {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl Submitter for HttpSubmitter {
    async fn submit(&self, request: &SubmitRequest) -> Result<Verdict, SubmitError> {
        let endpoint = request.submit_url.as_str();
        debug!(
            "提交答案到 {} (类型: {})",
            endpoint,
            request.payload.answer.type_name()
        );

        let response = self
            .client
            .post(endpoint)
            .json(&request.payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SubmitError::Timeout {
                        endpoint: endpoint.to_string(),
                        secs: self.timeout.as_secs(),
                    }
                } else {
                    SubmitError::RequestFailed {
                        endpoint: endpoint.to_string(),
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| SubmitError::RequestFailed {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })?;

        debug!("提交响应 HTTP {}: {}", status, truncate_text(&body, 200));
        interpret_response(endpoint, status, &body)
    }
}

/// 把提交端点的响应映射为判定结果
///
/// - 2xx：按判定结果解析
/// - 5xx：可重试的错误
/// - 其他状态：能解析出判定结果就用它，否则视为答错，原因带上状态码和响应体
pub fn interpret_response(endpoint: &str, status: u16, body: &str) -> Result<Verdict, SubmitError> {
    if (200..300).contains(&status) {
        return serde_json::from_str::<Verdict>(body).map_err(|e| SubmitError::MalformedVerdict {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        });
    }

    if status >= 500 {
        return Err(SubmitError::ServerError {
            endpoint: endpoint.to_string(),
            status,
            body: truncate_text(body, 500),
        });
    }

    match serde_json::from_str::<Verdict>(body) {
        Ok(verdict) => Ok(verdict),
        Err(_) => {
            warn!("提交被拒绝 ({}): HTTP {}", endpoint, status);
            let reason = format!("HTTP {}: {}", status, body.trim());
            Ok(Verdict::incorrect(None, Some(&reason)))
        }
    }
}
