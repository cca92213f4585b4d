//! 题目处理流程 - 流程层
//!
//! 核心职责：定义"一道题"的每个步骤及其重试策略
//!
//! 步骤顺序：
//! 1. fetch_page → 单次时限，失败重试一次
//! 2. solve → 单次时限，不重试，然后提取答案
//! 3. submit → 本地检查大小，单次时限，有限次退避重试
//!
//! 每次调用的时限都不超过 `QuizCtx` 剩余的预算；截止时间过后不再发起
//! 重试或退避等待。步骤之间的顺序由编排层决定

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{BackendError, FetchError, StepError, StepResult, SubmitError};
use crate::models::{PromptContext, SolvedAnswer, SubmitRequest, Verdict};
use crate::services::{extract, ModelBackend, PageFetcher, Submitter};
use crate::utils::truncate_text;
use crate::workflow::quiz_ctx::QuizCtx;

/// 抓取失败后的重试次数
const FETCH_RETRIES: u32 = 1;

/// 各步骤的时限与重试参数
#[derive(Debug, Clone)]
pub struct StepPolicy {
    pub fetch_timeout: Duration,
    pub llm_timeout: Duration,
    pub http_timeout: Duration,
    pub max_submit_retries: u32,
    pub submit_backoff: Duration,
    pub max_payload_bytes: usize,
}

impl StepPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
            llm_timeout: Duration::from_secs(config.llm_timeout_secs),
            http_timeout: Duration::from_secs(config.http_timeout_secs),
            max_submit_retries: config.max_submit_retries,
            submit_backoff: Duration::from_millis(config.submit_backoff_ms),
            max_payload_bytes: config.max_payload_bytes,
        }
    }

    /// 第 n 次提交失败后的等待时间（指数增长）
    pub fn submit_backoff_for(&self, retry: u32) -> Duration {
        self.submit_backoff
            .saturating_mul(2u32.saturating_pow(retry))
    }
}

impl Default for StepPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// 题目处理流程
///
/// - 持有三个协作者（抓取、模型、提交）
/// - 决定每个步骤的时限和重试
/// - 截止时间由调用方通过 `QuizCtx` 传入
pub struct QuizFlow {
    fetcher: Arc<dyn PageFetcher>,
    backend: Arc<dyn ModelBackend>,
    submitter: Arc<dyn Submitter>,
    policy: StepPolicy,
}

impl QuizFlow {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        backend: Arc<dyn ModelBackend>,
        submitter: Arc<dyn Submitter>,
        policy: StepPolicy,
    ) -> Self {
        Self {
            fetcher,
            backend,
            submitter,
            policy,
        }
    }

    pub fn policy(&self) -> &StepPolicy {
        &self.policy
    }

    /// 抓取题目页面文本
    pub async fn fetch_page(&self, ctx: &QuizCtx, url: &str) -> StepResult<String> {
        let mut tries = 0;
        loop {
            let Some(limit) = ctx.call_limit(self.policy.fetch_timeout) else {
                return Err(FetchError::Timeout {
                    url: url.to_string(),
                    secs: 0,
                }
                .into());
            };
            let result = match timeout(limit, self.fetcher.fetch(url)).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout {
                    url: url.to_string(),
                    secs: limit.as_secs(),
                }),
            };

            match result {
                Ok(text) => {
                    info!("{} 📄 页面抓取完成 ({} 字符)", ctx, text.chars().count());
                    return Ok(text);
                }
                Err(e) if tries < FETCH_RETRIES => {
                    tries += 1;
                    warn!("{} ⚠️ 页面抓取失败，重试: {}", ctx, e);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// 调用模型并提取答案
    pub async fn solve(&self, ctx: &QuizCtx, url: &str, page_text: &str) -> StepResult<SolvedAnswer> {
        let context = PromptContext::for_quiz(url, page_text);
        info!("{} 🤖 调用模型: {}", ctx, self.backend.name());

        let backend_timeout = |secs| BackendError::Timeout {
            provider: self.backend.name().to_string(),
            secs,
        };
        let Some(limit) = ctx.call_limit(self.policy.llm_timeout) else {
            return Err(backend_timeout(0).into());
        };
        let raw = match timeout(limit, self.backend.solve(&context)).await {
            Ok(result) => result?,
            Err(_) => return Err(backend_timeout(limit.as_secs()).into()),
        };
        debug!("{} 模型输出: {}", ctx, truncate_text(&raw, 300));

        let solved = extract(&raw)?;
        info!(
            "{} ✓ 提取答案 ({}，{} 阶段): {}",
            ctx,
            solved.answer.type_name(),
            solved.recovered_by,
            truncate_text(&solved.answer.to_string(), 80)
        );
        if let Some(reasoning) = &solved.reasoning {
            debug!("{} 思路: {}", ctx, truncate_text(reasoning, 200));
        }

        Ok(solved)
    }

    /// 提交答案
    ///
    /// 超过大小上限时直接返回 `PayloadTooLarge`，不会调用提交端点。
    /// 退避等待会越过截止时间时不再重试，直接返回最后一次错误
    pub async fn submit(&self, ctx: &QuizCtx, request: &SubmitRequest) -> StepResult<Verdict> {
        request.ensure_within(self.policy.max_payload_bytes)?;
        info!("{} 📤 提交答案到 {}", ctx, request.submit_url);

        let submit_timeout = |secs| SubmitError::Timeout {
            endpoint: request.submit_url.clone(),
            secs,
        };
        let mut retries = 0;
        loop {
            let Some(limit) = ctx.call_limit(self.policy.http_timeout) else {
                return Err(submit_timeout(0).into());
            };
            let result = match timeout(limit, self.submitter.submit(request)).await {
                Ok(result) => result,
                Err(_) => Err(submit_timeout(limit.as_secs())),
            };

            match result {
                Ok(verdict) => {
                    if verdict.correct {
                        info!("{} ✅ 回答正确", ctx);
                    } else {
                        info!(
                            "{} ❌ 回答错误: {}",
                            ctx,
                            verdict.reason.as_deref().unwrap_or("无原因")
                        );
                    }
                    return Ok(verdict);
                }
                Err(e) if retries < self.policy.max_submit_retries => {
                    let backoff = self.policy.submit_backoff_for(retries);
                    if backoff >= ctx.remaining() {
                        warn!("{} ⏰ 剩余预算不足以等待重试，放弃提交: {}", ctx, e);
                        return Err(StepError::Submit(e));
                    }
                    retries += 1;
                    warn!(
                        "{} ⚠️ 提交失败 ({}/{})，{} 毫秒后重试: {}",
                        ctx,
                        retries,
                        self.policy.max_submit_retries,
                        backoff.as_millis(),
                        e
                    );
                    sleep(backoff).await;
                }
                Err(e) => return Err(StepError::Submit(e)),
            }
        }
    }
}
