//! 链路运行器 - 编排层
//!
//! ## 职责
//!
//! 驱动一条链路从第一题走到终止：抓取 → 求解 → 提交 → 判定，
//! 在判定处检查截止时间，并执行"答错重试一次，再错就跳过"的规则。
//!
//! ## 状态
//!
//! ```text
//! Init → Fetching → Solving → Submitting → Evaluating
//!                                              ├─ Retrying  → Fetching（同一题）
//!                                              ├─ Advancing → Fetching（下一题）
//!                                              └─ Terminated(Solved | GaveUp | TimedOut | Error)
//! ```
//!
//! 抓取、求解、提交任一步骤最终失败都直接进入 `Terminated(Error)`；
//! 若失败时截止时间已过（单次调用时限被剩余预算截断），则记为 `TimedOut`

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use tracing::{error, info, warn};

use crate::config::MAX_QUIZ_TIMEOUT_SECS;
use crate::error::{ErrorKind, StepError};
use crate::models::{SubmissionPayload, SubmitRequest, Verdict};
use crate::orchestrator::chain_session::{ChainSession, SessionStatus};
use crate::utils::logging;
use crate::workflow::{QuizCtx, QuizFlow};

/// 状态机的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    Init,
    Fetching,
    Solving,
    Submitting,
    Evaluating,
    Retrying,
    Advancing,
    Terminated,
}

impl ChainState {
    pub fn name(self) -> &'static str {
        match self {
            ChainState::Init => "Init",
            ChainState::Fetching => "Fetching",
            ChainState::Solving => "Solving",
            ChainState::Submitting => "Submitting",
            ChainState::Evaluating => "Evaluating",
            ChainState::Retrying => "Retrying",
            ChainState::Advancing => "Advancing",
            ChainState::Terminated => "Terminated",
        }
    }
}

impl fmt::Display for ChainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 链路最终结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalStatus {
    /// 最后一题回答正确且没有下一题
    Solved,
    /// 答错且没有下一题可走
    GaveUp,
    /// 在判定时已超过时间预算
    TimedOut,
    /// 某个步骤最终失败
    Error { kind: ErrorKind, diagnostic: String },
}

impl FinalStatus {
    fn from_step_error(err: &StepError) -> Self {
        FinalStatus::Error {
            kind: err.kind(),
            diagnostic: err.to_string(),
        }
    }

    fn session_status(&self) -> SessionStatus {
        match self {
            FinalStatus::Solved => SessionStatus::Completed,
            FinalStatus::TimedOut => SessionStatus::TimedOut,
            FinalStatus::GaveUp | FinalStatus::Error { .. } => SessionStatus::Failed,
        }
    }
}

impl fmt::Display for FinalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalStatus::Solved => f.write_str("Solved"),
            FinalStatus::GaveUp => f.write_str("GaveUp"),
            FinalStatus::TimedOut => f.write_str("TimedOut"),
            FinalStatus::Error { kind, diagnostic } => write!(f, "Error({}): {}", kind, diagnostic),
        }
    }
}

/// 一次状态迁移的记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: ChainState,
    pub url: String,
    pub attempt: u32,
    pub elapsed: Duration,
}

/// 链路运行报告
#[derive(Debug, Clone)]
pub struct ChainReport {
    pub run_id: usize,
    pub status: FinalStatus,
    pub last_url: String,
    pub pages_visited: usize,
    pub submissions: usize,
    pub elapsed: Duration,
    pub transitions: Vec<Transition>,
}

impl ChainReport {
    /// 按顺序列出经过的状态
    pub fn states(&self) -> Vec<ChainState> {
        self.transitions.iter().map(|t| t.state).collect()
    }

    /// 进入 `Fetching` 时的地址，即每次抓取的目标
    pub fn fetched_urls(&self) -> Vec<&str> {
        self.transitions
            .iter()
            .filter(|t| t.state == ChainState::Fetching)
            .map(|t| t.url.as_str())
            .collect()
    }
}

/// 判定之后的走向
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Retry,
    Advance(String),
    Finish(FinalStatus),
}

/// 根据判定结果决定下一步（调用前已确认时间未用完）
pub fn decide(verdict: &Verdict, attempt_count: u32) -> Decision {
    match (verdict.correct, verdict.next_url()) {
        (true, Some(next)) => Decision::Advance(next.to_string()),
        (true, None) => Decision::Finish(FinalStatus::Solved),
        (false, _) if attempt_count == 0 => Decision::Retry,
        (false, Some(next)) => Decision::Advance(next.to_string()),
        (false, None) => Decision::Finish(FinalStatus::GaveUp),
    }
}

/// 单条链路允许的最长时间预算
pub const MAX_CHAIN_BUDGET: Duration = Duration::from_secs(MAX_QUIZ_TIMEOUT_SECS);

/// 提交时使用的身份
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub email: String,
    pub secret: String,
}

/// 链路运行器
///
/// 可被多个并发链路共享；每次 `run` 都有自己的会话
pub struct ChainRunner {
    flow: Arc<QuizFlow>,
    identity: Identity,
    next_run_id: AtomicUsize,
}

impl ChainRunner {
    pub fn new(flow: Arc<QuizFlow>, identity: Identity) -> Self {
        Self {
            flow,
            identity,
            next_run_id: AtomicUsize::new(1),
        }
    }

    /// 以默认身份运行一条链路直到终止
    pub async fn run(&self, initial_url: &str, budget: Duration) -> ChainReport {
        self.run_as(&self.identity, initial_url, budget).await
    }

    /// 以指定身份运行一条链路直到终止
    pub async fn run_as(&self, identity: &Identity, initial_url: &str, budget: Duration) -> ChainReport {
        let run_id = self.next_run_id.fetch_add(1, Ordering::Relaxed);

        if let Err(reason) = validate_input(initial_url, budget) {
            warn!("[链路 {}] ❌ 输入不合法: {}", run_id, reason);
            return invalid_input_report(run_id, initial_url, reason);
        }

        let Some(session) = ChainSession::new(initial_url, budget) else {
            let reason = format!("时间预算无法表示: {:?}", budget);
            warn!("[链路 {}] ❌ 输入不合法: {}", run_id, reason);
            return invalid_input_report(run_id, initial_url, reason);
        };

        logging::log_chain_start(run_id, initial_url, budget);
        let mut run = ChainRun {
            run_id,
            session,
            transitions: Vec::new(),
        };
        run.record(ChainState::Init);

        let status = self.drive(&mut run, identity).await;
        run.finish(status)
    }

    async fn drive(&self, run: &mut ChainRun, identity: &Identity) -> FinalStatus {
        loop {
            let ctx = QuizCtx::new(
                run.run_id,
                run.session.pages_visited(),
                run.session.attempt_count(),
                run.session.deadline(),
            );
            let url = run.session.current_url().to_string();

            run.record(ChainState::Fetching);
            let page_text = match self.flow.fetch_page(&ctx, &url).await {
                Ok(text) => text,
                Err(e) => return run.fail(&ctx, &e),
            };

            run.record(ChainState::Solving);
            let solved = match self.flow.solve(&ctx, &url, &page_text).await {
                Ok(solved) => solved,
                Err(e) => return run.fail(&ctx, &e),
            };

            run.record(ChainState::Submitting);
            let request = SubmitRequest::new(
                solved.submit_url,
                SubmissionPayload {
                    email: identity.email.clone(),
                    secret: identity.secret.clone(),
                    url: url.clone(),
                    answer: solved.answer,
                },
            );
            let verdict = match self.flow.submit(&ctx, &request).await {
                Ok(verdict) => verdict,
                Err(e) => return run.fail(&ctx, &e),
            };
            run.session.record_submission();

            run.record(ChainState::Evaluating);
            if run.session.is_expired() {
                warn!("{} ⏰ 已超过时间预算，结束链路", ctx);
                return FinalStatus::TimedOut;
            }

            match decide(&verdict, run.session.attempt_count()) {
                Decision::Retry => {
                    info!("{} 🔁 答错，重试同一题", ctx);
                    run.session.begin_retry();
                    run.record(ChainState::Retrying);
                }
                Decision::Advance(next) => {
                    info!("{} ➡️ 进入下一题: {}", ctx, next);
                    run.session.advance_to(next);
                    run.record(ChainState::Advancing);
                }
                Decision::Finish(status) => return status,
            }
        }
    }
}

/// 一次运行的会话和迁移记录
struct ChainRun {
    run_id: usize,
    session: ChainSession,
    transitions: Vec<Transition>,
}

impl ChainRun {
    /// 记录一次状态迁移并输出结构化日志
    fn record(&mut self, state: ChainState) {
        let elapsed = self.session.elapsed();
        let url = self.session.current_url();
        let attempt = self.session.attempt_count();

        info!(
            run = self.run_id,
            state = %state,
            url = %url,
            attempt,
            elapsed_ms = elapsed.as_millis() as u64,
            "链路状态迁移"
        );

        self.transitions.push(Transition {
            state,
            url: url.to_string(),
            attempt,
            elapsed,
        });
    }

    /// 步骤失败时截止时间已过，按超时结束
    fn fail(&self, ctx: &QuizCtx, err: &StepError) -> FinalStatus {
        if self.session.is_expired() {
            warn!("{} ⏰ 已超过时间预算，结束链路: {}", ctx, err);
            return FinalStatus::TimedOut;
        }
        error!("{} ❌ 步骤失败 ({}): {}", ctx, err.kind(), err);
        FinalStatus::from_step_error(err)
    }

    fn finish(mut self, status: FinalStatus) -> ChainReport {
        self.session.finish(status.session_status());
        self.record(ChainState::Terminated);

        let elapsed = self.session.elapsed();
        logging::log_chain_complete(
            self.run_id,
            &status.to_string(),
            self.session.pages_visited(),
            self.session.submissions(),
            elapsed,
        );

        ChainReport {
            run_id: self.run_id,
            status,
            last_url: self.session.current_url().to_string(),
            pages_visited: self.session.pages_visited(),
            submissions: self.session.submissions(),
            elapsed,
            transitions: self.transitions,
        }
    }
}

/// 起始地址必须是 http(s) 绝对地址，预算必须在 (0, MAX_CHAIN_BUDGET] 内
fn validate_input(initial_url: &str, budget: Duration) -> Result<(), String> {
    if budget.is_zero() {
        return Err("时间预算必须大于 0".to_string());
    }
    if budget > MAX_CHAIN_BUDGET {
        return Err(format!(
            "时间预算过大: {} 秒 (上限 {} 秒)",
            budget.as_secs(),
            MAX_CHAIN_BUDGET.as_secs()
        ));
    }
    let trimmed = initial_url.trim();
    if trimmed.is_empty() {
        return Err("起始地址为空".to_string());
    }
    let parsed = Url::parse(trimmed).map_err(|e| format!("起始地址不是绝对 URL: {}", e))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!("不支持的协议: {}", parsed.scheme()));
    }
    Ok(())
}

fn invalid_input_report(run_id: usize, initial_url: &str, reason: String) -> ChainReport {
    let err = StepError::InvalidInput(reason);
    let transitions = [ChainState::Init, ChainState::Terminated]
        .into_iter()
        .map(|state| Transition {
            state,
            url: initial_url.to_string(),
            attempt: 0,
            elapsed: Duration::ZERO,
        })
        .collect();

    ChainReport {
        run_id,
        status: FinalStatus::from_step_error(&err),
        last_url: initial_url.to_string(),
        pages_visited: 0,
        submissions: 0,
        elapsed: Duration::ZERO,
        transitions,
    }
}
