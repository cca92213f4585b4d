//! 链路会话
//!
//! 一次链路运行的全部可变状态，只由 `ChainRunner` 持有

use std::time::Duration;

use tokio::time::Instant;

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Running,
    Completed,
    Failed,
    TimedOut,
}

/// 一次链路运行
///
/// 截止时间在创建时确定，之后不会延长
#[derive(Debug)]
pub struct ChainSession {
    start: Instant,
    deadline: Instant,
    current_url: String,
    attempt_count: u32,
    status: SessionStatus,
    pages_visited: usize,
    submissions: usize,
}

impl ChainSession {
    /// 预算大到无法表示截止时间时返回 `None`
    pub fn new(initial_url: impl Into<String>, budget: Duration) -> Option<Self> {
        let start = Instant::now();
        let deadline = start.checked_add(budget)?;
        Some(Self {
            start,
            deadline,
            current_url: initial_url.into(),
            attempt_count: 0,
            status: SessionStatus::Running,
            pages_visited: 1,
            submissions: 0,
        })
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// 是否已到截止时间
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn current_url(&self) -> &str {
        &self.current_url
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn pages_visited(&self) -> usize {
        self.pages_visited
    }

    pub fn submissions(&self) -> usize {
        self.submissions
    }

    /// 同一题目再试一次
    pub fn begin_retry(&mut self) {
        self.attempt_count += 1;
    }

    /// 进入下一题
    pub fn advance_to(&mut self, next_url: impl Into<String>) {
        self.current_url = next_url.into();
        self.attempt_count = 0;
        self.pages_visited += 1;
    }

    pub fn record_submission(&mut self) {
        self.submissions += 1;
    }

    pub fn finish(&mut self, status: SessionStatus) {
        self.status = status;
    }
}
