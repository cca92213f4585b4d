//! 题目处理上下文
//!
//! 封装"我正在处理哪条链路的第几题、第几次尝试"以及链路截止时间

use std::fmt::Display;
use std::time::Duration;

use tokio::time::Instant;

/// 题目处理上下文
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizCtx {
    /// 链路编号（仅用于日志显示）
    pub run_id: usize,

    /// 题目在链路中的序号（从1开始）
    pub page_index: usize,

    /// 当前题目的尝试序号（0 为首次，1 为重试）
    pub attempt: u32,

    /// 链路截止时间，任何调用都不能越过它
    pub deadline: Instant,
}

impl QuizCtx {
    pub fn new(run_id: usize, page_index: usize, attempt: u32, deadline: Instant) -> Self {
        Self {
            run_id,
            page_index,
            attempt,
            deadline,
        }
    }

    /// 距截止时间还剩多少
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// 单次调用的实际时限：配置时限与剩余预算取小
    ///
    /// 截止时间已过时返回 `None`
    pub fn call_limit(&self, call_timeout: Duration) -> Option<Duration> {
        let remaining = self.remaining();
        if remaining.is_zero() {
            None
        } else {
            Some(call_timeout.min(remaining))
        }
    }
}

impl Display for QuizCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[链路 {} 题目#{} 尝试#{}]",
            self.run_id, self.page_index, self.attempt
        )
    }
}
