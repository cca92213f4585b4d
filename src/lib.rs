//! # Quiz Chain Solver
//!
//! 一个自动求解链式题目的 Rust 服务：抓取题目页面 → 调用模型求解 →
//! 提交答案 → 按判定结果进入下一题，全程受时间预算约束
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `browser/` - 启动或连接 Chromium
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `JsExecutor` - page owner，提供 eval() 能力
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，每个能力独立
//! - `PageFetcher` - 抓取渲染后的页面文本
//! - `ModelBackend` - 模型推理（OpenAI 兼容 / Anthropic）
//! - `answer_extractor` - 从模型输出中提取带类型的答案
//! - `Submitter` - 提交答案并返回判定结果
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一道题"每个步骤的时限与重试
//! - `QuizCtx` - 上下文封装（链路编号 + 题目序号 + 尝试序号）
//! - `QuizFlow` - 步骤编排（fetch → solve → submit）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/chain_runner` - 单条链路的状态机
//! - `orchestrator/app` - HTTP 服务、并发控制、资源管理
//!
//! ## 模块结构

pub mod api;
pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult, ErrorKind, StepError};
pub use infrastructure::JsExecutor;
pub use models::{AnswerValue, SolvedAnswer, Verdict};
pub use orchestrator::{App, ChainReport, ChainRunner, FinalStatus, Identity};
pub use services::extract;
pub use workflow::{QuizCtx, QuizFlow, StepPolicy};
