//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责链路调度和进程级资源，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用
//! - 管理应用生命周期（初始化、运行）
//! - 管理浏览器资源（Browser）
//! - 控制并发链路数量（Semaphore）
//!
//! ### `chain_runner` - 链路运行器
//! - 单条链路的状态机
//! - 截止时间检查、答错重试 / 跳过规则
//! - 输出每次状态迁移的结构化记录
//!
//! ### `chain_session` - 链路会话
//! - 单条链路的可变状态（当前题目、尝试次数、截止时间）
//!
//! ## 层次关系
//!
//! ```text
//! app (处理多条链路)
//!     ↓
//! chain_runner (处理一条链路)
//!     ↓
//! workflow::QuizFlow (处理单个步骤)
//!     ↓
//! services (能力层：fetch / model / extract / submit)
//!     ↓
//! infrastructure (基础设施：JsExecutor)
//! ```

pub mod app;
pub mod chain_runner;
pub mod chain_session;

// 重新导出主要类型
pub use app::{App, AppState};
pub use chain_runner::{
    decide, ChainReport, ChainRunner, ChainState, Decision, FinalStatus, Identity, Transition,
    MAX_CHAIN_BUDGET,
};
pub use chain_session::{ChainSession, SessionStatus};
