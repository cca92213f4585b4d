/// 日志工具模块
///
/// 提供日志初始化以及格式化输出的辅助函数
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// 初始化日志
///
/// 优先使用 `RUST_LOG`；未设置时按 `verbose` 选择 debug 或 info
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config, addr: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 题目链路求解服务");
    info!("🌐 监听地址: {}", addr);
    info!("🤖 模型服务: {}", config.llm_provider);
    info!("⏱️ 链路预算: {} 秒", config.quiz_timeout_secs);
    info!("📊 最大并发链路数: {}", config.max_concurrent_chains);
    info!("{}", "=".repeat(60));
}

/// 记录链路开始信息
pub fn log_chain_start(run_id: usize, url: &str, budget: Duration) {
    info!("\n{}", "=".repeat(60));
    info!("[链路 {}] 🔗 开始求解: {}", run_id, url);
    info!("[链路 {}] ⏱️ 时间预算: {} 秒", run_id, budget.as_secs());
    info!("{}", "=".repeat(60));
}

/// 打印链路结束统计
pub fn log_chain_complete(
    run_id: usize,
    status: &str,
    pages: usize,
    submissions: usize,
    elapsed: Duration,
) {
    info!("\n{}", "─".repeat(60));
    info!("[链路 {}] 📊 链路结束: {}", run_id, status);
    info!(
        "[链路 {}] 完成时间: {}",
        run_id,
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!(
        "[链路 {}] 访问题目 {} 个, 提交 {} 次, 耗时 {:.2} 秒",
        run_id,
        pages,
        submissions,
        elapsed.as_secs_f64()
    );
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（按字符计）
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
