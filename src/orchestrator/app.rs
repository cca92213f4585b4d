//! 应用 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：获取浏览器，构建抓取、模型、提交三个协作者
//! 2. **对外服务**：监听 HTTP 端口，收到题目后在后台启动链路
//! 3. **并发控制**：使用 Semaphore 限制同时运行的链路数量
//! 4. **资源管理**：持有 Browser，确保生命周期覆盖所有链路

use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::Browser;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::api;
use crate::browser;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::orchestrator::chain_runner::{ChainReport, ChainRunner, Identity};
use crate::services::{build_backend, BrowserPageFetcher, HttpSubmitter};
use crate::utils::logging;
use crate::workflow::{QuizFlow, StepPolicy};

/// 请求处理器共享的状态
pub struct AppState {
    pub config: Config,
    pub runner: Arc<ChainRunner>,
    chain_slots: Arc<Semaphore>,
}

impl AppState {
    pub fn new(config: Config, runner: Arc<ChainRunner>) -> Self {
        let chain_slots = Arc::new(Semaphore::new(config.max_concurrent_chains));
        Self {
            config,
            runner,
            chain_slots,
        }
    }

    /// 链路预算
    pub fn budget(&self) -> Duration {
        self.config.quiz_budget()
    }

    /// 在后台启动一条链路
    ///
    /// 超过并发上限时排队等待；预算从链路真正开始时计算
    pub fn spawn_chain(&self, identity: Identity, url: String) -> JoinHandle<Option<ChainReport>> {
        let runner = self.runner.clone();
        let slots = self.chain_slots.clone();
        let budget = self.budget();

        tokio::spawn(async move {
            let _permit = match slots.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!("❌ 获取链路执行许可失败: {}", e);
                    return None;
                }
            };
            Some(runner.run_as(&identity, &url, budget).await)
        })
    }
}

/// 应用主结构
pub struct App {
    state: Arc<AppState>,
    _browser: Arc<Browser>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> AppResult<Self> {
        config.validate()?;

        // 获取浏览器
        let browser = Arc::new(browser::open_browser(&config).await?);

        let fetcher = Arc::new(BrowserPageFetcher::new(
            browser.clone(),
            Duration::from_millis(config.render_settle_ms),
        ));
        let backend = build_backend(&config)?;
        let submitter = Arc::new(
            HttpSubmitter::new(Duration::from_secs(config.http_timeout_secs))
                .map_err(|e| AppError::Other(format!("创建 HTTP 客户端失败: {}", e)))?,
        );
        info!("✓ 模型服务: {}", backend.name());

        let flow = Arc::new(QuizFlow::new(
            fetcher,
            backend,
            submitter,
            StepPolicy::from_config(&config),
        ));
        let identity = Identity {
            email: config.student_email.clone(),
            secret: config.student_secret.clone(),
        };
        let runner = Arc::new(ChainRunner::new(flow, identity));

        Ok(Self {
            state: Arc::new(AppState::new(config, runner)),
            _browser: browser,
        })
    }

    /// 运行 HTTP 服务直到进程结束
    pub async fn run(self) -> AppResult<()> {
        let addr = format!(
            "{}:{}",
            self.state.config.server_host, self.state.config.server_port
        );
        logging::log_startup(&self.state.config, &addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| AppError::server_failed(&addr, e))?;
        info!("✓ 服务已启动: http://{}", addr);

        axum::serve(listener, api::router(self.state.clone()))
            .await
            .map_err(|e| AppError::server_failed(&addr, e))?;

        Ok(())
    }
}
