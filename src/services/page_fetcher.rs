//! 页面抓取 - 业务能力层
//!
//! 只负责"拿到题目页面渲染后的文本"，不关心链路流程

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Browser;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::infrastructure::JsExecutor;
use crate::utils::truncate_text;

/// 页面抓取能力
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// 返回页面渲染后的可见文本
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// 基于无头浏览器的页面抓取
///
/// 每次抓取打开一个新页面，读完文本后立即关闭
pub struct BrowserPageFetcher {
    browser: Arc<Browser>,
    render_settle: Duration,
}

impl BrowserPageFetcher {
    pub fn new(browser: Arc<Browser>, render_settle: Duration) -> Self {
        Self {
            browser,
            render_settle,
        }
    }
}

#[async_trait]
impl PageFetcher for BrowserPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        debug!("打开页面: {}", url);
        let executor = JsExecutor::open(&self.browser, url)
            .await
            .map_err(|e| FetchError::NavigationFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        // 等待页面脚本把题目渲染出来
        tokio::time::sleep(self.render_settle).await;

        let text = executor.body_text().await;

        if let Err(e) = executor.close().await {
            warn!("关闭页面失败 ({}): {}", url, e);
        }

        let text = text.map_err(|e| FetchError::ScriptFailed {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(FetchError::EmptyContent {
                url: url.to_string(),
            });
        }

        debug!("页面文本 {} 字符: {}", text.chars().count(), truncate_text(&text, 120));
        Ok(text)
    }
}
