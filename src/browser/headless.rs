use std::path::Path;

use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::error::BrowserError;

/// 无头浏览器启动参数
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub headless: bool,
    pub chrome_executable: Option<String>,
}

/// 启动无头浏览器
///
/// 返回的 `Browser` 在整个进程内共享，每次抓取各自打开新页面
pub async fn launch_headless_browser(options: &LaunchOptions) -> Result<Browser, BrowserError> {
    info!("🚀 启动无头浏览器...");
    debug!("启动参数: {:?}", options);

    let mut builder = BrowserConfig::builder();
    builder = if options.headless {
        builder.new_headless_mode()
    } else {
        builder.with_head()
    };
    if let Some(path) = &options.chrome_executable {
        builder = builder.chrome_executable(Path::new(path));
    }

    let config = builder
        .args(vec![
            "--disable-gpu",           // 容器内无头模式必须禁用 GPU
            "--no-sandbox",            // 禁用沙盒，防止权限问题导致的崩溃
            "--disable-dev-shm-usage", // 防止共享内存不足
        ])
        .build()
        .map_err(|e| {
            error!("配置无头浏览器失败: {}", e);
            BrowserError::ConfigurationFailed { message: e }
        })?;

    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动无头浏览器失败: {}", e);
        BrowserError::from(e)
    })?;
    debug!("无头浏览器启动成功");

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 添加短暂延迟以等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    info!("✅ 无头浏览器已就绪");
    Ok(browser)
}
