mod connection;
mod headless;

pub use connection::connect_to_browser;
pub use headless::{launch_headless_browser, LaunchOptions};

use chromiumoxide::Browser;

use crate::config::Config;
use crate::error::BrowserError;

/// 按配置获取浏览器：设置了调试端口则连接，否则启动新的无头浏览器
pub async fn open_browser(config: &Config) -> Result<Browser, BrowserError> {
    match config.browser_debug_port {
        Some(port) => connect_to_browser(port).await,
        None => {
            let options = LaunchOptions {
                headless: config.headless,
                chrome_executable: config.chrome_executable.clone(),
            };
            launch_headless_browser(&options).await
        }
    }
}
