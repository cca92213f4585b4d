//! JS 执行器 - 基础设施层
//!
//! 持有一个 page 资源，只暴露"执行 JS"的能力

use anyhow::Result;
use chromiumoxide::{Browser, Page};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

/// 读取渲染后正文文本的脚本
const BODY_TEXT_SCRIPT: &str = "document.body ? document.body.innerText : ''";

/// JS 执行器
///
/// 职责：
/// - 持有一个 Page 资源，用完后关闭
/// - 暴露 eval() 能力
/// - 不认识题目 / 答案
/// - 不处理业务流程
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    /// 包装已有页面
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 在浏览器中打开新页面并等待导航完成
    pub async fn open(browser: &Browser, url: &str) -> Result<Self> {
        let page = browser.new_page(url).await?;
        page.wait_for_navigation().await?;
        Ok(Self::new(page))
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        let json_value = result.into_value()?;
        Ok(json_value)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> Result<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }

    /// 渲染后的正文文本
    pub async fn body_text(&self) -> Result<String> {
        self.eval_as::<String>(BODY_TEXT_SCRIPT).await
    }

    /// 关闭页面
    pub async fn close(self) -> Result<()> {
        self.page.close().await?;
        Ok(())
    }
}
