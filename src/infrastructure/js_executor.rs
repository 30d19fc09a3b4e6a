//! JS 执行器 - 基础设施层
//!
//! 持有一个标签页，只暴露"执行 JS"的能力

use chromiumoxide::Page;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::{BrowserError, ExecutionError};
use crate::infrastructure::driver::{ActionOutput, PageAction};

/// JS 执行器
///
/// 职责：
/// - 持有单个标签页的 Page
/// - 暴露 eval() 能力
/// - 不认识订单 / 表格
/// - 不处理业务流程
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue, ExecutionError> {
        let result = self
            .page
            .evaluate(js_code.into())
            .await
            .map_err(BrowserError::from)?;
        result
            .into_value()
            .map_err(|e| ExecutionError::Malformed(e.to_string()))
    }

    /// 执行页面动作
    pub async fn run(&self, action: &PageAction) -> Result<ActionOutput, ExecutionError> {
        let value = self.eval(action.script()).await?;
        debug!("页面动作 {:?} 返回: {}", action, value);
        action.parse_output(value)
    }
}
