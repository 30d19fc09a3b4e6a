//! 页面动作执行服务 - 业务能力层
//!
//! 驱动层的任何失败（包括超时和 panic）都在这里被收敛为 `ExecutionError`，
//! 节点不存在属于正常结果

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, warn};

use crate::error::ExecutionError;
use crate::infrastructure::{ActionOutput, BrowserDriver, PageAction};
use crate::models::TabId;

/// 页面动作执行器
#[derive(Clone)]
pub struct PageActionExecutor {
    driver: Arc<dyn BrowserDriver>,
    timeout: Duration,
}

impl PageActionExecutor {
    pub fn new(driver: Arc<dyn BrowserDriver>, timeout: Duration) -> Self {
        Self { driver, timeout }
    }

    /// 在指定标签页执行动作，单次尝试，不重试
    pub async fn run(
        &self,
        tab: &TabId,
        action: &PageAction,
    ) -> Result<ActionOutput, ExecutionError> {
        let call = AssertUnwindSafe(self.driver.run_action(tab, action)).catch_unwind();

        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(ExecutionError::Panicked(panic_message(panic))),
            Err(_) => Err(ExecutionError::TimedOut(self.timeout)),
        };

        if let Err(e) = &result {
            warn!("标签页 {} 执行 {:?} 失败: {}", tab, action, e);
        }
        result
    }

    /// 点击“下一页”，返回是否点到
    pub async fn click_next(&self, tab: &TabId) -> Result<bool, ExecutionError> {
        match self.run(tab, &PageAction::ClickNext).await? {
            ActionOutput::Clicked(clicked) => Ok(clicked),
            other => Err(unexpected(other)),
        }
    }

    /// 提取当前页的商品 ID
    pub async fn extract_item_ids(&self, tab: &TabId) -> Result<Vec<String>, ExecutionError> {
        match self.run(tab, &PageAction::ExtractItemIds).await? {
            ActionOutput::ItemIds(ids) => {
                debug!("标签页 {} 提取到 {} 个商品 ID", tab, ids.len());
                Ok(ids)
            }
            other => Err(unexpected(other)),
        }
    }

    /// 读取选择器对应节点的文本
    pub async fn extract_text(
        &self,
        tab: &TabId,
        selector: &str,
    ) -> Result<Option<String>, ExecutionError> {
        match self.run(tab, &PageAction::extract_text(selector)).await? {
            ActionOutput::Text(text) => Ok(text),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(output: ActionOutput) -> ExecutionError {
    ExecutionError::Malformed(format!("{:?}", output))
}

/// 取出 panic 携带的文本
pub(crate) fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
