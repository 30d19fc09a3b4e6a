//! 浏览器驱动能力
//!
//! 上层只认识标签页 ID 和固定的几种页面动作，不接触 CDP 细节

use async_trait::async_trait;

use crate::error::{BrowserError, ExecutionError};
use crate::models::TabId;

/// 可在页面内执行的动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageAction {
    /// 查找并点击“下一页”
    ClickNext,
    /// 提取当前页的商品 ID
    ExtractItemIds,
    /// 按选择器读取文本
    ExtractText { selector: String },
}

impl PageAction {
    pub fn extract_text(selector: impl Into<String>) -> Self {
        PageAction::ExtractText {
            selector: selector.into(),
        }
    }
}

/// 页面动作的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutput {
    /// 是否点到了下一页
    Clicked(bool),
    /// 去重后的商品 ID
    ItemIds(Vec<String>),
    /// 节点文本，节点不存在或为空时为 `None`
    Text(Option<String>),
}

/// 浏览器驱动
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// 在后台打开新标签页
    async fn open_tab(&self, url: &str) -> Result<TabId, BrowserError>;

    /// 关闭标签页
    async fn close_tab(&self, tab: &TabId) -> Result<(), BrowserError>;

    /// 在指定标签页执行页面动作
    async fn run_action(
        &self,
        tab: &TabId,
        action: &PageAction,
    ) -> Result<ActionOutput, ExecutionError>;
}
