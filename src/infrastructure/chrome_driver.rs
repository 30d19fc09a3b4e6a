//! 基于 chromiumoxide 的浏览器驱动

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::{Browser, Page};
use tracing::{debug, info};

use crate::error::{BrowserError, ExecutionError};
use crate::infrastructure::driver::{ActionOutput, BrowserDriver, PageAction};
use crate::infrastructure::js_executor::JsExecutor;
use crate::models::TabId;

/// Chrome 驱动
///
/// 唯一持有 Browser 的组件；已知标签页按 target id 缓存
pub struct ChromeDriver {
    browser: Browser,
    tabs: Mutex<HashMap<TabId, Page>>,
}

impl ChromeDriver {
    pub fn new(browser: Browser) -> Self {
        Self {
            browser,
            tabs: Mutex::new(HashMap::new()),
        }
    }

    fn tabs(&self) -> MutexGuard<'_, HashMap<TabId, Page>> {
        self.tabs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 找到标签页对应的 Page，未缓存时在浏览器的页面列表里查找
    async fn page_for(&self, tab: &TabId) -> Result<Page, BrowserError> {
        if let Some(page) = self.tabs().get(tab) {
            return Ok(page.clone());
        }

        debug!("标签页 {} 未缓存，正在从浏览器查找", tab);
        let pages = self.browser.pages().await?;
        let page = pages
            .into_iter()
            .find(|p| p.target_id().as_ref() == tab.as_str())
            .ok_or_else(|| BrowserError::TabNotFound(tab.to_string()))?;

        self.tabs().insert(tab.clone(), page.clone());
        Ok(page)
    }
}

#[async_trait]
impl BrowserDriver for ChromeDriver {
    async fn open_tab(&self, url: &str) -> Result<TabId, BrowserError> {
        let params = CreateTargetParams::builder()
            .url(url)
            .background(true)
            .build()
            .map_err(|e| BrowserError::TabOpenFailed {
                url: url.to_string(),
                source: e.into(),
            })?;

        let page = self
            .browser
            .new_page(params)
            .await
            .map_err(|e| BrowserError::TabOpenFailed {
                url: url.to_string(),
                source: Box::new(e),
            })?;

        let tab = TabId::new(page.target_id().as_ref());
        info!("📑 已打开后台标签页 {}: {}", tab, url);
        self.tabs().insert(tab.clone(), page);
        Ok(tab)
    }

    async fn close_tab(&self, tab: &TabId) -> Result<(), BrowserError> {
        let page = self.tabs().remove(tab);
        let page = match page {
            Some(page) => page,
            None => self.page_for(tab).await.map(|page| {
                self.tabs().remove(tab);
                page
            })?,
        };

        page.close().await.map_err(|e| BrowserError::TabCloseFailed {
            tab: tab.to_string(),
            source: Box::new(e),
        })?;
        debug!("标签页 {} 已关闭", tab);
        Ok(())
    }

    async fn run_action(
        &self,
        tab: &TabId,
        action: &PageAction,
    ) -> Result<ActionOutput, ExecutionError> {
        let page = self.page_for(tab).await?;
        JsExecutor::new(page).run(action).await
    }
}
