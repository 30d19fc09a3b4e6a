//! 标签页生命周期 - 业务能力层
//!
//! 打开后台标签页 → 等待页面渲染 → 执行 body → 无论结果如何都关闭

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::BrowserError;
use crate::infrastructure::BrowserDriver;
use crate::models::TabId;

/// 标签页作用域管理
#[derive(Clone)]
pub struct TabLifecycle {
    driver: Arc<dyn BrowserDriver>,
}

impl TabLifecycle {
    pub fn new(driver: Arc<dyn BrowserDriver>) -> Self {
        Self { driver }
    }

    /// 在临时标签页中执行 `body`
    ///
    /// 只有打开标签页失败才返回错误；body 自身的结果原样返回。
    /// body panic 时先关闭标签页再继续展开；外层 future 被丢弃时由守卫在后台关闭
    pub async fn with_tab<F, Fut, R>(
        &self,
        url: &str,
        settle: Duration,
        body: F,
    ) -> Result<R, BrowserError>
    where
        F: FnOnce(TabId) -> Fut,
        Fut: Future<Output = R>,
    {
        let tab = self.driver.open_tab(url).await?;
        let mut guard = TabGuard {
            driver: Arc::clone(&self.driver),
            tab: Some(tab.clone()),
        };

        debug!("等待标签页 {} 渲染 {:?}", tab, settle);
        sleep(settle).await;

        let outcome = AssertUnwindSafe(body(tab)).catch_unwind().await;

        if let Some(tab) = guard.tab.take() {
            close_quietly(self.driver.as_ref(), &tab).await;
        }

        match outcome {
            Ok(value) => Ok(value),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

async fn close_quietly(driver: &dyn BrowserDriver, tab: &TabId) {
    if let Err(e) = driver.close_tab(tab).await {
        warn!("关闭标签页 {} 失败: {}", tab, e);
    }
}

/// 未正常走到关闭步骤时，在后台补关标签页
struct TabGuard {
    driver: Arc<dyn BrowserDriver>,
    tab: Option<TabId>,
}

impl Drop for TabGuard {
    fn drop(&mut self) {
        let Some(tab) = self.tab.take() else {
            return;
        };
        let driver = Arc::clone(&self.driver);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    close_quietly(driver.as_ref(), &tab).await;
                });
            }
            Err(_) => warn!("运行时已关闭，标签页 {} 未能关闭", tab),
        }
    }
}
