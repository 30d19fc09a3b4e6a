use chromiumoxide::Browser;
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::error::BrowserError;

/// 连接到已开启远程调试端口的浏览器
///
/// 复用用户已登录的浏览器会话，追踪页需要登录态
pub async fn connect_to_browser(port: u16) -> Result<Browser, BrowserError> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);

    let (browser, mut handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        BrowserError::ConnectionFailed {
            endpoint: browser_url.clone(),
            source: e,
        }
    })?;
    debug!("浏览器连接成功");

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

    let pages = browser.pages().await?;
    info!("✓ 已连接，当前共有 {} 个标签页", pages.len());
    for page in &pages {
        if let Ok(Some(url)) = page.url().await {
            debug!("标签页 {}: {}", page.target_id().as_ref(), url);
        }
    }

    Ok(browser)
}
