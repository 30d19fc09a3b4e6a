//! 分页抓取流程
//!
//! 在用户当前标签页上循环：提取商品 ID → 点击下一页 → 等待渲染，
//! 最多 `MAX_PAGES` 页

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::models::{CrawlSummary, Event, ProgressEvent, TabId};
use crate::services::PageActionExecutor;
use crate::workflow::reporter::ProgressSink;

/// 页数硬上限，防止异常分页导致死循环
pub const MAX_PAGES: usize = 10;

/// 一次分页任务的会话数据
#[derive(Debug, Default)]
pub struct PaginationSession {
    page_count: usize,
    accumulated_ids: HashSet<String>,
    active: bool,
    tab: Option<TabId>,
}

impl PaginationSession {
    pub fn start(tab: TabId) -> Self {
        Self {
            page_count: 0,
            accumulated_ids: HashSet::new(),
            active: true,
            tab: Some(tab),
        }
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn total_items(&self) -> usize {
        self.accumulated_ids.len()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn tab(&self) -> Option<&TabId> {
        self.tab.as_ref()
    }

    /// 合并一页的 ID，返回去重后的总数
    pub fn add_ids(&mut self, ids: impl IntoIterator<Item = String>) -> usize {
        self.accumulated_ids.extend(ids);
        self.accumulated_ids.len()
    }

    pub fn sorted_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.accumulated_ids.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// 结束会话
    pub fn reset(&mut self) {
        self.active = false;
        self.tab = None;
        self.page_count = 0;
        self.accumulated_ids.clear();
    }
}

/// 分页任务的结束方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginationOutcome {
    /// 没有下一页了
    Completed,
    /// 达到页数上限
    PageLimitReached,
    /// 提取失败
    Failed(String),
    /// 被用户停止
    Stopped,
}

/// 分页任务结果
#[derive(Debug, Clone)]
pub struct PaginationReport {
    pub outcome: PaginationOutcome,
    pub pages: usize,
    pub item_ids: Vec<String>,
}

/// 分页抓取器
#[derive(Clone)]
pub struct PaginationWalker {
    executor: PageActionExecutor,
    settle: Duration,
}

impl PaginationWalker {
    pub fn new(executor: PageActionExecutor, settle: Duration) -> Self {
        Self { executor, settle }
    }

    pub async fn run(
        &self,
        tab: &TabId,
        cancel: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> PaginationReport {
        let mut session = PaginationSession::start(tab.clone());
        let outcome = self.walk(&mut session, cancel, sink).await;

        let report = PaginationReport {
            outcome,
            pages: session.page_count(),
            item_ids: session.sorted_ids(),
        };
        info!(
            "分页任务结束: {:?}, 共 {} 页 {} 个商品",
            report.outcome,
            report.pages,
            report.item_ids.len()
        );

        session.reset();
        report
    }

    async fn walk(
        &self,
        session: &mut PaginationSession,
        cancel: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> PaginationOutcome {
        let Some(tab) = session.tab().cloned() else {
            return PaginationOutcome::Stopped;
        };

        while session.page_count < MAX_PAGES {
            if cancel.is_cancelled() {
                info!("分页任务已被停止 (第 {} 页后)", session.page_count);
                return PaginationOutcome::Stopped;
            }

            session.page_count += 1;
            info!("📄 正在抓取第 {}/{} 页", session.page_count, MAX_PAGES);

            let ids = match self.executor.extract_item_ids(&tab).await {
                Ok(ids) => ids,
                Err(e) => {
                    warn!("第 {} 页抓取失败: {}", session.page_count, e);
                    sink.publish(Event::crawl_error("Failed to crawl page"));
                    return PaginationOutcome::Failed(e.to_string());
                }
            };

            let total = session.add_ids(ids);
            sink.publish(Event::progress(ProgressEvent::page(session.page_count, total)));

            let has_next = match self.executor.click_next(&tab).await {
                Ok(clicked) => clicked,
                Err(e) => {
                    warn!("查找下一页按钮失败，按无下一页处理: {}", e);
                    false
                }
            };
            if !has_next {
                info!("✓ 没有下一页，共 {} 个商品", total);
                sink.publish(Event::CrawlComplete {
                    data: CrawlSummary { total_items: total },
                });
                return PaginationOutcome::Completed;
            }

            sleep(self.settle).await;
        }

        info!("已达到页数上限 {}", MAX_PAGES);
        sink.publish(Event::CrawlComplete {
            data: CrawlSummary {
                total_items: session.total_items(),
            },
        });
        PaginationOutcome::PageLimitReached
    }
}
