//! 订单物流流程 - 流程层
//!
//! 核心职责：定义"一张表"的完整处理流程
//!
//! 流程顺序：
//! 1. 读取表格订单号（失败则整批失败）
//! 2. 逐个订单：物流详情页取运单号 → 物流状态页取状态 → 回写表格
//! 3. 单个订单的任何失败只影响该订单

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::clients::SheetApi;
use crate::config::Config;
use crate::error::{ApiError, ExecutionError};
use crate::models::{Event, Lookup, OrderJobParams, ProgressEvent, TrackingRecord};
use crate::services::{PageActionExecutor, TabLifecycle};
use crate::utils::logging::truncate_text;
use crate::workflow::reporter::ProgressSink;

/// 物流页面的地址与选择器
#[derive(Debug, Clone)]
pub struct TrackingPages {
    pub tracking_url_template: String,
    pub status_url_template: String,
    pub tracking_number_selector: String,
    pub status_selector: String,
    pub rate_limit_selector: String,
    pub rate_limit_marker: String,
    pub tracking_settle: Duration,
    pub status_settle: Duration,
}

impl From<&Config> for TrackingPages {
    fn from(config: &Config) -> Self {
        Self {
            tracking_url_template: config.tracking_url_template.clone(),
            status_url_template: config.status_url_template.clone(),
            tracking_number_selector: config.tracking_number_selector.clone(),
            status_selector: config.status_selector.clone(),
            rate_limit_selector: config.rate_limit_selector.clone(),
            rate_limit_marker: config.rate_limit_marker.clone(),
            tracking_settle: config.tracking_settle(),
            status_settle: config.status_settle(),
        }
    }
}

impl TrackingPages {
    fn tracking_url(&self, order_id: &str) -> String {
        self.tracking_url_template.replace("{orderId}", order_id)
    }

    fn status_url(&self, tracking_number: &str) -> String {
        self.status_url_template
            .replace("{trackingNumber}", tracking_number)
    }
}

/// 订单任务的结束方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingOutcome {
    Completed { processed: usize },
    Stopped { processed: usize },
    Failed(String),
}

/// 订单物流流水线
///
/// - 严格顺序处理，不并发
/// - 不持有任何标签页，每个页面都在 `TabLifecycle` 作用域内打开和关闭
pub struct OrderTrackingPipeline {
    sheets: Arc<dyn SheetApi>,
    tabs: TabLifecycle,
    executor: PageActionExecutor,
    pages: TrackingPages,
}

impl OrderTrackingPipeline {
    pub fn new(
        sheets: Arc<dyn SheetApi>,
        tabs: TabLifecycle,
        executor: PageActionExecutor,
        pages: TrackingPages,
    ) -> Self {
        Self {
            sheets,
            tabs,
            executor,
            pages,
        }
    }

    pub async fn run(
        &self,
        params: &OrderJobParams,
        cancel: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> TrackingOutcome {
        match self.drive(params, cancel, sink).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("❌ 订单任务失败: {}", e);
                // 先发错误事件，终态状态文本放在最后
                sink.publish(Event::crawl_error(e.to_string()));
                sink.publish(Event::progress(ProgressEvent::status(
                    0,
                    0,
                    format!("Error: {}", e),
                    false,
                )));
                TrackingOutcome::Failed(e.to_string())
            }
        }
    }

    async fn drive(
        &self,
        params: &OrderJobParams,
        cancel: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> Result<TrackingOutcome, ApiError> {
        sink.publish(Event::progress(ProgressEvent::status(
            0,
            0,
            "Fetching orderId list from Google Sheet...",
            true,
        )));
        info!("📋 正在读取表格 {} / {}", params.sheet, params.sheet_name);

        let order_ids = self
            .sheets
            .get_order_ids(&params.sheet, &params.sheet_name)
            .await?;
        let total = order_ids.len();

        info!("✓ 找到 {} 个订单", total);
        sink.publish(Event::progress(ProgressEvent::status(
            0,
            total,
            format!("Crawling tracking number for {} orderId...", total),
            true,
        )));

        for (i, order_id) in order_ids.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!("任务已被用户停止，剩余 {} 个订单未处理", total - i);
                sink.publish(Event::progress(ProgressEvent::status(
                    i,
                    total,
                    "Task stopped by user",
                    false,
                )));
                return Ok(TrackingOutcome::Stopped { processed: i });
            }

            let index = i + 1;
            info!("\n[订单 {}/{}] {}", index, total, "─".repeat(30));
            sink.publish(Event::progress(ProgressEvent::status(
                index,
                total,
                format!("({}/{}) Getting tracking for orderId: {}", index, total, order_id),
                true,
            )));

            let record = self.lookup(order_id, index, total).await;
            let update = record.to_update();
            sink.publish(Event::TrackingStatus {
                data: update.clone(),
            });

            sink.publish(Event::progress(ProgressEvent::status(
                index,
                total,
                format!("Updating tracking for orderId: {}...", order_id),
                true,
            )));
            let status_text = match self
                .sheets
                .update_record(&params.sheet, &params.sheet_name, &update)
                .await
            {
                Ok(()) => {
                    info!("[订单 {}/{}] ✓ 已回写表格", index, total);
                    format!("Updated tracking for orderId: {}", order_id)
                }
                Err(e) => {
                    warn!("[订单 {}/{}] ⚠️ 回写表格失败: {}", index, total, e);
                    format!("Error updating orderId: {}", order_id)
                }
            };
            sink.publish(Event::progress(ProgressEvent::status(
                index, total, status_text, true,
            )));
        }

        info!("✅ 全部 {} 个订单处理完成", total);
        sink.publish(Event::progress(ProgressEvent::status(
            total,
            total,
            "All tracking numbers updated!",
            false,
        )));
        Ok(TrackingOutcome::Completed { processed: total })
    }

    /// 查询单个订单的运单号和物流状态
    async fn lookup(&self, order_id: &str, index: usize, total: usize) -> TrackingRecord {
        let tracking_number = self.tracking_number(order_id).await;
        match &tracking_number {
            Lookup::Found(number) => info!("[订单 {}/{}] 运单号: {}", index, total, number),
            other => warn!("[订单 {}/{}] ⚠️ 未取到运单号: {:?}", index, total, other),
        }

        let tracking_status = match tracking_number.found() {
            Some(number) => {
                let status = self.delivery_status(number).await;
                if let Lookup::Found(text) = &status {
                    info!("[订单 {}/{}] 物流状态: {}", index, total, truncate_text(text, 60));
                } else {
                    warn!("[订单 {}/{}] ⚠️ 物流状态: {:?}", index, total, status);
                }
                Some(status)
            }
            None => None,
        };

        TrackingRecord {
            order_id: order_id.to_string(),
            tracking_number,
            tracking_status,
        }
    }

    async fn tracking_number(&self, order_id: &str) -> Lookup {
        let executor = &self.executor;
        let selector = self.pages.tracking_number_selector.as_str();

        let result = self
            .tabs
            .with_tab(
                &self.pages.tracking_url(order_id),
                self.pages.tracking_settle,
                move |tab| async move { executor.extract_text(&tab, selector).await },
            )
            .await;

        match result {
            Ok(Ok(Some(number))) => Lookup::Found(number),
            Ok(Ok(None)) => Lookup::NotFound,
            Ok(Err(e)) => Lookup::Faulted(e.to_string()),
            Err(e) => Lookup::Faulted(e.to_string()),
        }
    }

    /// 状态节点为空时再看限流提示节点
    async fn delivery_status(&self, tracking_number: &str) -> Lookup {
        let executor = &self.executor;
        let pages = &self.pages;

        let result = self
            .tabs
            .with_tab(
                &pages.status_url(tracking_number),
                pages.status_settle,
                move |tab| async move {
                    if let Some(status) = executor.extract_text(&tab, &pages.status_selector).await? {
                        return Ok::<_, ExecutionError>(Lookup::Found(status));
                    }
                    let warning = executor
                        .extract_text(&tab, &pages.rate_limit_selector)
                        .await?;
                    Ok::<_, ExecutionError>(match warning {
                        Some(text) if text.contains(&pages.rate_limit_marker) => Lookup::RateLimited,
                        _ => Lookup::NotFound,
                    })
                },
            )
            .await;

        match result {
            Ok(Ok(lookup)) => lookup,
            Ok(Err(e)) => Lookup::Faulted(e.to_string()),
            Err(e) => Lookup::Faulted(e.to_string()),
        }
    }
}
