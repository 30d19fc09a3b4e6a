//! 广播事件与状态快照

use serde::{Deserialize, Serialize};

use crate::models::tracking::TrackingUpdate;

/// 进度事件
///
/// 分页任务只带页码和数量；订单任务额外带状态文本和运行标记
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(rename = "currentPage")]
    pub current_index: usize,
    #[serde(rename = "totalItems")]
    pub total_count: usize,
    #[serde(rename = "status", default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(rename = "isTaskRunning", default, skip_serializing_if = "Option::is_none")]
    pub is_running: Option<bool>,
}

impl ProgressEvent {
    /// 分页进度
    pub fn page(current_page: usize, total_items: usize) -> Self {
        Self {
            current_index: current_page,
            total_count: total_items,
            status_text: None,
            is_running: None,
        }
    }

    /// 带状态文本的进度
    pub fn status(
        current_index: usize,
        total_count: usize,
        text: impl Into<String>,
        is_running: bool,
    ) -> Self {
        Self {
            current_index,
            total_count,
            status_text: Some(text.into()),
            is_running: Some(is_running),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlSummary {
    pub total_items: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub total_items: usize,
    pub file_name: String,
}

/// 广播给观察者的事件，不需要回执
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    UpdateStatus { data: ProgressEvent },
    CrawlComplete { data: CrawlSummary },
    CrawlError { error: String },
    ExportComplete { data: ExportSummary },
    ExportError { error: String },
    TrackingStatus { data: TrackingUpdate },
}

impl Event {
    pub fn progress(data: ProgressEvent) -> Self {
        Event::UpdateStatus { data }
    }

    pub fn crawl_error(error: impl Into<String>) -> Self {
        Event::CrawlError {
            error: error.into(),
        }
    }
}

/// `GET_CURRENT_STATUS` 返回的快照
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub current_page: usize,
    pub total_items: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub is_task_running: bool,
    pub is_crawling: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl StatusSnapshot {
    /// 合并一条订单进度，未携带的字段沿用旧值
    pub fn merge(&mut self, progress: &ProgressEvent) {
        self.current_page = progress.current_index;
        self.total_items = progress.total_count;
        if let Some(text) = &progress.status_text {
            self.status = Some(text.clone());
        }
        if let Some(running) = progress.is_running {
            self.is_task_running = running;
        }
        self.updated_at = Some(chrono::Local::now().to_rfc3339());
    }
}
