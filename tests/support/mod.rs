//! 测试用的脚本化驱动与表格

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, Notify};

use order_tracking_sync::config::Config;
use order_tracking_sync::error::{ApiError, BrowserError, ExecutionError};
use order_tracking_sync::infrastructure::{ActionOutput, BrowserDriver, PageAction};
use order_tracking_sync::models::{Event, SheetRef, TabId, TrackingUpdate};

pub const TRACKING_SELECTOR: &str = "#tracking-number";
pub const STATUS_SELECTOR: &str = "#delivery-status";
pub const RATE_LIMIT_SELECTOR: &str = "#warning";

/// 所有等待时间为零的配置
pub fn fast_config() -> Config {
    Config {
        pagination_settle_ms: 0,
        tracking_settle_ms: 0,
        status_settle_ms: 0,
        action_timeout_ms: 1_000,
        tracking_url_template: "https://track.test/order?id={orderId}".to_string(),
        status_url_template: "https://status.test/mail?no={trackingNumber}".to_string(),
        tracking_number_selector: TRACKING_SELECTOR.to_string(),
        status_selector: STATUS_SELECTOR.to_string(),
        rate_limit_selector: RATE_LIMIT_SELECTOR.to_string(),
        export_dir: None,
        ..Config::default()
    }
}

/// 页面动作的故障注入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionFault {
    /// 动作执行中 panic
    Panic,
    /// 动作一直不返回
    Hang,
}

type TextFn = dyn Fn(&str, &str) -> Result<Option<String>, String> + Send + Sync;

/// 按脚本返回结果的浏览器驱动
pub struct FakeDriver {
    pages: Mutex<VecDeque<Result<Vec<String>, String>>>,
    next: Mutex<VecDeque<bool>>,
    next_when_exhausted: bool,
    text: Box<TextFn>,
    fault: Option<ActionFault>,
    tabs: Mutex<HashMap<TabId, String>>,
    opened: Mutex<Vec<String>>,
    closed: Mutex<Vec<TabId>>,
    seq: AtomicUsize,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(VecDeque::new()),
            next: Mutex::new(VecDeque::new()),
            next_when_exhausted: false,
            text: Box::new(|_, _| Ok(None)),
            fault: None,
            tabs: Mutex::new(HashMap::new()),
            opened: Mutex::new(Vec::new()),
            closed: Mutex::new(Vec::new()),
            seq: AtomicUsize::new(0),
        }
    }

    /// 每次提取依次返回的商品 ID；`Err` 表示页面脚本出错
    pub fn with_pages(mut self, pages: Vec<Result<Vec<&str>, &str>>) -> Self {
        self.pages = Mutex::new(
            pages
                .into_iter()
                .map(|page| {
                    page.map(|ids| ids.into_iter().map(String::from).collect())
                        .map_err(String::from)
                })
                .collect(),
        );
        self
    }

    /// 每次点击下一页依次返回的结果，用完后返回 `when_exhausted`
    pub fn with_next(mut self, results: Vec<bool>, when_exhausted: bool) -> Self {
        self.next = Mutex::new(results.into());
        self.next_when_exhausted = when_exhausted;
        self
    }

    /// 文本提取，参数为 (标签页地址, 选择器)
    pub fn with_text<F>(mut self, text: F) -> Self
    where
        F: Fn(&str, &str) -> Result<Option<String>, String> + Send + Sync + 'static,
    {
        self.text = Box::new(text);
        self
    }

    /// 让之后的每个页面动作都出故障
    pub fn with_fault(mut self, fault: ActionFault) -> Self {
        self.fault = Some(fault);
        self
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    pub fn closed(&self) -> Vec<TabId> {
        self.closed.lock().unwrap().clone()
    }

    pub fn open_tabs(&self) -> usize {
        self.tabs.lock().unwrap().len()
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    async fn open_tab(&self, url: &str) -> Result<TabId, BrowserError> {
        let tab = TabId::new(format!("tab-{}", self.seq.fetch_add(1, Ordering::SeqCst)));
        self.tabs.lock().unwrap().insert(tab.clone(), url.to_string());
        self.opened.lock().unwrap().push(url.to_string());
        Ok(tab)
    }

    async fn close_tab(&self, tab: &TabId) -> Result<(), BrowserError> {
        self.tabs.lock().unwrap().remove(tab);
        self.closed.lock().unwrap().push(tab.clone());
        Ok(())
    }

    async fn run_action(
        &self,
        tab: &TabId,
        action: &PageAction,
    ) -> Result<ActionOutput, ExecutionError> {
        match self.fault {
            Some(ActionFault::Panic) => panic!("driver exploded on {:?}", action),
            Some(ActionFault::Hang) => tokio::time::sleep(Duration::from_secs(3_600)).await,
            None => {}
        }

        match action {
            PageAction::ClickNext => {
                let next = self.next.lock().unwrap().pop_front();
                Ok(ActionOutput::Clicked(
                    next.unwrap_or(self.next_when_exhausted),
                ))
            }
            PageAction::ExtractItemIds => match self.pages.lock().unwrap().pop_front() {
                Some(Ok(ids)) => Ok(ActionOutput::ItemIds(ids)),
                Some(Err(e)) => Err(ExecutionError::Script(e)),
                None => Ok(ActionOutput::ItemIds(Vec::new())),
            },
            PageAction::ExtractText { selector } => {
                let url = self
                    .tabs
                    .lock()
                    .unwrap()
                    .get(tab)
                    .cloned()
                    .ok_or_else(|| BrowserError::TabNotFound(tab.to_string()))?;
                (self.text)(&url, selector)
                    .map(ActionOutput::Text)
                    .map_err(ExecutionError::Script)
            }
        }
    }
}

/// 在指定订单的回写处暂停，直到测试放行
pub struct Gate {
    pub order_id: String,
    pub reached: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl Gate {
    pub fn new(order_id: &str) -> Self {
        Self {
            order_id: order_id.to_string(),
            reached: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }
}

/// 内存中的表格
pub struct FakeSheet {
    orders: Vec<String>,
    failing_updates: HashSet<String>,
    gate: Option<Gate>,
    panic_on_read: bool,
    updates: Mutex<Vec<TrackingUpdate>>,
    reads: AtomicUsize,
}

impl FakeSheet {
    pub fn new(orders: &[&str]) -> Self {
        Self {
            orders: orders.iter().map(|s| s.to_string()).collect(),
            failing_updates: HashSet::new(),
            gate: None,
            panic_on_read: false,
            updates: Mutex::new(Vec::new()),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn failing_update(mut self, order_id: &str) -> Self {
        self.failing_updates.insert(order_id.to_string());
        self
    }

    pub fn with_gate(mut self, gate: Gate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// 第一次读取订单号时 panic
    pub fn panicking_read(mut self) -> Self {
        self.panic_on_read = true;
        self
    }

    pub fn updates(&self) -> Vec<TrackingUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn updated_orders(&self) -> Vec<String> {
        self.updates().into_iter().map(|u| u.order_id).collect()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl order_tracking_sync::SheetApi for FakeSheet {
    async fn get_order_ids(
        &self,
        _sheet: &SheetRef,
        _sheet_name: &str,
    ) -> Result<Vec<String>, ApiError> {
        let reads = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if self.panic_on_read && reads == 1 {
            panic!("sheet exploded");
        }
        if self.orders.is_empty() {
            return Err(ApiError::EmptyOrderList);
        }
        Ok(self.orders.clone())
    }

    async fn update_record(
        &self,
        _sheet: &SheetRef,
        _sheet_name: &str,
        update: &TrackingUpdate,
    ) -> Result<(), ApiError> {
        if let Some(gate) = &self.gate {
            if gate.order_id == update.order_id {
                gate.reached.notify_one();
                gate.release.notified().await;
            }
        }

        self.updates.lock().unwrap().push(update.clone());
        if self.failing_updates.contains(&update.order_id) {
            return Err(ApiError::BadStatus {
                endpoint: "update".to_string(),
                status: 500,
            });
        }
        Ok(())
    }
}

/// 收集事件直到满足条件（含该事件）
pub async fn collect_until<F>(rx: &mut broadcast::Receiver<Event>, done: F) -> Vec<Event>
where
    F: Fn(&Event) -> bool,
{
    let mut events = Vec::new();
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            let finished = done(&event);
            events.push(event);
            if finished {
                break;
            }
        }
    })
    .await
    .expect("timed out waiting for event");
    events
}

/// 带状态文本的进度事件
pub fn status_text(event: &Event) -> Option<&str> {
    match event {
        Event::UpdateStatus { data } => data.status_text.as_deref(),
        _ => None,
    }
}

pub fn is_status(event: &Event, text: &str) -> bool {
    status_text(event) == Some(text)
}
