//! 任务控制器 - 编排层
//!
//! ## 职责
//!
//! 1. **单飞控制**：每种任务同一时刻最多一个在跑
//! 2. **命令分发**：start / stop / reset / status / auto-rerun
//! 3. **事件广播**：把流程层的进度转发给所有观察者，不等待回执
//! 4. **自动重跑**：空闲时按固定间隔用上次的参数重启订单任务
//!
//! ## 会话代数
//!
//! 每次启动都会让对应任务的 generation 加一。被强制重启或停止后仍在
//! 收尾的旧会话，其事件和结束回调都会因为 generation 不匹配而被丢弃。
//!
//! ## 取消语义
//!
//! 取消是协作式的：只在分页循环顶部、订单循环的每个订单开始前检查。
//! 正在等待页面渲染或正在进行的 API 调用不会被打断，停止后可能还会
//! 多打开/关闭一次标签页或多调用一次 update 接口。
//!
//! 会话体内的 panic 会被捕获并按 `Failed` 收尾，槽位不会卡在 `Running`。

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::FutureExt;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::clients::SheetApi;
use crate::config::Config;
use crate::infrastructure::BrowserDriver;
use crate::models::{
    Ack, AutoRerunConfig, Command, CommandResponse, Event, JobKind, JobState, OrderJobParams,
    ProgressEvent, SheetRef, StatusSnapshot, TabId,
};
use crate::orchestrator::auto_rerun::RerunTimer;
use crate::services::page_executor::panic_message;
use crate::services::{IdExporter, PageActionExecutor, TabLifecycle};
use crate::utils::logging::log_job_finished;
use crate::workflow::{
    OrderTrackingPipeline, PaginationOutcome, PaginationWalker, ProgressSink, TrackingOutcome,
    TrackingPages,
};

/// 单种任务的单飞槽位
#[derive(Debug, Default)]
struct JobSlot {
    state: JobState,
    generation: u64,
    cancel: Option<CancellationToken>,
}

impl JobSlot {
    /// 开启新会话，旧会话（如有）被取消并作废
    fn begin(&mut self) -> (u64, CancellationToken) {
        if let Some(old) = self.cancel.take() {
            old.cancel();
        }
        self.generation += 1;
        self.state = JobState::Running;
        let token = CancellationToken::new();
        self.cancel = Some(token.clone());
        (self.generation, token)
    }

    /// 请求停止当前会话
    fn halt(&mut self, state: JobState) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        self.state = state;
    }
}

struct ControllerState {
    crawl: JobSlot,
    tracking: JobSlot,
    snapshot: StatusSnapshot,
    last_params: Option<OrderJobParams>,
    auto_rerun: AutoRerunConfig,
    rerun_timer: Option<RerunTimer>,
}

impl ControllerState {
    fn slot(&mut self, kind: JobKind) -> &mut JobSlot {
        match kind {
            JobKind::Pagination => &mut self.crawl,
            JobKind::OrderTracking => &mut self.tracking,
        }
    }

    fn merged_snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            is_task_running: self.tracking.state.is_running(),
            is_crawling: self.crawl.state.is_running(),
            ..self.snapshot.clone()
        }
    }
}

struct Inner {
    walker: PaginationWalker,
    pipeline: OrderTrackingPipeline,
    exporter: Option<IdExporter>,
    default_sheet_name: String,
    events: broadcast::Sender<Event>,
    state: Mutex<ControllerState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn broadcast(&self, event: Event) {
        // 没有观察者时发送失败，直接忽略
        let _ = self.events.send(event);
    }

    /// 会话结束回调，过期会话直接忽略
    fn finish(&self, kind: JobKind, generation: u64, terminal: JobState) {
        let mut state = self.lock();
        let slot = state.slot(kind);
        if slot.generation != generation {
            debug!("忽略过期 {} 会话 #{} 的结束回调", kind, generation);
            return;
        }
        if slot.state.is_running() {
            slot.state = terminal;
        }
        slot.cancel = None;
        let final_state = slot.state;
        if kind == JobKind::OrderTracking {
            state.snapshot.is_task_running = false;
        }
        drop(state);

        log_job_finished(kind, final_state);
    }
}

/// 会话内的进度上报器，带 generation 校验
struct SessionReporter {
    inner: Arc<Inner>,
    kind: JobKind,
    generation: u64,
}

impl SessionReporter {
    fn is_current(&self) -> bool {
        self.inner.lock().slot(self.kind).generation == self.generation
    }

    /// 会话 panic 时按失败收尾，观察者收到的与系统性错误相同
    fn report_panic(&self, panic: Box<dyn Any + Send>) -> JobState {
        let message = panic_message(panic);
        error!("❌ {} 会话 #{} panic: {}", self.kind, self.generation, message);

        self.publish(Event::crawl_error(message.clone()));
        if self.kind == JobKind::OrderTracking {
            self.publish(Event::progress(ProgressEvent::status(
                0,
                0,
                format!("Error: {}", message),
                false,
            )));
        }
        JobState::Failed
    }
}

impl ProgressSink for SessionReporter {
    fn publish(&self, event: Event) {
        let mut state = self.inner.lock();
        if state.slot(self.kind).generation != self.generation {
            debug!(
                "丢弃过期 {} 会话 #{} 的事件: {:?}",
                self.kind, self.generation, event
            );
            return;
        }
        if self.kind == JobKind::OrderTracking {
            if let Event::UpdateStatus { data } = &event {
                state.snapshot.merge(data);
            }
        }
        self.inner.broadcast(event);
    }
}

/// 任务控制器
///
/// 可廉价克隆，所有克隆共享同一份状态
#[derive(Clone)]
pub struct JobController {
    inner: Arc<Inner>,
}

impl JobController {
    pub fn new(driver: Arc<dyn BrowserDriver>, sheets: Arc<dyn SheetApi>, config: &Config) -> Self {
        let executor = PageActionExecutor::new(Arc::clone(&driver), config.action_timeout());
        let walker = PaginationWalker::new(executor.clone(), config.pagination_settle());
        let pipeline = OrderTrackingPipeline::new(
            sheets,
            TabLifecycle::new(driver),
            executor,
            TrackingPages::from(config),
        );
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        Self {
            inner: Arc::new(Inner {
                walker,
                pipeline,
                exporter: config.export_dir.as_deref().map(IdExporter::new),
                default_sheet_name: config.default_sheet_name.clone(),
                events,
                state: Mutex::new(ControllerState {
                    crawl: JobSlot::default(),
                    tracking: JobSlot::default(),
                    snapshot: StatusSnapshot::default(),
                    last_params: None,
                    auto_rerun: AutoRerunConfig::default(),
                    rerun_timer: None,
                }),
            }),
        }
    }

    /// 注册观察者；只能收到注册之后的事件
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.events.subscribe()
    }

    /// 分发一条命令
    pub fn handle(&self, command: Command) -> CommandResponse {
        debug!("收到命令: {:?}", command);
        match command {
            Command::StartCrawl {
                tab_id,
                force_reset,
            } => self.start_crawl(tab_id, force_reset).into(),
            Command::StopCrawl => self.stop_crawl().into(),
            Command::ResetCrawlState => self.reset_crawl_state().into(),
            Command::StartFetchTracking {
                sheet_id,
                sheet_name,
                tab_id,
                force_reset,
            } => {
                let params = OrderJobParams {
                    sheet: SheetRef::parse(&sheet_id),
                    sheet_name: sheet_name
                        .filter(|name| !name.trim().is_empty())
                        .unwrap_or_else(|| self.inner.default_sheet_name.clone()),
                    origin_tab: tab_id,
                };
                self.start_tracking(params, force_reset).into()
            }
            Command::StopFetchTracking => self.stop_tracking().into(),
            Command::GetCurrentStatus => CommandResponse::Status(self.current_status()),
            Command::SetAutoRerun {
                enabled,
                interval_seconds,
            } => self.set_auto_rerun(enabled, interval_seconds).into(),
            Command::SetAutoRerunInterval { interval_seconds } => {
                self.set_auto_rerun_interval(interval_seconds).into()
            }
        }
    }

    /// 在指定标签页上启动分页抓取
    pub fn start_crawl(&self, tab: TabId, force_reset: bool) -> Ack {
        let (generation, cancel) = {
            let mut state = self.inner.lock();
            if state.crawl.state.is_running() {
                if !force_reset {
                    return Ack::rejected("Crawling already in progress");
                }
                warn!("⚠️ 强制重置分页任务，旧会话 #{} 作废", state.crawl.generation);
            }
            state.crawl.begin()
        };
        info!("🔍 分页任务 #{} 开始，标签页 {}", generation, tab);

        let reporter = SessionReporter {
            inner: Arc::clone(&self.inner),
            kind: JobKind::Pagination,
            generation,
        };
        tokio::spawn(async move {
            let inner = Arc::clone(&reporter.inner);
            let session = async {
                let report = inner.walker.run(&tab, &cancel, &reporter).await;
                match &report.outcome {
                    PaginationOutcome::Completed | PaginationOutcome::PageLimitReached => {
                        if let Some(exporter) = &inner.exporter {
                            if reporter.is_current() {
                                let event = match exporter.export(&report.item_ids).await {
                                    Ok(summary) => Event::ExportComplete { data: summary },
                                    Err(e) => {
                                        warn!("导出商品 ID 失败: {}", e);
                                        Event::ExportError {
                                            error: e.to_string(),
                                        }
                                    }
                                };
                                reporter.publish(event);
                            }
                        }
                        JobState::Completed
                    }
                    PaginationOutcome::Failed(_) => JobState::Failed,
                    PaginationOutcome::Stopped => JobState::StoppedByUser,
                }
            };

            let terminal = match AssertUnwindSafe(session).catch_unwind().await {
                Ok(terminal) => terminal,
                Err(panic) => reporter.report_panic(panic),
            };
            inner.finish(JobKind::Pagination, generation, terminal);
        });

        Ack::ok()
    }

    pub fn stop_crawl(&self) -> Ack {
        let mut state = self.inner.lock();
        if state.crawl.state.is_running() {
            info!("⏹️ 停止分页任务 #{}", state.crawl.generation);
            state.crawl.halt(JobState::StoppedByUser);
        }
        Ack::ok()
    }

    pub fn reset_crawl_state(&self) -> Ack {
        let mut state = self.inner.lock();
        info!("🔄 重置分页任务状态");
        state.crawl.halt(JobState::Idle);
        Ack::ok()
    }

    /// 启动订单物流任务
    pub fn start_tracking(&self, params: OrderJobParams, force_reset: bool) -> Ack {
        let (generation, cancel) = {
            let mut state = self.inner.lock();
            if state.tracking.state.is_running() {
                if !force_reset {
                    let snapshot = state.merged_snapshot();
                    self.inner.broadcast(Event::progress(ProgressEvent::status(
                        snapshot.current_page,
                        snapshot.total_items,
                        snapshot.status.unwrap_or_default(),
                        true,
                    )));
                    return Ack::rejected("Task already running");
                }
                warn!("⚠️ 强制重置订单任务，旧会话 #{} 作废", state.tracking.generation);
            }

            let session = state.tracking.begin();
            state.last_params = Some(params.clone());
            let started = ProgressEvent::status(
                state.snapshot.current_page,
                state.snapshot.total_items,
                "Started tracking...",
                true,
            );
            state.snapshot.merge(&started);
            self.inner.broadcast(Event::progress(started));
            session
        };
        info!(
            "🚚 订单任务 #{} 开始: 表格 {} / {} (来源标签页 {:?})",
            generation, params.sheet, params.sheet_name, params.origin_tab
        );

        let reporter = SessionReporter {
            inner: Arc::clone(&self.inner),
            kind: JobKind::OrderTracking,
            generation,
        };
        tokio::spawn(async move {
            let inner = Arc::clone(&reporter.inner);
            let run = AssertUnwindSafe(inner.pipeline.run(&params, &cancel, &reporter));
            let terminal = match run.catch_unwind().await {
                Ok(TrackingOutcome::Completed { .. }) => JobState::Completed,
                Ok(TrackingOutcome::Stopped { .. }) => JobState::StoppedByUser,
                Ok(TrackingOutcome::Failed(_)) => JobState::Failed,
                Err(panic) => reporter.report_panic(panic),
            };
            inner.finish(JobKind::OrderTracking, generation, terminal);
        });

        Ack::ok()
    }

    pub fn stop_tracking(&self) -> Ack {
        let mut state = self.inner.lock();
        if state.tracking.state.is_running() {
            info!("⏹️ 停止订单任务 #{}", state.tracking.generation);
        }
        state.tracking.halt(JobState::StoppedByUser);

        let stopped = ProgressEvent::status(
            state.snapshot.current_page,
            state.snapshot.total_items,
            "Stopped by user.",
            false,
        );
        state.snapshot.merge(&stopped);
        self.inner.broadcast(Event::progress(stopped));
        Ack::ok()
    }

    /// 最近一次订单进度，合并实时的单飞标记
    pub fn current_status(&self) -> StatusSnapshot {
        self.inner.lock().merged_snapshot()
    }

    pub fn job_state(&self, kind: JobKind) -> JobState {
        self.inner.lock().slot(kind).state
    }

    pub fn auto_rerun(&self) -> AutoRerunConfig {
        self.inner.lock().auto_rerun
    }

    /// 开关自动重跑；关闭只取消定时器，不影响正在运行的任务
    pub fn set_auto_rerun(&self, enabled: bool, interval_seconds: Option<i64>) -> Ack {
        let mut state = self.inner.lock();
        let current = state.auto_rerun.interval_seconds() as i64;
        let config = AutoRerunConfig::new(enabled, interval_seconds.unwrap_or(current));
        info!(
            "⏰ 自动重跑: {} (间隔 {} 秒)",
            if enabled { "开启" } else { "关闭" },
            config.interval_seconds()
        );
        state.auto_rerun = config;
        drop(state.rerun_timer.take());
        if enabled {
            state.rerun_timer = Some(self.arm_timer(config));
        }
        Ack::ok()
    }

    /// 修改间隔；开启状态下在同一临界区内取消并重新启动定时器
    pub fn set_auto_rerun_interval(&self, interval_seconds: i64) -> Ack {
        let mut state = self.inner.lock();
        let config = state.auto_rerun.with_interval(interval_seconds);
        info!("⏰ 自动重跑间隔: {} 秒", config.interval_seconds());
        state.auto_rerun = config;
        if config.enabled {
            drop(state.rerun_timer.take());
            state.rerun_timer = Some(self.arm_timer(config));
        }
        Ack::ok()
    }

    fn arm_timer(&self, config: AutoRerunConfig) -> RerunTimer {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        RerunTimer::arm(config.period(), move || match weak.upgrade() {
            Some(inner) => {
                JobController { inner }.auto_rerun_tick();
                true
            }
            None => false,
        })
    }

    /// 定时器回调：开启、空闲且有历史参数时重启订单任务
    fn auto_rerun_tick(&self) {
        let params = {
            let state = self.inner.lock();
            if !state.auto_rerun.enabled || state.tracking.state.is_running() {
                return;
            }
            match &state.last_params {
                Some(params) => params.clone(),
                None => {
                    debug!("⏰ 尚无历史参数，跳过自动重跑");
                    return;
                }
            }
        };

        info!("⏰ 自动重跑订单任务: 表格 {}", params.sheet);
        let ack = self.start_tracking(params, false);
        if !ack.success {
            debug!("⏰ 自动重跑未启动: {:?}", ack.message);
        }
    }

    /// 取消定时器和所有在跑的会话
    pub fn shutdown(&self) {
        let mut state = self.inner.lock();
        state.rerun_timer = None;
        state.crawl.halt(JobState::Idle);
        state.tracking.halt(JobState::Idle);
        info!("控制器已关闭");
    }
}
