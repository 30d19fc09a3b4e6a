mod support;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use order_tracking_sync::config::Config;
use order_tracking_sync::models::{
    Ack, Command, CommandResponse, Event, JobKind, JobState, TabId,
};
use order_tracking_sync::JobController;

use support::{
    collect_until, fast_config, is_status, FakeDriver, FakeSheet, Gate, STATUS_SELECTOR,
    TRACKING_SELECTOR,
};

fn happy_driver() -> FakeDriver {
    FakeDriver::new().with_text(|_, selector| {
        Ok(match selector {
            TRACKING_SELECTOR => Some("TN-1".to_string()),
            STATUS_SELECTOR => Some("Delivered".to_string()),
            _ => None,
        })
    })
}

fn controller(driver: FakeDriver, sheet: Arc<FakeSheet>, config: &Config) -> JobController {
    JobController::new(Arc::new(driver), sheet, config)
}

fn start_tracking(force_reset: bool) -> Command {
    Command::StartFetchTracking {
        sheet_id: "https://docs.google.com/spreadsheets/d/abc-123/edit#gid=0".to_string(),
        sheet_name: None,
        tab_id: Some(TabId::new("7")),
        force_reset,
    }
}

async fn wait_until_settled(controller: &JobController, kind: JobKind) -> JobState {
    for _ in 0..200 {
        let state = controller.job_state(kind);
        if !state.is_running() {
            return state;
        }
        sleep(Duration::from_millis(5)).await;
    }
    panic!("{} job never left Running", kind);
}

#[tokio::test]
async fn second_start_is_rejected_while_running() {
    let gate = Gate::new("1");
    let (reached, release) = (gate.reached.clone(), gate.release.clone());
    let sheet = Arc::new(FakeSheet::new(&["1", "2"]).with_gate(gate));
    let controller = controller(happy_driver(), sheet.clone(), &fast_config());
    let mut rx = controller.subscribe();

    assert!(controller.handle(start_tracking(false)).is_success());
    reached.notified().await;

    let response = controller.handle(start_tracking(false));
    assert_eq!(
        response,
        CommandResponse::Ack(Ack::rejected("Task already running"))
    );
    assert_eq!(controller.job_state(JobKind::OrderTracking), JobState::Running);

    release.notify_one();
    let events = collect_until(&mut rx, |e| is_status(e, "All tracking numbers updated!")).await;

    // 被拒绝的请求只会重发一次快照，进度不受影响
    assert_eq!(
        events
            .iter()
            .filter(|e| is_status(e, "Started tracking..."))
            .count(),
        1
    );
    assert_eq!(sheet.reads(), 1);
    assert_eq!(sheet.updated_orders(), vec!["1", "2"]);
    assert_eq!(
        wait_until_settled(&controller, JobKind::OrderTracking).await,
        JobState::Completed
    );
}

#[tokio::test]
async fn stop_mid_loop_skips_the_remaining_orders() {
    let gate = Gate::new("2");
    let (reached, release) = (gate.reached.clone(), gate.release.clone());
    let sheet = Arc::new(FakeSheet::new(&["1", "2", "3", "4", "5"]).with_gate(gate));
    let driver = Arc::new(happy_driver());
    let controller = JobController::new(driver.clone(), sheet.clone(), &fast_config());
    let mut rx = controller.subscribe();

    controller.handle(start_tracking(false));
    reached.notified().await;

    assert!(controller.handle(Command::StopFetchTracking).is_success());
    assert_eq!(
        controller.job_state(JobKind::OrderTracking),
        JobState::StoppedByUser
    );
    assert!(!controller.current_status().is_task_running);

    release.notify_one();
    let events = collect_until(&mut rx, |e| is_status(e, "Task stopped by user")).await;

    assert!(events.iter().any(|e| is_status(e, "Stopped by user.")));
    assert_eq!(sheet.updated_orders(), vec!["1", "2"]);
    assert!(!driver.opened().iter().any(|url| url.ends_with("id=3")));

    let status = controller.current_status();
    assert!(!status.is_task_running);
    assert_eq!(status.status.as_deref(), Some("Task stopped by user"));
    assert_eq!(
        wait_until_settled(&controller, JobKind::OrderTracking).await,
        JobState::StoppedByUser
    );
}

#[tokio::test]
async fn force_reset_discards_the_old_session() {
    let gate = Gate::new("1");
    let (reached, release) = (gate.reached.clone(), gate.release.clone());
    let sheet = Arc::new(FakeSheet::new(&["1", "2"]).with_gate(gate));
    let controller = controller(happy_driver(), sheet.clone(), &fast_config());
    let mut rx = controller.subscribe();

    controller.handle(start_tracking(false));
    reached.notified().await;

    assert!(controller.handle(start_tracking(true)).is_success());
    reached.notified().await;

    // 新旧两个会话都停在订单 1 的回写上
    release.notify_waiters();
    let events = collect_until(&mut rx, |e| is_status(e, "All tracking numbers updated!")).await;
    sleep(Duration::from_millis(50)).await;

    let mut late = Vec::new();
    while let Ok(event) = rx.try_recv() {
        late.push(event);
    }
    assert!(!events
        .iter()
        .chain(late.iter())
        .any(|e| is_status(e, "Task stopped by user")));

    assert_eq!(sheet.reads(), 2);
    let mut updated = sheet.updated_orders();
    updated.sort();
    assert_eq!(updated, vec!["1", "1", "2"]);
    assert_eq!(
        wait_until_settled(&controller, JobKind::OrderTracking).await,
        JobState::Completed
    );
}

#[tokio::test]
async fn rerun_interval_is_clamped() {
    let sheet = Arc::new(FakeSheet::new(&["1"]));
    let controller = controller(happy_driver(), sheet, &fast_config());

    controller.handle(Command::SetAutoRerunInterval {
        interval_seconds: 3,
    });
    assert_eq!(controller.auto_rerun().interval_seconds(), 5);

    controller.handle(Command::SetAutoRerunInterval {
        interval_seconds: 9000,
    });
    assert_eq!(controller.auto_rerun().interval_seconds(), 3600);
    assert!(!controller.auto_rerun().enabled);

    controller.handle(Command::SetAutoRerun {
        enabled: true,
        interval_seconds: Some(-20),
    });
    assert!(controller.auto_rerun().enabled);
    assert_eq!(controller.auto_rerun().interval_seconds(), 5);

    controller.shutdown();
}

#[tokio::test(start_paused = true)]
async fn auto_rerun_restarts_the_last_job_when_idle() {
    let sheet = Arc::new(FakeSheet::new(&["1"]));
    let controller = controller(happy_driver(), sheet.clone(), &fast_config());
    let mut rx = controller.subscribe();

    controller.handle(start_tracking(false));
    collect_until(&mut rx, |e| is_status(e, "All tracking numbers updated!")).await;
    wait_until_settled(&controller, JobKind::OrderTracking).await;
    assert_eq!(sheet.reads(), 1);

    let armed = Instant::now();
    controller.handle(Command::SetAutoRerun {
        enabled: true,
        interval_seconds: Some(5),
    });

    collect_until(&mut rx, |e| is_status(e, "Started tracking...")).await;
    assert!(armed.elapsed() >= Duration::from_secs(5));
    collect_until(&mut rx, |e| is_status(e, "All tracking numbers updated!")).await;
    assert_eq!(sheet.reads(), 2);

    controller.handle(Command::SetAutoRerun {
        enabled: false,
        interval_seconds: None,
    });
    sleep(Duration::from_secs(30)).await;
    assert_eq!(sheet.reads(), 2);
    assert_eq!(controller.auto_rerun().interval_seconds(), 5);
}

#[tokio::test(start_paused = true)]
async fn changing_the_interval_restarts_the_countdown() {
    let sheet = Arc::new(FakeSheet::new(&["1"]));
    let controller = controller(happy_driver(), sheet.clone(), &fast_config());
    let mut rx = controller.subscribe();

    controller.handle(start_tracking(false));
    collect_until(&mut rx, |e| is_status(e, "All tracking numbers updated!")).await;
    wait_until_settled(&controller, JobKind::OrderTracking).await;

    controller.handle(Command::SetAutoRerun {
        enabled: true,
        interval_seconds: Some(5),
    });
    sleep(Duration::from_secs(3)).await;

    let rearmed = Instant::now();
    controller.handle(Command::SetAutoRerunInterval {
        interval_seconds: 20,
    });

    // 旧的 5 秒周期已作废
    sleep(Duration::from_secs(4)).await;
    assert_eq!(sheet.reads(), 1);

    collect_until(&mut rx, |e| is_status(e, "Started tracking...")).await;
    assert!(rearmed.elapsed() >= Duration::from_secs(20));
    assert!(rearmed.elapsed() < Duration::from_secs(21));
    collect_until(&mut rx, |e| is_status(e, "All tracking numbers updated!")).await;
    assert_eq!(sheet.reads(), 2);

    sleep_until_offset(rearmed, 39).await;
    assert_eq!(sheet.reads(), 2);
    sleep_until_offset(rearmed, 41).await;
    assert_eq!(sheet.reads(), 3);

    controller.shutdown();
}

async fn sleep_until_offset(start: Instant, seconds: u64) {
    tokio::time::sleep_until(start + Duration::from_secs(seconds)).await;
}

#[tokio::test]
async fn panicking_session_is_failed_and_frees_the_slot() {
    let sheet = Arc::new(FakeSheet::new(&["1"]).panicking_read());
    let controller = controller(happy_driver(), sheet.clone(), &fast_config());
    let mut rx = controller.subscribe();

    assert!(controller.handle(start_tracking(false)).is_success());
    let events = collect_until(&mut rx, |e| is_status(e, "Error: sheet exploded")).await;

    assert!(events.contains(&Event::crawl_error("sheet exploded")));
    assert_eq!(
        wait_until_settled(&controller, JobKind::OrderTracking).await,
        JobState::Failed
    );
    assert!(!controller.current_status().is_task_running);

    // 槽位已释放，可以再次启动
    assert!(controller.handle(start_tracking(false)).is_success());
    collect_until(&mut rx, |e| is_status(e, "All tracking numbers updated!")).await;
    assert_eq!(sheet.reads(), 2);
    assert_eq!(sheet.updated_orders(), vec!["1"]);
    assert_eq!(
        wait_until_settled(&controller, JobKind::OrderTracking).await,
        JobState::Completed
    );
}

#[tokio::test(start_paused = true)]
async fn auto_rerun_waits_for_a_first_manual_run() {
    let sheet = Arc::new(FakeSheet::new(&["1"]));
    let controller = controller(happy_driver(), sheet.clone(), &fast_config());

    controller.handle(Command::SetAutoRerun {
        enabled: true,
        interval_seconds: Some(5),
    });
    sleep(Duration::from_secs(17)).await;

    assert_eq!(sheet.reads(), 0);
    assert_eq!(controller.job_state(JobKind::OrderTracking), JobState::Idle);
    controller.shutdown();
}

#[tokio::test(start_paused = true)]
async fn crawl_is_single_flight_and_stoppable() {
    let config = Config {
        pagination_settle_ms: 1_000,
        ..fast_config()
    };
    let driver = FakeDriver::new()
        .with_pages(vec![Ok(vec!["1"]), Ok(vec!["2"])])
        .with_next(vec![], true);
    let controller = controller(driver, Arc::new(FakeSheet::new(&[])), &config);
    let mut rx = controller.subscribe();

    let tab = TabId::new("42");
    assert!(controller.start_crawl(tab.clone(), false).success);
    assert_eq!(
        controller.start_crawl(tab, false),
        Ack::rejected("Crawling already in progress")
    );
    assert!(controller.current_status().is_crawling);

    controller.handle(Command::StopCrawl);
    assert_eq!(
        controller.job_state(JobKind::Pagination),
        JobState::StoppedByUser
    );
    sleep(Duration::from_secs(10)).await;

    while let Ok(event) = rx.try_recv() {
        assert!(!matches!(event, Event::CrawlComplete { .. }));
    }
    assert!(!controller.current_status().is_crawling);

    controller.handle(Command::ResetCrawlState);
    assert_eq!(controller.job_state(JobKind::Pagination), JobState::Idle);
}

#[tokio::test]
async fn finished_crawl_exports_sorted_ids() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        export_dir: Some(dir.path().display().to_string()),
        ..fast_config()
    };
    let driver = FakeDriver::new()
        .with_pages(vec![Ok(vec!["30", "10"]), Ok(vec!["20", "10"])])
        .with_next(vec![true, false], false);
    let controller = controller(driver, Arc::new(FakeSheet::new(&[])), &config);
    let mut rx = controller.subscribe();

    controller.handle(Command::StartCrawl {
        tab_id: TabId::new("42"),
        force_reset: false,
    });
    let events = collect_until(&mut rx, |e| {
        matches!(e, Event::ExportComplete { .. } | Event::ExportError { .. })
    })
    .await;

    let summary = match events.last() {
        Some(Event::ExportComplete { data }) => data.clone(),
        other => panic!("export did not complete: {:?}", other),
    };
    assert_eq!(summary.total_items, 3);
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::CrawlComplete { data } if data.total_items == 3)));

    let content = std::fs::read_to_string(dir.path().join(&summary.file_name)).unwrap();
    assert_eq!(content, "10\n20\n30\n");
    assert_eq!(
        wait_until_settled(&controller, JobKind::Pagination).await,
        JobState::Completed
    );
}

#[tokio::test]
async fn status_query_reflects_live_flags() {
    let sheet = Arc::new(FakeSheet::new(&["1"]));
    let controller = controller(happy_driver(), sheet, &fast_config());

    match controller.handle(Command::GetCurrentStatus) {
        CommandResponse::Status(snapshot) => {
            assert!(!snapshot.is_task_running);
            assert!(!snapshot.is_crawling);
            assert_eq!(snapshot.status, None);
        }
        other => panic!("unexpected response {:?}", other),
    }
}
