use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use order_tracking_sync::browser::{connect_to_browser, launch_headless_browser};
use order_tracking_sync::config::BrowserMode;
use order_tracking_sync::models::Ack;
use order_tracking_sync::services::{PreferenceStore, Preferences};
use order_tracking_sync::utils::{logger, logging};
use order_tracking_sync::{
    ChromeDriver, Command, CommandResponse, Config, JobController, SheetClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load().context("加载配置失败")?;

    // 初始化日志
    logger::init(config.verbose_logging);
    logging::log_startup(&config);

    // 连接或启动浏览器
    let browser = match config.browser_mode {
        BrowserMode::Connect => connect_to_browser(config.browser_debug_port).await?,
        BrowserMode::Headless => {
            launch_headless_browser(config.chrome_executable.as_deref()).await?
        }
    };

    let driver = Arc::new(ChromeDriver::new(browser));
    let sheets = Arc::new(SheetClient::new(&config));
    let controller = JobController::new(driver, sheets, &config);

    // 恢复自动重跑偏好
    let preferences = PreferenceStore::new(&config.preferences_file);
    match preferences.load().await {
        Ok(prefs) => {
            controller.handle(Command::SetAutoRerun {
                enabled: prefs.auto_rerun_enabled,
                interval_seconds: Some(prefs.auto_rerun_interval),
            });
        }
        Err(e) => warn!("⚠️ 读取偏好失败，使用默认值: {}", e),
    }

    let printer = spawn_event_printer(&controller);

    info!("✅ 就绪，等待命令（每行一个 JSON）");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Command>(line) {
            Ok(command) => {
                let persists = matches!(
                    command,
                    Command::SetAutoRerun { .. } | Command::SetAutoRerunInterval { .. }
                );
                let response = controller.handle(command);
                if persists && response.is_success() {
                    let prefs = Preferences::from(controller.auto_rerun());
                    if let Err(e) = preferences.save(&prefs).await {
                        warn!("⚠️ 保存偏好失败: {}", e);
                    }
                }
                response
            }
            Err(e) => {
                warn!("无法解析命令: {}", e);
                CommandResponse::from(Ack::rejected(format!("Invalid command: {}", e)))
            }
        };
        emit(&response);
    }

    info!("输入已关闭，正在退出");
    controller.shutdown();
    printer.abort();
    Ok(())
}

/// 把广播事件逐行写到 stdout
fn spawn_event_printer(controller: &JobController) -> tokio::task::JoinHandle<()> {
    let mut events = controller.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => emit(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("⚠️ 输出过慢，丢弃了 {} 条事件", skipped);
                }
                Err(RecvError::Closed) => {
                    debug!("事件通道已关闭");
                    break;
                }
            }
        }
    })
}

fn emit<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{}", line),
        Err(e) => error!("序列化输出失败: {}", e),
    }
}
