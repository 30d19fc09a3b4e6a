/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use tracing::info;

use crate::config::Config;
use crate::models::{JobKind, JobState};

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!(
        "🚀 程序启动 - {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("🌐 浏览器模式: {:?} (端口 {})", config.browser_mode, config.browser_debug_port);
    info!("📊 表格 API: {}", config.sheet_api_base_url);
    info!("{}", "=".repeat(60));
}

/// 记录任务结束信息
pub fn log_job_finished(kind: JobKind, state: JobState) {
    info!("\n{}", "─".repeat(60));
    info!("🏁 {} 任务结束: {:?}", kind, state);
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
