//! 自动重跑定时器

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// 周期定时器，丢弃即取消
pub struct RerunTimer {
    period: Duration,
    handle: JoinHandle<()>,
}

impl RerunTimer {
    /// 启动定时器，首次触发在一个周期之后
    ///
    /// `on_tick` 返回 `false` 时定时器退出
    pub fn arm<F>(period: Duration, on_tick: F) -> Self
    where
        F: Fn() -> bool + Send + 'static,
    {
        debug!("⏰ 自动重跑定时器已启动，间隔 {:?}", period);
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !on_tick() {
                    break;
                }
            }
        });

        Self { period, handle }
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for RerunTimer {
    fn drop(&mut self) {
        debug!("⏰ 自动重跑定时器已取消 (间隔 {:?})", self.period);
        self.handle.abort();
    }
}
