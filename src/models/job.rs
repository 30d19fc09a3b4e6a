//! 任务相关的数据模型

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::models::sheet::SheetRef;

/// 浏览器标签页标识
///
/// 命令里既可能是数字也可能是 CDP target id 字符串，统一存为字符串
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TabId(pub String);

impl TabId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TabId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => TabId(s),
            Raw::Number(n) => TabId(n.to_string()),
        })
    }
}

/// 任务类型，每种类型各自单飞
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    Pagination,
    OrderTracking,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Pagination => write!(f, "pagination"),
            JobKind::OrderTracking => write!(f, "order-tracking"),
        }
    }
}

/// 任务状态
///
/// 除 `Running` 外的状态都允许重新启动
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JobState {
    #[default]
    Idle,
    Running,
    StoppedByUser,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_running(self) -> bool {
        self == JobState::Running
    }
}

/// 订单跟踪任务参数，启动时原样记录，供自动重跑复用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderJobParams {
    pub sheet: SheetRef,
    pub sheet_name: String,
    pub origin_tab: Option<TabId>,
}

pub const MIN_RERUN_INTERVAL_SECS: u64 = 5;
pub const MAX_RERUN_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_RERUN_INTERVAL_SECS: u64 = 60;

/// 自动重跑配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoRerunConfig {
    pub enabled: bool,
    interval_seconds: u64,
}

impl AutoRerunConfig {
    /// 间隔在构造时即被夹到 [5, 3600]
    pub fn new(enabled: bool, interval_seconds: i64) -> Self {
        Self {
            enabled,
            interval_seconds: Self::clamp_interval(interval_seconds),
        }
    }

    pub fn clamp_interval(seconds: i64) -> u64 {
        seconds.clamp(MIN_RERUN_INTERVAL_SECS as i64, MAX_RERUN_INTERVAL_SECS as i64) as u64
    }

    pub fn interval_seconds(&self) -> u64 {
        self.interval_seconds
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn with_interval(self, interval_seconds: i64) -> Self {
        Self::new(self.enabled, interval_seconds)
    }
}

impl Default for AutoRerunConfig {
    fn default() -> Self {
        Self::new(false, DEFAULT_RERUN_INTERVAL_SECS as i64)
    }
}
