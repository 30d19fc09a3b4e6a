//! 命令与应答
//!
//! 线上格式为带 `type` 标签的 JSON，一行一条

use serde::{Deserialize, Serialize};

use crate::models::event::StatusSnapshot;
use crate::models::job::TabId;

/// 外部发给任务控制器的命令
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    #[serde(rename_all = "camelCase")]
    StartCrawl {
        tab_id: TabId,
        #[serde(default)]
        force_reset: bool,
    },
    StopCrawl,
    ResetCrawlState,
    #[serde(rename_all = "camelCase")]
    StartFetchTracking {
        sheet_id: String,
        #[serde(default)]
        sheet_name: Option<String>,
        #[serde(default)]
        tab_id: Option<TabId>,
        #[serde(default)]
        force_reset: bool,
    },
    StopFetchTracking,
    GetCurrentStatus,
    #[serde(rename_all = "camelCase")]
    SetAutoRerun {
        enabled: bool,
        #[serde(default)]
        interval_seconds: Option<i64>,
    },
    #[serde(rename_all = "camelCase")]
    SetAutoRerunInterval { interval_seconds: i64 },
}

/// 简单应答
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Ack {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

/// 命令应答
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandResponse {
    Ack(Ack),
    Status(StatusSnapshot),
}

impl CommandResponse {
    pub fn is_success(&self) -> bool {
        match self {
            CommandResponse::Ack(ack) => ack.success,
            CommandResponse::Status(_) => true,
        }
    }
}

impl From<Ack> for CommandResponse {
    fn from(ack: Ack) -> Self {
        CommandResponse::Ack(ack)
    }
}
