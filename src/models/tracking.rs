//! 运单查询结果
//!
//! 流水线内部用 `Lookup` 区分“找到 / 没找到 / 限流 / 出错”，
//! 只有在发往表格 API 和观察者时才编码成界面上的占位字符串

use serde::{Deserialize, Serialize};

/// 运单号提取失败时的占位
pub const TRACKING_NUMBER_ERROR: &str = "Error!";
/// 物流状态提取失败时的占位
pub const STATUS_ERROR: &str = "Error";
/// 物流状态页被限流时的占位
pub const STATUS_LIMIT_TRAFFIC: &str = "Limit Traffic";

/// 单次页面查询结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(String),
    NotFound,
    RateLimited,
    Faulted(String),
}

impl Lookup {
    pub fn found(&self) -> Option<&str> {
        match self {
            Lookup::Found(value) => Some(value),
            _ => None,
        }
    }
}

/// 单个订单的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingRecord {
    pub order_id: String,
    pub tracking_number: Lookup,
    /// `None` 表示没有运单号，状态页未打开
    pub tracking_status: Option<Lookup>,
}

impl TrackingRecord {
    /// 编码为对外的字符串形式
    pub fn to_update(&self) -> TrackingUpdate {
        let tracking_number = self
            .tracking_number
            .found()
            .unwrap_or(TRACKING_NUMBER_ERROR)
            .to_string();

        let tracking_status = match &self.tracking_status {
            None => String::new(),
            Some(Lookup::Found(status)) => status.clone(),
            Some(Lookup::RateLimited) => STATUS_LIMIT_TRAFFIC.to_string(),
            Some(Lookup::NotFound) | Some(Lookup::Faulted(_)) => STATUS_ERROR.to_string(),
        };

        TrackingUpdate {
            order_id: self.order_id.clone(),
            tracking_number,
            tracking_status,
        }
    }
}

/// 发往表格和观察者的记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingUpdate {
    pub order_id: String,
    pub tracking_number: String,
    pub tracking_status: String,
}
