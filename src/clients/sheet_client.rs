/// 表格 API 客户端
///
/// 封装所有与 Google 表格中转 API 相关的调用逻辑
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::{Config, UpdateShape};
use crate::error::ApiError;
use crate::models::tracking::TRACKING_NUMBER_ERROR;
use crate::models::{SheetRef, TrackingUpdate};

/// 表格 API 能力
#[async_trait]
pub trait SheetApi: Send + Sync {
    /// 按表格顺序读取订单号
    async fn get_order_ids(&self, sheet: &SheetRef, sheet_name: &str)
        -> Result<Vec<String>, ApiError>;

    /// 回写单个订单的运单号和物流状态
    async fn update_record(
        &self,
        sheet: &SheetRef,
        sheet_name: &str,
        update: &TrackingUpdate,
    ) -> Result<(), ApiError>;
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    data: Option<Value>,
}

/// 基于 reqwest 的表格客户端
pub struct SheetClient {
    http: Client,
    base_url: String,
    update_shape: UpdateShape,
}

impl SheetClient {
    /// 创建新的表格客户端
    pub fn new(config: &Config) -> Self {
        Self::with_base_url(&config.sheet_api_base_url, config.update_shape)
    }

    pub fn with_base_url(base_url: &str, update_shape: UpdateShape) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            update_shape,
        }
    }

    async fn post(&self, endpoint: &str, body: &Value) -> Result<reqwest::Response, ApiError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!("POST {} Payload: {}", url, body);

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|source| ApiError::RequestFailed {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let status = response.status();
        debug!("POST {} 响应状态: {}", url, status);
        if !status.is_success() {
            return Err(ApiError::BadStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    fn update_body(&self, sheet: &SheetRef, sheet_name: &str, update: &TrackingUpdate) -> Value {
        match self.update_shape {
            UpdateShape::Record => json!({
                "id": sheet,
                "sheetName": sheet_name,
                "orderId": update.order_id,
                "trackingNumber": update.tracking_number,
                "trackingStatus": update.tracking_status,
            }),
            UpdateShape::Datamap => {
                // 这种表格只收运单号，取不到运单号时写空单元格
                let number = match update.tracking_number.as_str() {
                    TRACKING_NUMBER_ERROR => "",
                    number => number,
                };
                let mut datamap = serde_json::Map::new();
                datamap.insert(update.order_id.clone(), Value::String(number.to_string()));
                json!({
                    "id": sheet,
                    "sheetName": sheet_name,
                    "datamap": datamap,
                })
            }
        }
    }
}

#[async_trait]
impl SheetApi for SheetClient {
    async fn get_order_ids(
        &self,
        sheet: &SheetRef,
        sheet_name: &str,
    ) -> Result<Vec<String>, ApiError> {
        const ENDPOINT: &str = "getInfo";

        let response = self
            .post(ENDPOINT, &json!({ "id": sheet, "sheetName": sheet_name }))
            .await?;

        let info: InfoResponse = response.json().await.map_err(|e| ApiError::InvalidResponse {
            endpoint: ENDPOINT.to_string(),
            reason: e.to_string(),
        })?;

        let order_ids = parse_order_ids(info.data).map_err(|reason| ApiError::InvalidResponse {
            endpoint: ENDPOINT.to_string(),
            reason,
        })?;

        if order_ids.is_empty() {
            return Err(ApiError::EmptyOrderList);
        }
        Ok(order_ids)
    }

    async fn update_record(
        &self,
        sheet: &SheetRef,
        sheet_name: &str,
        update: &TrackingUpdate,
    ) -> Result<(), ApiError> {
        let body = self.update_body(sheet, sheet_name, update);
        self.post("update", &body).await?;
        Ok(())
    }
}

/// `data` 必须是数组，元素为字符串或数字
fn parse_order_ids(data: Option<Value>) -> Result<Vec<String>, String> {
    let items = match data {
        Some(Value::Array(items)) => items,
        Some(other) => return Err(format!("data is not an array: {}", other)),
        None => return Err("missing data".to_string()),
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(format!("unsupported orderId: {}", other)),
        })
        .collect()
}
