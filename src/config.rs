use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::ConfigError;

/// 浏览器接入方式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserMode {
    /// 连接已打开的浏览器（复用登录态）
    Connect,
    /// 启动无头浏览器
    Headless,
}

impl FromStr for BrowserMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "connect" => Ok(BrowserMode::Connect),
            "headless" => Ok(BrowserMode::Headless),
            other => Err(format!("unknown browser mode: {other}")),
        }
    }
}

/// update 接口的请求体格式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateShape {
    /// `{id, sheetName, orderId, trackingNumber, trackingStatus}`
    Record,
    /// `{id, sheetName, datamap: {orderId: trackingNumber}}`
    Datamap,
}

impl FromStr for UpdateShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "record" => Ok(UpdateShape::Record),
            "datamap" => Ok(UpdateShape::Datamap),
            other => Err(format!("unknown update shape: {other}")),
        }
    }
}

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 浏览器接入方式
    pub browser_mode: BrowserMode,
    /// 浏览器调试端口
    pub browser_debug_port: u16,
    /// 无头模式下的浏览器可执行文件（为空时由 chromiumoxide 自动查找）
    pub chrome_executable: Option<String>,
    /// 是否显示详细日志
    pub verbose_logging: bool,

    // --- 表格 API 配置 ---
    pub sheet_api_base_url: String,
    pub update_shape: UpdateShape,
    /// 未指定时使用的工作表名
    pub default_sheet_name: String,

    // --- 等待时间（毫秒） ---
    pub pagination_settle_ms: u64,
    pub tracking_settle_ms: u64,
    pub status_settle_ms: u64,
    pub action_timeout_ms: u64,

    // --- 页面地址与选择器 ---
    /// `{orderId}` 会被替换为订单号
    pub tracking_url_template: String,
    /// `{trackingNumber}` 会被替换为运单号
    pub status_url_template: String,
    pub tracking_number_selector: String,
    pub status_selector: String,
    pub rate_limit_selector: String,
    /// 限流提示节点中用于识别限流的文本
    pub rate_limit_marker: String,

    // --- 输出 ---
    /// 商品 ID 导出目录，为空时不导出
    pub export_dir: Option<String>,
    /// 用户偏好保存路径
    pub preferences_file: String,
    /// 广播通道容量
    pub event_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser_mode: BrowserMode::Connect,
            browser_debug_port: 9222,
            chrome_executable: None,
            verbose_logging: false,
            sheet_api_base_url: "http://localhost:89/api/ggsheet".to_string(),
            update_shape: UpdateShape::Record,
            default_sheet_name: "Tiktok Shop".to_string(),
            pagination_settle_ms: 2000,
            tracking_settle_ms: 4000,
            status_settle_ms: 6000,
            action_timeout_ms: 15000,
            tracking_url_template:
                "https://www.aliexpress.com/p/tracking/index.html?_addShare=no&_login=yes&tradeOrderId={orderId}"
                    .to_string(),
            status_url_template:
                "https://global.cainiao.com/newDetail.htm?mailNoList={trackingNumber}&otherMailNoList="
                    .to_string(),
            tracking_number_selector: ".logistic-info-v2--mailNoValue--X0fPzen".to_string(),
            status_selector:
                "span.TrackingDetail--head--20GpNSP.TrackingDetail--headFirst--1mBxADn".to_string(),
            rate_limit_selector: "div.warnning-text".to_string(),
            rate_limit_marker: "unusual traffic".to_string(),
            export_dir: Some("exports".to_string()),
            preferences_file: "preferences.toml".to_string(),
            event_capacity: 256,
        }
    }
}

impl Config {
    /// 加载配置：默认值 → TOML 文件 → 环境变量
    ///
    /// 配置文件路径取 `TRACKER_CONFIG`，否则尝试当前目录下的 `tracker.toml`
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("TRACKER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("tracker.toml"));

        let base = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };

        Ok(base.with_env())
    }

    /// 从 TOML 文件读取配置，缺省字段使用默认值
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadFailed {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 用环境变量覆盖
    pub fn with_env(self) -> Self {
        Self {
            browser_mode: env_parse("BROWSER_MODE").unwrap_or(self.browser_mode),
            browser_debug_port: env_parse("BROWSER_DEBUG_PORT").unwrap_or(self.browser_debug_port),
            chrome_executable: std::env::var("CHROME_EXECUTABLE").ok().or(self.chrome_executable),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(self.verbose_logging),
            sheet_api_base_url: std::env::var("SHEET_API_BASE_URL").unwrap_or(self.sheet_api_base_url),
            update_shape: env_parse("UPDATE_SHAPE").unwrap_or(self.update_shape),
            default_sheet_name: std::env::var("DEFAULT_SHEET_NAME").unwrap_or(self.default_sheet_name),
            pagination_settle_ms: env_parse("PAGINATION_SETTLE_MS").unwrap_or(self.pagination_settle_ms),
            tracking_settle_ms: env_parse("TRACKING_SETTLE_MS").unwrap_or(self.tracking_settle_ms),
            status_settle_ms: env_parse("STATUS_SETTLE_MS").unwrap_or(self.status_settle_ms),
            action_timeout_ms: env_parse("ACTION_TIMEOUT_MS").unwrap_or(self.action_timeout_ms),
            export_dir: std::env::var("EXPORT_DIR").ok().or(self.export_dir),
            preferences_file: std::env::var("PREFERENCES_FILE").unwrap_or(self.preferences_file),
            ..self
        }
    }

    pub fn pagination_settle(&self) -> Duration {
        Duration::from_millis(self.pagination_settle_ms)
    }

    pub fn tracking_settle(&self) -> Duration {
        Duration::from_millis(self.tracking_settle_ms)
    }

    pub fn status_settle(&self) -> Duration {
        Duration::from_millis(self.status_settle_ms)
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms)
    }
}

/// 读取并解析环境变量；值不合法时记录警告并忽略
fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("环境变量 {} 的值 '{}' 无法解析，已忽略", name, raw);
            None
        }
    }
}
