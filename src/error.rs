//! 错误类型
//!
//! 按关注点划分：浏览器 / 页面动作 / 表格 API / 配置，统一汇总为 `AppError`

use std::time::Duration;

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 浏览器相关错误
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),
    /// 页面动作执行错误
    #[error("page action error: {0}")]
    Execution(#[from] ExecutionError),
    /// 表格 API 调用错误
    #[error("{0}")]
    Api(#[from] ApiError),
    /// 配置错误
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 连接浏览器失败
    #[error("cannot connect to browser at {endpoint}: {source}")]
    ConnectionFailed {
        endpoint: String,
        #[source]
        source: chromiumoxide::error::CdpError,
    },
    /// 启动浏览器失败
    #[error("cannot launch browser: {0}")]
    LaunchFailed(String),
    /// 打开标签页失败
    #[error("cannot open tab at {url}: {source}")]
    TabOpenFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 关闭标签页失败
    #[error("cannot close tab {tab}: {source}")]
    TabCloseFailed {
        tab: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 标签页不存在
    #[error("tab {0} not found")]
    TabNotFound(String),
    /// CDP 调用失败
    #[error(transparent)]
    Cdp(#[from] chromiumoxide::error::CdpError),
}

/// 页面动作执行错误
///
/// 页面动作边界内的任何异常都会被转换为该类型，不会继续向上抛出
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// 驱动层失败（标签页丢失、CDP 断开等）
    #[error(transparent)]
    Driver(#[from] BrowserError),
    /// 页面脚本抛出了异常
    #[error("page script raised: {0}")]
    Script(String),
    /// 页面脚本返回了无法识别的结果
    #[error("unexpected page script result: {0}")]
    Malformed(String),
    /// 超时
    #[error("page action timed out after {0:?}")]
    TimedOut(Duration),
    /// 驱动调用 panic
    #[error("page action panicked: {0}")]
    Panicked(String),
}

/// 表格 API 调用错误
///
/// Display 文本会直接展示给观察者，保持与界面一致的英文提示
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败
    #[error("Error calling {endpoint} API: {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// 非 2xx 响应
    #[error("Error calling {endpoint} API")]
    BadStatus { endpoint: String, status: u16 },
    /// 响应结构不合法
    #[error("Invalid API response")]
    InvalidResponse { endpoint: String, reason: String },
    /// 表格中没有订单
    #[error("No orderId found in sheet!")]
    EmptyOrderList,
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件读取失败
    #[error("cannot read config file {path}: {source}")]
    FileReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("cannot parse config file {path}: {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// TOML 序列化失败
    #[error("cannot serialize {what}: {source}")]
    TomlSerializeFailed {
        what: String,
        #[source]
        source: toml::ser::Error,
    },
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
