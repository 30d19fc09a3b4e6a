//! 基础设施层：持有浏览器资源，只暴露能力

pub mod chrome_driver;
pub mod driver;
pub mod js_executor;
pub mod page_action;

pub use chrome_driver::ChromeDriver;
pub use driver::{ActionOutput, BrowserDriver, PageAction};
pub use js_executor::JsExecutor;
