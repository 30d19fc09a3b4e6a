//! # Order Tracking Sync
//!
//! 浏览器自动化任务编排核心：商品列表分页抓取 + 订单物流回写表格
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Browser），只暴露能力
//! - `BrowserDriver` - 打开 / 关闭标签页、执行页面动作的接口
//! - `ChromeDriver` - 基于 chromiumoxide 的实现
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `PageActionExecutor` - 带超时、吞掉 panic 的页面动作
//! - `TabLifecycle` - 打开即保证关闭的临时标签页
//! - `IdExporter` / `PreferenceStore` - 文件输出与偏好存储
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义一次任务的完整流程
//! - `PaginationWalker` - 分页抓取商品 ID
//! - `OrderTrackingPipeline` - 表格订单 → 运单号 → 物流状态 → 回写
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/controller` - 单飞状态、命令分发、事件广播
//! - `orchestrator/auto_rerun` - 自动重跑定时器
//!
//! ## 模块结构

pub mod browser;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{SheetApi, SheetClient};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{BrowserDriver, ChromeDriver};
pub use models::{Command, CommandResponse, Event};
pub use orchestrator::JobController;
