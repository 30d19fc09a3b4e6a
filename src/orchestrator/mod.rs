//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层是整个系统的"指挥中心"：接收命令、维护单飞状态、广播进度。
//!
//! ## 模块划分
//!
//! ### `controller` - 任务控制器
//! - 每种任务（分页 / 订单物流）各自单飞
//! - start / stop / force-reset / status 命令
//! - 把流程层的进度事件广播给所有观察者
//!
//! ### `auto_rerun` - 自动重跑定时器
//! - 固定间隔触发，丢弃即取消
//!
//! ## 层次关系
//!
//! ```text
//! controller (命令 → 会话)
//!     ↓
//! workflow::PaginationWalker / OrderTrackingPipeline
//!     ↓
//! services (能力层：页面动作 / 标签页 / 导出)
//!     ↓
//! infrastructure (基础设施：BrowserDriver)
//! ```
//!
//! ## 设计原则
//!
//! 1. **资源隔离**：只有编排层持有 driver 和表格客户端
//! 2. **向下依赖**：编排层 → workflow → services → infrastructure
//! 3. **锁不跨 await**：状态锁只在同步代码里持有

pub mod auto_rerun;
pub mod controller;

pub use auto_rerun::RerunTimer;
pub use controller::JobController;
