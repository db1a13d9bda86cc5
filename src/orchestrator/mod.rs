//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责调度与统计，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `scheduler` - 调度器
//! - 确定年份与组合范围
//! - 固定数量的 worker 从共享队列领取组合
//! - 每个组合一个独立浏览器会话
//! - 写入年份完成标记，输出统计
//!
//! ### `combo_walker` - 单个组合遍历器
//! - 顺序驱动文件号
//! - 跳过已完成的文件号，吸收单个文件号的失败
//! - 判断组合何时结束
//!
//! ## 层次关系
//!
//! ```text
//! scheduler (处理 Vec<Combo>)
//!     ↓
//! combo_walker (处理文件号序列)
//!     ↓
//! workflow::FetchProtocol (处理单个文件号)
//!     ↓
//! services (能力层：检查点 / 隔离 / 归档 / 下载 / 验证码)
//!     ↓
//! browser + infrastructure (会话与 JsExecutor)
//! ```

pub mod combo_walker;
pub mod scheduler;

// 重新导出主要类型
pub use combo_walker::{ComboOutcome, ComboReport, ComboStats, ComboWalker};
pub use scheduler::{PortalScope, RunSummary, Scheduler, YearSummary};
