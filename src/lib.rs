//! # Case Archive Scraper
//!
//! 一个可断点续跑的并发案件归档程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `JsExecutor` - 唯一的 page owner，提供 eval() 能力
//! - `browser/` - 浏览器会话抽象（`BrowserSession`）与 Chrome 实现
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个单元
//! - `CheckpointStore` - 完成标记
//! - `QuarantineRegistry` - 隔离记录
//! - `Archive` - 归档布局
//! - `DownloadTracker` - 下载完成检测
//! - `ChallengeSolver` - 验证码求解（页面文本 / azcaptcha）
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个文件号"的完整处理流程
//! - `UnitCtx` - 上下文封装（worker + year + combo + file number）
//! - `FetchProtocol` - 流程编排（填表 → 验证码 → 提交 → 下载）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/scheduler` - 年份与组合调度，管理会话和并发
//! - `orchestrator/combo_walker` - 单个组合处理器，遍历文件号
//!
//! 所有组件共享一个显式传递的 `OrchestratorContext`。
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod context;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::{BrowserSession, ChromeSessionFactory, SessionFactory, WaitCondition};
pub use config::{CaptchaMode, Config};
pub use context::OrchestratorContext;
pub use error::{AppError, AppResult};
pub use infrastructure::JsExecutor;
pub use models::{Combo, PortalLayout, UnitKey, Year};
pub use orchestrator::{ComboOutcome, ComboWalker, RunSummary, Scheduler};
pub use workflow::{FetchOutcome, FetchProtocol, UnitCtx};
