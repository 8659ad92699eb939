//! # Exam Session
//!
//! 在线考试的限时作答核心：开始作答、展示题目、倒计时、收集答案、
//! 监考上报，以及只提交一次的最终答卷。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源，只暴露能力
//! - `ExamApi` - 考试后端边界（`HttpExamApi` / `InMemoryExamApi`）
//! - `BrowserHost` - 全屏 / 可见性 / 焦点信号的订阅能力
//! - `AuthSession` - Bearer 凭证与登录失效信号
//! - `JsExecutor` - 唯一的 page owner，提供 eval() 能力
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述“我能做什么”
//! - `SessionStore` - 一次作答的数据
//! - `CountdownTimer` - 倒计时，只触发一次“时间到”
//! - `ProctorMonitor` - 监考信号到事件的转换与上报
//! - `SubmissionPipeline` - 答卷整理与只提交一次
//! - `AttemptJournal` - 作答日志
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义“一次作答”的完整状态机
//! - `SessionContext` - 显式上下文（用户 + 凭证 + 后端 + 浏览器）
//! - `ExamRunner` - NotStarted → Loading → Active → Submitting → Done
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/app` - 组装配置、后端、浏览器
//! - `orchestrator/terminal` - 终端前端
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::attach_to_exam_page;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{ExamApi, InMemoryExamApi};
pub use models::{ExamAttempt, ExamId, ProctorEvent, ProctorEventType, Question};
pub use orchestrator::App;
pub use workflow::{ExamRunner, RunOutcome, RunReport, RunnerState, RunnerUpdate, SessionContext};
