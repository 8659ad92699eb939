//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层把配置、后端、浏览器和终端组装起来，是整个系统的“指挥中心”。
//!
//! ## 模块划分
//!
//! ### `app` - 应用
//! - 按配置选择 REST 后端或离线内存后端
//! - 按配置连接真实浏览器，或使用可手动投递信号的宿主
//! - 查询当前用户，构造作答上下文
//! - 运行结束后写作答日志、展示成绩报告
//!
//! ### `terminal` - 终端前端
//! - 解析命令并交给运行器
//! - 渲染运行器的更新（题目、导航、剩余时间、提示、重定向、监考标记）
//!
//! ## 层次关系
//!
//! ```text
//! app + terminal
//!     ↓
//! workflow::ExamRunner (一次作答的状态机)
//!     ↓
//! services (会话存储 / 倒计时 / 监考 / 提交 / 作答日志)
//!     ↓
//! infrastructure (ExamApi / BrowserHost / AuthSession / JsExecutor)
//! ```

pub mod app;
pub mod terminal;

pub use app::App;
pub use terminal::{parse_command, TerminalInput};
