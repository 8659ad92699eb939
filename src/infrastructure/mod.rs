pub mod auth;
pub mod browser_host;
pub mod exam_api;
pub mod js_executor;
pub mod memory_api;

pub use auth::AuthSession;
pub use browser_host::{BrowserHost, BrowserSignal, CdpBrowserHost, ChannelBrowserHost};
pub use exam_api::{ExamApi, HttpExamApi};
pub use js_executor::JsExecutor;
pub use memory_api::{InMemoryExamApi, ScriptedFailure};
