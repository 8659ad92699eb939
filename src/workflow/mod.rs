pub mod exam_runner;
pub mod messages;
pub mod session_ctx;

pub use exam_runner::ExamRunner;
pub use messages::{
    Completion, Notice, NoticeLevel, QuestionView, Route, RunOutcome, RunReport, RunnerCommand,
    RunnerHandle, RunnerState, RunnerUpdate,
};
pub use session_ctx::SessionContext;
