pub mod answer;
pub mod attempt;
pub mod exam;
pub mod fixture;
pub mod loaders;
pub mod proctor;
pub mod result;
pub mod user;

pub use answer::{AnswerEntry, SubmissionReceipt, SubmitRequest, SubmitResponse};
pub use attempt::{AttemptStatus, ExamAttempt, ExamMeta};
pub use exam::{Difficulty, ExamId, Question, QuestionType, StartExamResponse};
pub use fixture::{ExamFixture, FixtureQuestion};
pub use loaders::load_exam_fixture;
pub use proctor::{ProctorEvent, ProctorEventType};
pub use result::{GradedAnswer, ResultReport};
pub use user::{CurrentUser, Role};
