pub mod countdown;
pub mod journal_writer;
pub mod proctor_monitor;
pub mod session_store;
pub mod submission;

pub use countdown::{Countdown, CountdownTimer, TickOutcome, TimerSnapshot, TimerState};
pub use journal_writer::{AttemptJournal, JournalEntry};
pub use proctor_monitor::ProctorMonitor;
pub use session_store::{BeginOutcome, SessionStore};
pub use submission::{SubmissionPipeline, SubmissionTicket};
