mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{start, start_exam, states, time_left};
use exam_session::error::StartError;
use exam_session::infrastructure::{ExamApi, InMemoryExamApi, ScriptedFailure};
use exam_session::models::{AnswerEntry, ExamId};
use exam_session::workflow::{
    Completion, NoticeLevel, Route, RunOutcome, RunnerState, RunnerUpdate,
};
use tokio_test::assert_ok;

fn notices(updates: &[RunnerUpdate], level: NoticeLevel) -> Vec<String> {
    updates
        .iter()
        .filter_map(|u| match u {
            RunnerUpdate::Notice(n) if n.level == level => Some(n.message.clone()),
            _ => None,
        })
        .collect()
}

fn redirects(updates: &[RunnerUpdate]) -> Vec<Duration> {
    updates
        .iter()
        .filter_map(|u| match u {
            RunnerUpdate::Redirect {
                route: Route::Dashboard,
                after,
            } => Some(*after),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_timer_expiry_submits_recorded_answer_once() {
    let api = Arc::new(InMemoryExamApi::new(common::fixture(60)));
    let mut h = start(api.clone(), true);
    h.wait_for_state(RunnerState::Active).await;

    h.handle.select_option("B");
    let (report, updates) = h.finish().await;

    let accepted = api.accepted_submissions().await;
    assert_eq!(api.submit_calls().await, 1);
    assert_eq!(accepted.len(), 1);
    assert_eq!(
        accepted[0].answers,
        vec![AnswerEntry {
            question: "q1".to_string(),
            selected_option: "B".to_string(),
        }]
    );

    assert!(matches!(report.outcome, RunOutcome::Submitted(_)));
    assert!(report.attempt_cleared);
    assert_eq!(report.answered, 1);

    let ticks = time_left(&updates);
    assert_eq!(ticks.first(), Some(&60));
    assert_eq!(ticks.last(), Some(&0));
    assert!(ticks.windows(2).all(|w| w[1] == w[0] - 1));

    assert_eq!(notices(&updates, NoticeLevel::Info).len(), 1);
    assert_eq!(notices(&updates, NoticeLevel::Success).len(), 1);
    assert_eq!(redirects(&updates), vec![Duration::from_millis(500)]);
    assert_eq!(
        states(&updates),
        vec![
            RunnerState::Loading,
            RunnerState::Active,
            RunnerState::Submitting,
            RunnerState::Done(Completion::Success),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_manual_submit_with_no_answers_is_still_sent() {
    let api = Arc::new(InMemoryExamApi::new(common::fixture(600)));
    let mut h = start(api.clone(), true);
    h.wait_for_state(RunnerState::Active).await;

    h.handle.submit();
    let (report, _) = h.finish().await;

    let accepted = api.accepted_submissions().await;
    assert_eq!(accepted.len(), 1);
    assert!(accepted[0].answers.is_empty());
    assert_eq!(accepted[0].exam_id, ExamId::new("exam-1"));
    assert!(matches!(report.outcome, RunOutcome::Submitted(_)));
}

#[tokio::test(start_paused = true)]
async fn test_already_given_never_starts_timer_or_monitor() {
    let api = Arc::new(InMemoryExamApi::new(common::fixture(60)));
    api.set_already_given(true).await;
    // 拒绝全屏：一旦监考启动就会上报 fullscreen_request_failed
    let h = start(api.clone(), false);
    let host = h.host.clone();

    let (report, updates) = h.finish().await;

    assert!(matches!(report.outcome, RunOutcome::AlreadyGiven));
    assert!(time_left(&updates).is_empty());
    assert!(redirects(&updates).is_empty());
    assert_eq!(notices(&updates, NoticeLevel::Info).len(), 1);
    assert!(notices(&updates, NoticeLevel::Error).is_empty());
    assert!(!states(&updates).contains(&RunnerState::Active));

    assert_eq!(host.subscriber_count(), 0);
    assert!(api.proctor_events().await.is_empty());
    assert_eq!(api.submit_calls().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_network_failure_keeps_answers_for_retry() {
    let api = Arc::new(InMemoryExamApi::new(common::fixture(600)));
    api.fail_next_submission(ScriptedFailure::Network).await;
    let mut h = start(api.clone(), true);
    h.wait_for_state(RunnerState::Active).await;

    h.handle.select_option("B");
    h.handle.jump_to(2);
    h.handle.select_option("A");
    h.handle.submit();
    h.wait_for_state(RunnerState::Done(Completion::Failure)).await;
    assert!(api.accepted_submissions().await.is_empty());

    h.handle.submit();
    let (report, updates) = h.finish().await;

    assert_eq!(api.submit_calls().await, 2);
    let accepted = api.accepted_submissions().await;
    assert_eq!(accepted.len(), 1);
    let answered: Vec<_> = accepted[0]
        .answers
        .iter()
        .map(|a| (a.question.as_str(), a.selected_option.as_str()))
        .collect();
    assert_eq!(answered, vec![("q1", "B"), ("q3", "A")]);

    assert!(matches!(report.outcome, RunOutcome::Submitted(_)));
    assert_eq!(notices(&updates, NoticeLevel::Error).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_double_submit_sends_once() {
    let api = Arc::new(InMemoryExamApi::new(common::fixture(600)));
    let mut h = start(api.clone(), true);
    h.wait_for_state(RunnerState::Active).await;

    h.handle.submit();
    h.handle.submit();
    let (report, _) = h.finish().await;

    assert_eq!(api.submit_calls().await, 1);
    assert!(matches!(report.outcome, RunOutcome::Submitted(_)));
}

#[tokio::test(start_paused = true)]
async fn test_timer_expiry_racing_manual_submit_sends_once() {
    let api = Arc::new(InMemoryExamApi::new(common::fixture(2)));
    api.set_submit_delay(Duration::from_secs(5)).await;
    let mut h = start(api.clone(), true);
    h.wait_for_state(RunnerState::Active).await;

    tokio::time::sleep(Duration::from_millis(1990)).await;
    h.handle.submit();
    let (report, updates) = h.finish().await;

    assert_eq!(api.submit_calls().await, 1);
    assert!(matches!(report.outcome, RunOutcome::Submitted(_)));
    assert_eq!(
        states(&updates)
            .iter()
            .filter(|s| **s == RunnerState::Submitting)
            .count(),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_backend_duplicate_is_treated_as_already_submitted() {
    let api = Arc::new(InMemoryExamApi::new(common::fixture(600)));
    api.fail_next_submission(ScriptedFailure::Status(
        409,
        "Exam already submitted".to_string(),
    ))
    .await;
    let mut h = start(api.clone(), true);
    h.wait_for_state(RunnerState::Active).await;

    h.handle.select_option("C");
    h.handle.submit();
    let (report, updates) = h.finish().await;

    assert!(matches!(report.outcome, RunOutcome::AlreadySubmitted));
    assert!(report.attempt_cleared);
    assert_eq!(api.submit_calls().await, 1);
    assert_eq!(redirects(&updates), vec![Duration::from_millis(500)]);
    assert!(notices(&updates, NoticeLevel::Error).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_expired_session_marks_auth_and_keeps_attempt() {
    let api = Arc::new(InMemoryExamApi::new(common::fixture(600)));
    api.fail_next_submission(ScriptedFailure::Status(401, String::new()))
        .await;
    let mut h = start(api.clone(), true);
    let auth = h.auth.clone();
    h.wait_for_state(RunnerState::Active).await;

    h.handle.submit();
    h.wait_for_state(RunnerState::Done(Completion::Failure)).await;
    assert!(auth.is_expired());

    h.handle.leave();
    let (report, _) = h.finish().await;
    assert!(matches!(report.outcome, RunOutcome::Abandoned));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_exam_redirects_after_delay() {
    let api = Arc::new(InMemoryExamApi::new(common::fixture(60)));
    let h = start_exam(api.clone(), true, ExamId::new("missing"));
    let host = h.host.clone();

    let (report, updates) = h.finish().await;

    assert!(matches!(
        report.outcome,
        RunOutcome::StartFailed(StartError::NotFound { .. })
    ));
    assert!(report.attempt_cleared);
    assert_eq!(notices(&updates, NoticeLevel::Error).len(), 1);
    assert_eq!(redirects(&updates), vec![Duration::from_secs(3)]);
    assert_eq!(
        states(&updates),
        vec![RunnerState::Loading, RunnerState::StartFailed]
    );
    assert_eq!(host.subscriber_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_leave_while_loading_abandons_start() {
    let api = Arc::new(InMemoryExamApi::new(common::fixture(60)));
    api.set_start_delay(Duration::from_secs(10)).await;
    let mut h = start(api.clone(), true);
    h.wait_for_state(RunnerState::Loading).await;

    assert!(h.handle.next());
    assert!(h.handle.submit());
    assert!(h.handle.leave());
    let (report, updates) = h.finish().await;

    assert!(matches!(report.outcome, RunOutcome::Abandoned));
    assert!(!states(&updates).contains(&RunnerState::Active));
    assert_eq!(api.submit_calls().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_questions_fetched_when_start_has_none() {
    let api = Arc::new(InMemoryExamApi::new(common::fixture(600)));
    api.set_questions_inline(false).await;
    let mut h = start(api.clone(), true);

    let update = h
        .wait_for(|u| matches!(u, RunnerUpdate::Question(_)))
        .await;
    let RunnerUpdate::Question(view) = update else {
        unreachable!()
    };
    assert_eq!(view.total, 3);
    assert_eq!(view.question_id, "q1");

    h.handle.leave();
    let (report, _) = h.finish().await;
    assert!(report.attempt_cleared);
}

#[tokio::test(start_paused = true)]
async fn test_leave_during_submission_lets_it_complete() {
    let api = Arc::new(InMemoryExamApi::new(common::fixture(600)));
    api.set_submit_delay(Duration::from_secs(3)).await;
    let mut h = start(api.clone(), true);
    h.wait_for_state(RunnerState::Active).await;

    h.handle.select_option("D");
    h.handle.submit();
    h.wait_for_state(RunnerState::Submitting).await;
    h.handle.leave();
    let (report, _) = h.finish().await;

    assert!(matches!(report.outcome, RunOutcome::Submitted(_)));
    assert_eq!(assert_ok!(api.fetch_result("result-1").await).score, 0);
    assert_eq!(api.accepted_submissions().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_answers_frozen_after_time_runs_out() {
    let api = Arc::new(InMemoryExamApi::new(common::fixture(5)));
    api.fail_next_submission(ScriptedFailure::Network).await;
    let mut h = start(api.clone(), true);
    h.wait_for_state(RunnerState::Active).await;

    h.handle.select_option("B");
    h.wait_for_state(RunnerState::Done(Completion::Failure)).await;
    assert_eq!(api.submit_calls().await, 1);

    tokio::time::sleep(Duration::from_secs(3600)).await;
    h.handle.select_option("D");
    h.handle.jump_to(1);
    h.handle.select_option("A");
    h.handle.submit();
    let (report, updates) = h.finish().await;

    assert!(matches!(report.outcome, RunOutcome::Submitted(_)));
    let accepted = api.accepted_submissions().await;
    assert_eq!(accepted.len(), 1);
    assert_eq!(
        accepted[0].answers,
        vec![AnswerEntry {
            question: "q1".to_string(),
            selected_option: "B".to_string(),
        }]
    );
    // 一次提交失败，两次拒绝改答案
    assert_eq!(notices(&updates, NoticeLevel::Error).len(), 3);
}
