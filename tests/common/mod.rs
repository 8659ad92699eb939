#![allow(dead_code)]

use std::sync::Arc;

use exam_session::config::Config;
use exam_session::infrastructure::{AuthSession, ChannelBrowserHost, InMemoryExamApi};
use exam_session::models::{CurrentUser, ExamFixture, ExamId, FixtureQuestion, Role};
use exam_session::workflow::{
    ExamRunner, RunReport, RunnerHandle, RunnerState, RunnerUpdate, SessionContext,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// 三道题的试卷：q1 答案 B，q2 答案 C，q3 答案 A，每题 2 分
pub fn fixture(duration: u64) -> ExamFixture {
    let question = |id: &str, answer: &str| FixtureQuestion {
        id: id.to_string(),
        text: format!("Question {}", id),
        options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
        marks: 2,
        difficulty: Default::default(),
        answer: Some(answer.to_string()),
    };
    ExamFixture {
        exam_id: ExamId::new("exam-1"),
        title: "Sample Exam".to_string(),
        duration,
        user: None,
        questions: vec![question("q1", "B"), question("q2", "C"), question("q3", "A")],
    }
}

pub fn student() -> CurrentUser {
    CurrentUser {
        id: "student-1".to_string(),
        name: "Test Student".to_string(),
        email: "student@example.com".to_string(),
        role: Role::Student,
    }
}

pub struct Harness {
    pub api: Arc<InMemoryExamApi>,
    pub host: Arc<ChannelBrowserHost>,
    pub auth: AuthSession,
    pub handle: RunnerHandle,
    pub updates: mpsc::UnboundedReceiver<RunnerUpdate>,
    pub task: JoinHandle<RunReport>,
    pub seen: Vec<RunnerUpdate>,
}

/// 启动一个运行器，作答 `exam-1`
pub fn start(api: Arc<InMemoryExamApi>, fullscreen_allowed: bool) -> Harness {
    start_exam(api, fullscreen_allowed, ExamId::new("exam-1"))
}

pub fn start_exam(api: Arc<InMemoryExamApi>, fullscreen_allowed: bool, exam_id: ExamId) -> Harness {
    let host = Arc::new(ChannelBrowserHost::new(fullscreen_allowed));
    let auth = AuthSession::new("test-token");
    let ctx = SessionContext::new(student(), auth.clone(), api.clone(), host.clone());
    let (runner, handle, updates) = ExamRunner::new(ctx, &Config::default());
    let task = tokio::spawn(runner.run(exam_id));

    Harness {
        api,
        host,
        auth,
        handle,
        updates,
        task,
        seen: Vec::new(),
    }
}

impl Harness {
    /// 等到满足条件的更新出现
    pub async fn wait_for(&mut self, pred: impl Fn(&RunnerUpdate) -> bool) -> RunnerUpdate {
        loop {
            let update = self
                .updates
                .recv()
                .await
                .expect("runner finished before the expected update");
            self.seen.push(update.clone());
            if pred(&update) {
                return update;
            }
        }
    }

    pub async fn wait_for_state(&mut self, state: RunnerState) {
        self.wait_for(|u| *u == RunnerUpdate::State(state)).await;
    }

    /// 等运行器结束，返回报告和全部更新
    pub async fn finish(mut self) -> (RunReport, Vec<RunnerUpdate>) {
        let report = self.task.await.expect("runner task panicked");
        while let Ok(update) = self.updates.try_recv() {
            self.seen.push(update);
        }
        (report, self.seen)
    }
}

pub fn states(updates: &[RunnerUpdate]) -> Vec<RunnerState> {
    updates
        .iter()
        .filter_map(|u| match u {
            RunnerUpdate::State(s) => Some(*s),
            _ => None,
        })
        .collect()
}

pub fn time_left(updates: &[RunnerUpdate]) -> Vec<u64> {
    updates
        .iter()
        .filter_map(|u| match u {
            RunnerUpdate::TimeLeft(s) => Some(*s),
            _ => None,
        })
        .collect()
}
