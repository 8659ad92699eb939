//! 内存考试后端 - 基础设施层
//!
//! 从 TOML 试卷加载一场考试，在进程内扮演 REST 后端：下发题目（不含答案）、
//! 批改答卷、拒绝重复提交。离线演练和测试都用它，支持脚本化的故障注入。

use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::ApiError;
use crate::infrastructure::exam_api::ExamApi;
use crate::models::{
    load_exam_fixture, CurrentUser, ExamFixture, ExamId, GradedAnswer, ProctorEvent, Question,
    ResultReport, Role, StartExamResponse, SubmitRequest, SubmitResponse,
};

/// 预设的后端故障
#[derive(Debug, Clone)]
pub enum ScriptedFailure {
    /// 没有收到响应
    Network,
    /// 返回指定状态码和消息
    Status(u16, String),
}

impl ScriptedFailure {
    fn into_error(self, endpoint: &str) -> ApiError {
        match self {
            ScriptedFailure::Network => ApiError::network(
                endpoint,
                io::Error::new(io::ErrorKind::ConnectionReset, "connection reset by peer"),
            ),
            ScriptedFailure::Status(status @ (401 | 403), _) => ApiError::Unauthorized {
                endpoint: endpoint.to_string(),
                status,
            },
            ScriptedFailure::Status(status, message) => ApiError::BadResponse {
                endpoint: endpoint.to_string(),
                status,
                message: Some(message),
            },
        }
    }
}

#[derive(Default)]
struct MemoryState {
    already_given: bool,
    questions_inline: bool,
    start_failure: Option<ScriptedFailure>,
    start_delay: Duration,
    submit_delay: Duration,
    submit_failures: VecDeque<ScriptedFailure>,
    submit_calls: usize,
    accepted: Vec<SubmitRequest>,
    fail_proctor_reports: bool,
    proctor_events: Vec<ProctorEvent>,
    results: HashMap<String, ResultReport>,
}

/// 进程内的考试后端
pub struct InMemoryExamApi {
    fixture: ExamFixture,
    user: CurrentUser,
    state: Mutex<MemoryState>,
}

impl InMemoryExamApi {
    pub fn new(fixture: ExamFixture) -> Self {
        let user = fixture.user.clone().unwrap_or_else(|| CurrentUser {
            id: "student-1".to_string(),
            name: "Demo Student".to_string(),
            email: "student@example.com".to_string(),
            role: Role::Student,
        });

        Self {
            fixture,
            user,
            state: Mutex::new(MemoryState {
                questions_inline: true,
                ..Default::default()
            }),
        }
    }

    pub async fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        Ok(Self::new(load_exam_fixture(path).await?))
    }

    // ========== 脚本化 ==========

    pub async fn set_already_given(&self, value: bool) {
        self.state.lock().await.already_given = value;
    }

    /// 为 false 时开始响应不带题目，需要单独拉取
    pub async fn set_questions_inline(&self, value: bool) {
        self.state.lock().await.questions_inline = value;
    }

    pub async fn fail_start(&self, failure: ScriptedFailure) {
        self.state.lock().await.start_failure = Some(failure);
    }

    pub async fn set_start_delay(&self, delay: Duration) {
        self.state.lock().await.start_delay = delay;
    }

    pub async fn set_submit_delay(&self, delay: Duration) {
        self.state.lock().await.submit_delay = delay;
    }

    /// 接下来的提交依次失败
    pub async fn fail_next_submission(&self, failure: ScriptedFailure) {
        self.state.lock().await.submit_failures.push_back(failure);
    }

    pub async fn set_fail_proctor_reports(&self, value: bool) {
        self.state.lock().await.fail_proctor_reports = value;
    }

    // ========== 观察 ==========

    /// 收到的提交调用次数（含失败）
    pub async fn submit_calls(&self) -> usize {
        self.state.lock().await.submit_calls
    }

    /// 被接受的答卷
    pub async fn accepted_submissions(&self) -> Vec<SubmitRequest> {
        self.state.lock().await.accepted.clone()
    }

    /// 成功上报的监考事件
    pub async fn proctor_events(&self) -> Vec<ProctorEvent> {
        self.state.lock().await.proctor_events.clone()
    }

    fn grade(&self, request: &SubmitRequest, result_id: &str) -> ResultReport {
        let answers: Vec<GradedAnswer> = self
            .fixture
            .questions
            .iter()
            .map(|question| {
                let selected = request
                    .answers
                    .iter()
                    .find(|entry| entry.question == question.id)
                    .map(|entry| entry.selected_option.clone());
                let is_correct = selected.is_some() && selected == question.answer;
                GradedAnswer {
                    question: question.id.clone(),
                    selected_option: selected,
                    is_correct,
                    marks_obtained: if is_correct { question.marks } else { 0 },
                }
            })
            .collect();

        ResultReport {
            id: result_id.to_string(),
            exam_title: Some(self.fixture.title.clone()),
            score: answers.iter().map(|a| a.marks_obtained).sum(),
            total_marks: self.fixture.total_marks(),
            answers,
            status: Some("completed".to_string()),
        }
    }

    fn client_questions(&self) -> Vec<Question> {
        self.fixture
            .questions
            .iter()
            .map(|q| q.to_client_question())
            .collect()
    }
}

#[async_trait]
impl ExamApi for InMemoryExamApi {
    async fn current_user(&self) -> Result<CurrentUser, ApiError> {
        Ok(self.user.clone())
    }

    async fn start_exam(&self, exam_id: &ExamId) -> Result<StartExamResponse, ApiError> {
        let endpoint = format!("exam/start/{}", exam_id);
        let (delay, failure, already_given, inline) = {
            let state = self.state.lock().await;
            (
                state.start_delay,
                state.start_failure.clone(),
                state.already_given,
                state.questions_inline,
            )
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(failure) = failure {
            return Err(failure.into_error(&endpoint));
        }
        if exam_id != &self.fixture.exam_id {
            return Err(ApiError::BadResponse {
                endpoint,
                status: 404,
                message: Some("Exam not found".to_string()),
            });
        }

        if already_given {
            return Ok(StartExamResponse {
                exam_id: Some(exam_id.clone()),
                title: self.fixture.title.clone(),
                already_given: true,
                ..Default::default()
            });
        }

        Ok(StartExamResponse {
            exam_id: Some(exam_id.clone()),
            title: self.fixture.title.clone(),
            total_marks: self.fixture.total_marks(),
            duration: Some(self.fixture.duration),
            questions: if inline {
                self.client_questions()
            } else {
                Vec::new()
            },
            already_given: false,
            start_time: Some(Utc::now()),
        })
    }

    async fn exam_questions(&self, exam_id: &ExamId) -> Result<Vec<Question>, ApiError> {
        if exam_id != &self.fixture.exam_id {
            return Err(ApiError::BadResponse {
                endpoint: format!("question/exam/{}", exam_id),
                status: 404,
                message: Some("Exam not found".to_string()),
            });
        }
        Ok(self.client_questions())
    }

    async fn submit_result(&self, request: &SubmitRequest) -> Result<SubmitResponse, ApiError> {
        let endpoint = "result";
        let delay = {
            let mut state = self.state.lock().await;
            state.submit_calls += 1;
            state.submit_delay
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().await;
        if let Some(failure) = state.submit_failures.pop_front() {
            debug!("内存后端: 按脚本拒绝第 {} 次提交", state.submit_calls);
            return Err(failure.into_error(endpoint));
        }
        if !state.accepted.is_empty() {
            return Err(ApiError::BadResponse {
                endpoint: endpoint.to_string(),
                status: 409,
                message: Some("Exam already submitted".to_string()),
            });
        }

        let result_id = format!("result-{}", state.accepted.len() + 1);
        let report = self.grade(request, &result_id);
        state.results.insert(result_id.clone(), report);
        state.accepted.push(request.clone());
        state.already_given = true;

        Ok(SubmitResponse {
            result_id,
            status: Some("completed".to_string()),
        })
    }

    async fn report_proctor_event(&self, event: &ProctorEvent) -> Result<(), ApiError> {
        let mut state = self.state.lock().await;
        if state.fail_proctor_reports {
            return Err(ScriptedFailure::Status(500, "proctoring store unavailable".to_string())
                .into_error("proctoring-events"));
        }
        state.proctor_events.push(event.clone());
        Ok(())
    }

    async fn fetch_result(&self, result_id: &str) -> Result<ResultReport, ApiError> {
        self.state
            .lock()
            .await
            .results
            .get(result_id)
            .cloned()
            .ok_or_else(|| ApiError::BadResponse {
                endpoint: format!("result/{}", result_id),
                status: 404,
                message: Some("Result not found".to_string()),
            })
    }
}
