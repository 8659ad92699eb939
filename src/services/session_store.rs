//! 考试会话存储 - 业务能力层
//!
//! 一次作答的唯一数据来源：开始、作答、清空。不关心渲染，也不关心计时。

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::DurationUnit;
use crate::error::{ApiError, SessionError, StartError};
use crate::infrastructure::ExamApi;
use crate::models::{AttemptStatus, ExamAttempt, ExamId, ExamMeta, StartExamResponse};

/// 开始作答的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeginOutcome {
    /// 作答已就绪
    Started,
    /// 后端表示已经考过；不开始计时和监考
    AlreadyGiven { title: String },
}

/// 考试会话存储
pub struct SessionStore {
    api: Arc<dyn ExamApi>,
    attempt: Option<ExamAttempt>,
    duration_unit: DurationUnit,
    default_duration_secs: u64,
}

impl SessionStore {
    pub fn new(api: Arc<dyn ExamApi>, duration_unit: DurationUnit, default_duration_secs: u64) -> Self {
        Self {
            api,
            attempt: None,
            duration_unit,
            default_duration_secs,
        }
    }

    /// 向后端请求开始考试并装载作答
    ///
    /// 同一个存储里已有作答时拒绝开始；开始响应不带题目时单独拉取一次。
    pub async fn begin_attempt(&mut self, exam_id: &ExamId) -> Result<BeginOutcome, StartError> {
        if let Some(active) = &self.attempt {
            warn!("已有进行中的考试 {}，拒绝开始 {}", active.exam_id(), exam_id);
            return Err(StartError::AttemptInProgress {
                active: active.exam_id().clone(),
            });
        }

        info!("📝 开始考试: {}", exam_id);
        let response = self
            .api
            .start_exam(exam_id)
            .await
            .map_err(|e| classify_start_error(exam_id, e))?;

        if response.already_given {
            info!("ℹ️ 考试 {} 已经完成过", exam_id);
            return Ok(BeginOutcome::AlreadyGiven {
                title: response.title,
            });
        }

        let attempt = self.build_attempt(exam_id, response).await?;
        info!(
            "✓ 考试已就绪: {} | {} 道题 | {} 秒",
            attempt.meta().title,
            attempt.question_count(),
            attempt.meta().duration_seconds
        );
        self.attempt = Some(attempt);
        Ok(BeginOutcome::Started)
    }

    async fn build_attempt(
        &self,
        exam_id: &ExamId,
        response: StartExamResponse,
    ) -> Result<ExamAttempt, StartError> {
        let mut questions = response.questions;
        if questions.is_empty() {
            debug!("开始响应没有题目，单独拉取");
            questions = self
                .api
                .exam_questions(exam_id)
                .await
                .map_err(|e| classify_start_error(exam_id, e))?;
        }
        if questions.is_empty() {
            return Err(StartError::NoQuestions);
        }

        let duration_seconds = response
            .duration
            .map(|d| self.duration_unit.to_seconds(d))
            .unwrap_or(self.default_duration_secs);
        let total_marks = if response.total_marks > 0 {
            response.total_marks
        } else {
            questions.iter().map(|q| q.marks).sum()
        };

        let meta = ExamMeta {
            exam_id: response.exam_id.unwrap_or_else(|| exam_id.clone()),
            title: response.title,
            total_marks,
            duration_seconds,
            started_at: response.start_time.unwrap_or_else(Utc::now),
        };
        Ok(ExamAttempt::new(meta, questions))
    }

    /// 记录答案；同一题后写覆盖先写
    pub fn record_answer(
        &mut self,
        question_index: usize,
        option: impl Into<String>,
    ) -> Result<(), SessionError> {
        let attempt = self.attempt.as_mut().ok_or(SessionError::NoActiveAttempt)?;
        if !attempt.status().accepts_answers() {
            return Err(SessionError::NotAcceptingAnswers {
                status: attempt.status().to_string(),
            });
        }
        let len = attempt.question_count();
        if question_index >= len {
            return Err(SessionError::IndexOutOfRange {
                index: question_index,
                len,
            });
        }
        let option = option.into();
        debug!("记录答案: 第 {} 题 → {}", question_index + 1, option);
        attempt.insert_answer(question_index, option);
        Ok(())
    }

    pub fn answer(&self, question_index: usize) -> Option<&str> {
        self.attempt.as_ref()?.answer(question_index)
    }

    pub fn set_status(&mut self, status: AttemptStatus) {
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.set_status(status);
        }
    }

    pub fn set_remaining(&mut self, seconds: u64) {
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.set_remaining(seconds);
        }
    }

    /// 状态；没有作答时为 `NotStarted`
    pub fn status(&self) -> AttemptStatus {
        self.attempt
            .as_ref()
            .map(ExamAttempt::status)
            .unwrap_or(AttemptStatus::NotStarted)
    }

    pub fn attempt(&self) -> Option<&ExamAttempt> {
        self.attempt.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.attempt.is_none()
    }

    /// 释放题目和答案，回到 `NotStarted`
    pub fn clear(&mut self) {
        if let Some(attempt) = self.attempt.take() {
            debug!("清空作答: {}", attempt.exam_id());
        }
    }
}

/// 把后端错误归类为开始失败的原因
pub fn classify_start_error(exam_id: &ExamId, err: ApiError) -> StartError {
    match err {
        ApiError::Unauthorized { .. } => StartError::SessionExpired,
        ApiError::Network { .. } => StartError::Network(err),
        ApiError::BadResponse { status: 404, .. } => StartError::NotFound {
            exam_id: exam_id.clone(),
        },
        ApiError::BadResponse { ref message, .. } => {
            let message = message.clone().unwrap_or_else(|| err.to_string());
            let lower = message.to_lowercase();
            if lower.contains("already") {
                StartError::AlreadyCompleted
            } else if lower.contains("enroll") {
                StartError::NotEnrolled
            } else if lower.contains("not active")
                || lower.contains("inactive")
                || lower.contains("ended")
                || lower.contains("not started")
            {
                StartError::ExamInactive { message }
            } else {
                StartError::Rejected { message }
            }
        }
        other => StartError::Rejected {
            message: other.to_string(),
        },
    }
}
