//! 答卷提交 - 业务能力层
//!
//! 把答案整理成 `{question, selectedOption}` 列表并送达后端。
//! 客户端用“提交进行中”标志保证同一时刻只有一次提交；重复提交的最终裁决在后端。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::error::{ApiError, SubmissionError};
use crate::infrastructure::ExamApi;
use crate::models::{AnswerEntry, ExamAttempt, SubmissionReceipt, SubmitRequest};

/// 按题目顺序整理已作答的题目
pub fn format_answers(attempt: &ExamAttempt) -> Vec<AnswerEntry> {
    attempt
        .questions()
        .iter()
        .enumerate()
        .filter_map(|(index, question)| {
            attempt.answer(index).map(|option| AnswerEntry {
                question: question.id.clone(),
                selected_option: option.to_string(),
            })
        })
        .collect()
}

pub fn build_request(attempt: &ExamAttempt, proctor_flags: Vec<String>) -> SubmitRequest {
    SubmitRequest {
        exam_id: attempt.exam_id().clone(),
        answers: format_answers(attempt),
        start_time: attempt.meta().started_at,
        proctor_flags,
    }
}

/// 持有期间独占“提交进行中”标志，丢弃时释放
#[derive(Debug)]
pub struct SubmissionTicket {
    in_flight: Arc<AtomicBool>,
}

impl Drop for SubmissionTicket {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::SeqCst);
    }
}

/// 提交管道
#[derive(Debug, Default)]
pub struct SubmissionPipeline {
    in_flight: Arc<AtomicBool>,
    delivered: AtomicBool,
}

impl SubmissionPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// 尝试占用提交标志；已有提交在途或已经送达时返回 None
    pub fn try_acquire(&self) -> Option<SubmissionTicket> {
        if self.delivered.load(Ordering::SeqCst) {
            return None;
        }
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| SubmissionTicket {
                in_flight: self.in_flight.clone(),
            })
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn is_delivered(&self) -> bool {
        self.delivered.load(Ordering::SeqCst)
    }

    /// 送达答卷
    ///
    /// 票据在返回时释放，失败后可以用同样的答案再次申请。
    pub async fn deliver(
        &self,
        api: &dyn ExamApi,
        ticket: SubmissionTicket,
        request: &SubmitRequest,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        info!(
            "📤 提交答卷: {} | 已答 {} 题",
            request.exam_id,
            request.answers.len()
        );

        let result = api.submit_result(request).await;
        let outcome = match result {
            Ok(response) => {
                self.delivered.store(true, Ordering::SeqCst);
                info!("✅ 答卷已提交，成绩编号: {}", response.result_id);
                Ok(SubmissionReceipt {
                    result_id: response.result_id,
                    status: response.status,
                    submitted_at: Utc::now(),
                })
            }
            Err(e) => {
                let err = classify_submit_error(e);
                match &err {
                    SubmissionError::AlreadySubmitted => {
                        self.delivered.store(true, Ordering::SeqCst);
                        warn!("后端表示答卷已经提交过");
                    }
                    other => error!("❌ {}", other),
                }
                Err(err)
            }
        };

        drop(ticket);
        outcome
    }
}

/// 区分暂时性失败与终态失败
pub fn classify_submit_error(err: ApiError) -> SubmissionError {
    let already = err
        .message()
        .map(|m| m.to_lowercase().contains("already"))
        .unwrap_or(false);

    match err {
        ApiError::Unauthorized { .. } => SubmissionError::SessionExpired,
        ApiError::BadResponse { status: 409, .. } => SubmissionError::AlreadySubmitted,
        ApiError::BadResponse { .. } if already => SubmissionError::AlreadySubmitted,
        ApiError::BadResponse {
            status, message, ..
        } if (400..500).contains(&status) => SubmissionError::Rejected {
            status,
            message: message.unwrap_or_else(|| "validation failed".to_string()),
        },
        other => SubmissionError::Transient(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DurationUnit;
    use crate::infrastructure::memory_api::test_support::sample_fixture;
    use crate::infrastructure::{InMemoryExamApi, ScriptedFailure};
    use crate::models::ExamId;
    use crate::services::SessionStore;

    async fn loaded_store(api: Arc<InMemoryExamApi>) -> SessionStore {
        let mut store = SessionStore::new(api, DurationUnit::Seconds, 60);
        store.begin_attempt(&ExamId::new("exam-1")).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_answers_follow_question_order_and_skip_unanswered() {
        let api = Arc::new(InMemoryExamApi::new(sample_fixture(60)));
        let mut store = loaded_store(api).await;
        store.record_answer(2, "A").unwrap();
        store.record_answer(0, "D").unwrap();

        let answers = format_answers(store.attempt().unwrap());
        assert_eq!(
            answers,
            vec![
                AnswerEntry {
                    question: "q1".to_string(),
                    selected_option: "D".to_string()
                },
                AnswerEntry {
                    question: "q3".to_string(),
                    selected_option: "A".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_ticket_is_exclusive_until_dropped() {
        let pipeline = SubmissionPipeline::new();
        let ticket = pipeline.try_acquire().unwrap();
        assert!(pipeline.try_acquire().is_none());
        assert!(pipeline.is_in_flight());
        drop(ticket);
        assert!(pipeline.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_transient_failure_can_be_retried() {
        let api = Arc::new(InMemoryExamApi::new(sample_fixture(60)));
        api.fail_next_submission(ScriptedFailure::Network).await;
        let mut store = loaded_store(api.clone()).await;
        store.record_answer(1, "C").unwrap();
        let request = build_request(store.attempt().unwrap(), Vec::new());

        let pipeline = SubmissionPipeline::new();
        let ticket = pipeline.try_acquire().unwrap();
        let err = pipeline.deliver(api.as_ref(), ticket, &request).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(!pipeline.is_in_flight());

        let ticket = pipeline.try_acquire().unwrap();
        let receipt = pipeline.deliver(api.as_ref(), ticket, &request).await.unwrap();
        assert!(!receipt.result_id.is_empty());
        assert!(pipeline.is_delivered());
        assert!(pipeline.try_acquire().is_none());
        assert_eq!(api.submit_calls().await, 2);
    }

    #[test]
    fn test_classify_backend_rejections() {
        let bad = |status: u16, message: &str| ApiError::BadResponse {
            endpoint: "result".to_string(),
            status,
            message: Some(message.to_string()),
        };
        assert!(matches!(
            classify_submit_error(bad(409, "conflict")),
            SubmissionError::AlreadySubmitted
        ));
        assert!(matches!(
            classify_submit_error(bad(400, "Exam already submitted")),
            SubmissionError::AlreadySubmitted
        ));
        assert!(matches!(
            classify_submit_error(bad(422, "answers malformed")),
            SubmissionError::Rejected { status: 422, .. }
        ));
        assert!(classify_submit_error(bad(503, "down")).is_retryable());
        assert!(matches!(
            classify_submit_error(ApiError::Unauthorized {
                endpoint: "result".to_string(),
                status: 401
            }),
            SubmissionError::SessionExpired
        ));
    }
}
