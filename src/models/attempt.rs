use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

use super::exam::{ExamId, Question};

/// 作答状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    NotStarted,
    Loading,
    Active,
    Submitting,
    Submitted,
    /// 最近一次提交失败；答案仍在内存中，可以重试
    Failed,
}

impl AttemptStatus {
    /// 是否接受作答
    pub fn accepts_answers(self) -> bool {
        matches!(self, AttemptStatus::Active | AttemptStatus::Failed)
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttemptStatus::NotStarted => "not_started",
            AttemptStatus::Loading => "loading",
            AttemptStatus::Active => "active",
            AttemptStatus::Submitting => "submitting",
            AttemptStatus::Submitted => "submitted",
            AttemptStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// 开始考试时取回的只读元数据
#[derive(Debug, Clone, PartialEq)]
pub struct ExamMeta {
    pub exam_id: ExamId,
    pub title: String,
    pub total_marks: u32,
    pub duration_seconds: u64,
    pub started_at: DateTime<Utc>,
}

/// 一次作答
///
/// 由考试运行器独占；`remaining_seconds` 只减不增，且始终不大于 `duration_seconds`。
#[derive(Debug, Clone)]
pub struct ExamAttempt {
    meta: ExamMeta,
    questions: Vec<Question>,
    answers: BTreeMap<usize, String>,
    remaining_seconds: u64,
    status: AttemptStatus,
}

impl ExamAttempt {
    pub fn new(meta: ExamMeta, questions: Vec<Question>) -> Self {
        let remaining_seconds = meta.duration_seconds;
        Self {
            meta,
            questions,
            answers: BTreeMap::new(),
            remaining_seconds,
            status: AttemptStatus::Active,
        }
    }

    pub fn meta(&self) -> &ExamMeta {
        &self.meta
    }

    pub fn exam_id(&self) -> &ExamId {
        &self.meta.exam_id
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn answers(&self) -> &BTreeMap<usize, String> {
        &self.answers
    }

    pub fn answer(&self, index: usize) -> Option<&str> {
        self.answers.get(&index).map(String::as_str)
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.remaining_seconds
    }

    pub fn status(&self) -> AttemptStatus {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: AttemptStatus) {
        self.status = status;
    }

    pub(crate) fn insert_answer(&mut self, index: usize, option: String) {
        self.answers.insert(index, option);
    }

    /// 剩余时间只允许减少
    pub(crate) fn set_remaining(&mut self, seconds: u64) {
        self.remaining_seconds = seconds.min(self.remaining_seconds);
    }
}
