use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::exam::ExamId;

/// 提交格式：`{question, selectedOption}`，按题目 ID 而非索引
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEntry {
    pub question: String,
    pub selected_option: String,
}

/// `POST /result` 的请求体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub exam_id: ExamId,
    pub answers: Vec<AnswerEntry>,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub proctor_flags: Vec<String>,
}

/// `POST /result` 的响应
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    #[serde(alias = "_id", alias = "id")]
    pub result_id: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// 提交成功后的回执，可用于查询成绩报告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub result_id: String,
    pub status: Option<String>,
    pub submitted_at: DateTime<Utc>,
}
