use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 考试标识（后端的不透明 ID）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExamId(String);

impl ExamId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExamId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ExamId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
    #[serde(other)]
    Unknown,
}

/// 题型；计时作答流程只处理单选题
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    #[default]
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
    #[serde(other)]
    Other,
}

/// 一道题（加载后不可变）
///
/// 正确答案永远不会出现在客户端，评分由后端完成。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(alias = "questionText")]
    pub text: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub marks: u32,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default, rename = "type")]
    pub question_type: QuestionType,
}

/// `GET /exam/start/{id}` 的响应
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartExamResponse {
    #[serde(default, alias = "_id")]
    pub exam_id: Option<ExamId>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub total_marks: u32,
    /// 单位由配置决定（秒或分钟）
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub already_given: bool,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
}
