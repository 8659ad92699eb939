use std::fmt;

use serde::{Deserialize, Serialize};

/// 单题批改结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedAnswer {
    pub question: String,
    #[serde(default)]
    pub selected_option: Option<String>,
    #[serde(default)]
    pub is_correct: bool,
    #[serde(default)]
    pub marks_obtained: u32,
}

/// `GET /result/{id}` 的成绩报告（评分在后端完成）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultReport {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub exam_title: Option<String>,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub total_marks: u32,
    #[serde(default)]
    pub answers: Vec<GradedAnswer>,
    #[serde(default)]
    pub status: Option<String>,
}

impl ResultReport {
    pub fn percentage(&self) -> f64 {
        if self.total_marks == 0 {
            return 0.0;
        }
        f64::from(self.score) * 100.0 / f64::from(self.total_marks)
    }

    pub fn correct_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_correct).count()
    }
}

impl fmt::Display for ResultReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} 得分 {}/{} ({:.1}%)，答对 {}/{} 题",
            self.exam_title.as_deref().unwrap_or("考试"),
            self.score,
            self.total_marks,
            self.percentage(),
            self.correct_count(),
            self.answers.len()
        )
    }
}
