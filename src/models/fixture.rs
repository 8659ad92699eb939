use serde::{Deserialize, Serialize};

use super::exam::{Difficulty, ExamId, Question, QuestionType};
use super::user::CurrentUser;

/// 试卷文件中的题目，带有只留在后端的标准答案
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureQuestion {
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
    #[serde(default = "default_marks")]
    pub marks: u32,
    #[serde(default)]
    pub difficulty: Difficulty,
    /// 标准答案（选项原文）
    #[serde(default)]
    pub answer: Option<String>,
}

fn default_marks() -> u32 {
    1
}

impl FixtureQuestion {
    /// 下发给客户端的版本：去掉标准答案
    pub fn to_client_question(&self) -> Question {
        Question {
            id: self.id.clone(),
            text: self.text.clone(),
            options: self.options.clone(),
            marks: self.marks,
            difficulty: self.difficulty,
            question_type: QuestionType::MultipleChoice,
        }
    }
}

/// 内存后端使用的一场考试
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamFixture {
    pub exam_id: ExamId,
    pub title: String,
    /// 原样交给客户端，单位由客户端配置决定
    pub duration: u64,
    #[serde(default)]
    pub user: Option<CurrentUser>,
    pub questions: Vec<FixtureQuestion>,
}

impl ExamFixture {
    pub fn total_marks(&self) -> u32 {
        self.questions.iter().map(|q| q.marks).sum()
    }
}
