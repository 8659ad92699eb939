use crate::models::fixture::ExamFixture;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;
use tokio::fs;

/// 从 TOML 文件加载一场考试
pub async fn load_exam_fixture(toml_file_path: &Path) -> Result<ExamFixture> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let fixture = parse_exam_fixture(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    tracing::info!(
        "成功加载考试 {} ({} 道题)",
        fixture.title,
        fixture.questions.len()
    );

    Ok(fixture)
}

/// 解析并校验试卷内容
pub fn parse_exam_fixture(content: &str) -> Result<ExamFixture> {
    let fixture: ExamFixture = toml::from_str(content)?;

    let mut seen = HashSet::new();
    for question in &fixture.questions {
        if !seen.insert(question.id.as_str()) {
            anyhow::bail!("题目 ID 重复: {}", question.id);
        }
        if question.options.is_empty() {
            anyhow::bail!("题目 {} 没有选项", question.id);
        }
        if let Some(answer) = &question.answer {
            if !question.options.contains(answer) {
                anyhow::bail!("题目 {} 的答案 {} 不在选项中", question.id, answer);
            }
        }
    }

    Ok(fixture)
}
