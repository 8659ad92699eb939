//! 作答日志 - 业务能力层
//!
//! 只负责“追加一行作答记录”，不关心流程

use anyhow::{Context, Result};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::models::ExamId;

/// 一次作答结束时写入的记录
#[derive(Debug, Clone)]
pub struct JournalEntry {
    pub exam_id: ExamId,
    pub outcome: String,
    pub answered: usize,
    pub proctor_events: usize,
}

/// 作答日志
pub struct AttemptJournal {
    journal_file_path: String,
}

impl AttemptJournal {
    pub fn new() -> Self {
        Self {
            journal_file_path: "exam_journal.txt".to_string(),
        }
    }

    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            journal_file_path: path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.journal_file_path
    }

    /// 追加一条记录
    pub async fn append(&self, entry: &JournalEntry) -> Result<()> {
        debug!("写入作答日志: {:?}", entry);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.journal_file_path)
            .await
            .with_context(|| format!("无法打开作答日志: {}", self.journal_file_path))?;

        let line = format!(
            "{} | 考试 {} | {} | 已答 {} 题 | 监考事件 {} 个\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            entry.exam_id,
            entry.outcome,
            entry.answered,
            entry.proctor_events
        );

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }
}

impl Default for AttemptJournal {
    fn default() -> Self {
        Self::new()
    }
}
