/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::{ExamId, ResultReport};
use crate::workflow::RunReport;

/// 初始化日志
///
/// 默认级别为 info，`verbose` 时为 debug；设置了 `RUST_LOG` 时以它为准。
/// 重复调用不会出错。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config, exam_id: &ExamId) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 限时考试模式");
    info!("📝 考试编号: {}", exam_id);
    info!("🔌 后端: {:?} ({})", config.backend, config.api_base_url);
    info!(
        "🖥️ 浏览器监考: {}",
        if config.use_browser { "开启" } else { "关闭" }
    );
    info!("{}", "=".repeat(60));
}

/// 打印作答结束统计
pub fn print_run_summary(report: &RunReport, journal_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 作答结束统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("结局: {}", report.outcome_label());
    info!("✏️ 已答: {} 题", report.answered);
    info!("🚨 监考事件: {} 个", report.proctor_events.len());
    info!("{}", "=".repeat(60));
    info!("\n作答日志已保存至: {}", journal_path);
}

/// 打印成绩报告
pub fn print_result_report(report: &ResultReport) {
    info!("\n{}", "─".repeat(60));
    info!("{}", report);
    for (i, answer) in report.answers.iter().enumerate() {
        info!(
            "  第 {} 题 [{}] 选 {} → {}",
            i + 1,
            truncate_text(&answer.question, 24),
            answer.selected_option.as_deref().unwrap_or("-"),
            if answer.is_correct { "✓" } else { "✗" }
        );
    }
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_counts_chars() {
        assert_eq!(truncate_text("短文本", 10), "短文本");
        assert_eq!(truncate_text("一二三四五六", 3), "一二三...");
    }
}
