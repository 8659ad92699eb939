//! 终端前端
//!
//! 从标准输入读命令交给运行器，把运行器的更新打印到标准输出。
//!
//! 命令：`n` 下一题，`p` 上一题，`j <序号>` 跳转，`a <字母|文本>` 作答，
//! `s` 提交，`q` 离开；`!hide` `!show` `!blur` `!focus` `!fs-exit` `!fs-enter`
//! 在没有真实浏览器时模拟浏览器信号。

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::infrastructure::{BrowserSignal, ChannelBrowserHost};
use crate::workflow::{
    Completion, NoticeLevel, QuestionView, RunnerCommand, RunnerHandle, RunnerState, RunnerUpdate,
};

/// 一行输入的含义
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalInput {
    Command(RunnerCommand),
    Signal(BrowserSignal),
    Help,
}

pub const HELP: &str = "命令: n 下一题 | p 上一题 | j <序号> 跳转 | a <字母|文本> 作答 | s 提交 | q 离开\n\
模拟信号: !hide !show !blur !focus !fs-exit !fs-enter";

/// 解析一行输入；字母选项按当前题目的选项顺序换成选项文本
pub fn parse_command(line: &str, view: Option<&QuestionView>) -> Result<TerminalInput, String> {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    let signal = match head {
        "!hide" => Some(BrowserSignal::VisibilityChange { hidden: true }),
        "!show" => Some(BrowserSignal::VisibilityChange { hidden: false }),
        "!blur" => Some(BrowserSignal::WindowBlur),
        "!focus" => Some(BrowserSignal::WindowFocus),
        "!fs-exit" => Some(BrowserSignal::FullscreenChange { fullscreen: false }),
        "!fs-enter" => Some(BrowserSignal::FullscreenChange { fullscreen: true }),
        _ => None,
    };
    if let Some(signal) = signal {
        return Ok(TerminalInput::Signal(signal));
    }

    let command = match head {
        "n" => RunnerCommand::Next,
        "p" => RunnerCommand::Previous,
        "s" => RunnerCommand::Submit,
        "q" => RunnerCommand::Leave,
        "h" | "?" => return Ok(TerminalInput::Help),
        "j" => {
            let number: usize = rest
                .parse()
                .map_err(|_| format!("无效的题号: {:?}", rest))?;
            if number == 0 {
                return Err("题号从 1 开始".to_string());
            }
            RunnerCommand::JumpTo(number - 1)
        }
        "a" => {
            if rest.is_empty() {
                return Err("请给出选项".to_string());
            }
            RunnerCommand::SelectOption(resolve_option(rest, view))
        }
        "" => return Err("空命令".to_string()),
        other => return Err(format!("未知命令: {}", other)),
    };
    Ok(TerminalInput::Command(command))
}

fn resolve_option(input: &str, view: Option<&QuestionView>) -> String {
    let mut chars = input.chars();
    if let (Some(letter), None, Some(view)) = (chars.next(), chars.next(), view) {
        if letter.is_ascii_alphabetic() {
            let index = (letter.to_ascii_uppercase() as u8 - b'A') as usize;
            if let Some(option) = view.options.get(index) {
                return option.clone();
            }
        }
    }
    input.to_string()
}

/// 把一个更新渲染成要打印的文本
pub fn render(update: &RunnerUpdate) -> Option<String> {
    let text = match update {
        RunnerUpdate::State(RunnerState::Loading) => "⏳ 正在加载考试...".to_string(),
        RunnerUpdate::State(RunnerState::Submitting) => "📤 正在提交...".to_string(),
        RunnerUpdate::State(RunnerState::Done(Completion::Failure)) => {
            "⚠️ 提交失败，答案仍然保留，输入 s 重试".to_string()
        }
        RunnerUpdate::State(_) => return None,
        RunnerUpdate::Question(view) => render_question(view),
        RunnerUpdate::TimeLeft(seconds) => {
            if *seconds % 60 != 0 && *seconds > 10 {
                return None;
            }
            format!("⏱️ 剩余 {:02}:{:02}", seconds / 60, seconds % 60)
        }
        RunnerUpdate::Notice(notice) => {
            let icon = match notice.level {
                NoticeLevel::Info => "ℹ️",
                NoticeLevel::Success => "✅",
                NoticeLevel::Error => "❌",
            };
            format!("{} {}", icon, notice.message)
        }
        RunnerUpdate::Redirect { after, .. } => {
            format!("↩️ {} 毫秒后返回仪表盘", after.as_millis())
        }
        RunnerUpdate::ProctorFlag(true) => "🚨 已被监考标记".to_string(),
        RunnerUpdate::ProctorFlag(false) => "👁️ 监考标记已解除".to_string(),
    };
    Some(text)
}

fn render_question(view: &QuestionView) -> String {
    let mut out = format!(
        "\n第 {}/{} 题 ({} 分)\n{}\n",
        view.index + 1,
        view.total,
        view.marks,
        view.text
    );
    for (i, option) in view.options.iter().enumerate() {
        let letter = (b'A' + i as u8) as char;
        let mark = if view.selected.as_deref() == Some(option.as_str()) {
            "●"
        } else {
            "○"
        };
        out.push_str(&format!("  {} {}. {}\n", mark, letter, option));
    }
    let navigator: String = view
        .answered
        .iter()
        .enumerate()
        .map(|(i, answered)| {
            if i == view.index {
                '▶'
            } else if *answered {
                '■'
            } else {
                '□'
            }
        })
        .collect();
    out.push_str(&format!("导航: {}", navigator));
    out
}

/// 打印更新，记下当前题目供解析字母选项；重定向时按延迟等待
pub async fn render_updates(
    mut updates: mpsc::UnboundedReceiver<RunnerUpdate>,
    current_view: watch::Sender<Option<QuestionView>>,
) {
    while let Some(update) = updates.recv().await {
        if let Some(text) = render(&update) {
            println!("{}", text);
        }
        match update {
            RunnerUpdate::Question(view) => {
                current_view.send_replace(Some(view));
            }
            RunnerUpdate::Redirect { after, .. } => {
                tokio::time::sleep(after).await;
                println!("🏠 已返回仪表盘");
            }
            _ => {}
        }
    }
}

/// 逐行读取标准输入，直到运行器结束
pub async fn read_commands(
    handle: RunnerHandle,
    current_view: watch::Receiver<Option<QuestionView>>,
    signal_host: Option<Arc<ChannelBrowserHost>>,
) {
    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("标准输入已关闭");
                handle.leave();
                return;
            }
            Err(e) => {
                warn!("读取输入失败: {}", e);
                return;
            }
        };

        let parsed = {
            let view = current_view.borrow();
            parse_command(&line, (*view).as_ref())
        };
        match parsed {
            Ok(TerminalInput::Command(command)) => {
                if !handle.send(command) {
                    return;
                }
            }
            Ok(TerminalInput::Signal(signal)) => match &signal_host {
                Some(host) => {
                    host.emit(signal);
                }
                None => println!("连接了真实浏览器，不能模拟信号"),
            },
            Ok(TerminalInput::Help) => println!("{}", HELP),
            Err(message) => println!("{}\n{}", message, HELP),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::Notice;
    use std::time::Duration;

    fn view() -> QuestionView {
        QuestionView {
            index: 1,
            total: 3,
            question_id: "q2".to_string(),
            text: "2 + 2 = ?".to_string(),
            options: vec!["3".into(), "4".into(), "5".into()],
            marks: 1,
            selected: Some("4".to_string()),
            answered: vec![true, true, false],
        }
    }

    #[test]
    fn test_parse_navigation_and_submit() {
        assert_eq!(
            parse_command("n", None),
            Ok(TerminalInput::Command(RunnerCommand::Next))
        );
        assert_eq!(
            parse_command(" j 3 ", None),
            Ok(TerminalInput::Command(RunnerCommand::JumpTo(2)))
        );
        assert_eq!(
            parse_command("q", None),
            Ok(TerminalInput::Command(RunnerCommand::Leave))
        );
        assert!(parse_command("j 0", None).is_err());
        assert!(parse_command("j x", None).is_err());
        assert!(parse_command("zz", None).is_err());
    }

    #[test]
    fn test_answer_letter_maps_to_option_text() {
        let view = view();
        assert_eq!(
            parse_command("a b", Some(&view)),
            Ok(TerminalInput::Command(RunnerCommand::SelectOption("4".to_string())))
        );
        assert_eq!(
            parse_command("a Z", Some(&view)),
            Ok(TerminalInput::Command(RunnerCommand::SelectOption("Z".to_string())))
        );
        assert_eq!(
            parse_command("a four", Some(&view)),
            Ok(TerminalInput::Command(RunnerCommand::SelectOption("four".to_string())))
        );
        assert!(parse_command("a", Some(&view)).is_err());
    }

    #[test]
    fn test_parse_simulated_signals() {
        assert_eq!(
            parse_command("!hide", None),
            Ok(TerminalInput::Signal(BrowserSignal::VisibilityChange { hidden: true }))
        );
        assert_eq!(
            parse_command("!fs-exit", None),
            Ok(TerminalInput::Signal(BrowserSignal::FullscreenChange { fullscreen: false }))
        );
        assert_eq!(
            parse_command("!focus", None),
            Ok(TerminalInput::Signal(BrowserSignal::WindowFocus))
        );
        assert!(matches!(
            parse_command("!show", None),
            Ok(TerminalInput::Signal(BrowserSignal::VisibilityChange { hidden: false }))
        ));
    }

    #[test]
    fn test_render_question_marks_selection_and_navigator() {
        let text = render(&RunnerUpdate::Question(view())).unwrap();
        assert!(text.contains("第 2/3 题"));
        assert!(text.contains("● B. 4"));
        assert!(text.contains("导航: ■▶□"));
    }

    #[test]
    fn test_render_notices_and_time() {
        assert_eq!(
            render(&RunnerUpdate::Notice(Notice::success("ok"))).as_deref(),
            Some("✅ ok")
        );
        assert_eq!(render(&RunnerUpdate::TimeLeft(125)).as_deref(), None);
        assert_eq!(
            render(&RunnerUpdate::TimeLeft(120)).as_deref(),
            Some("⏱️ 剩余 02:00")
        );
        assert!(render(&RunnerUpdate::Redirect {
            route: crate::workflow::Route::Dashboard,
            after: Duration::from_millis(500)
        })
        .unwrap()
        .contains("500"));
    }
}
