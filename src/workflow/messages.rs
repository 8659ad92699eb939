//! 运行器与界面之间的消息

use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::StartError;
use crate::models::{ProctorEvent, SubmissionReceipt};

/// 界面发给运行器的命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerCommand {
    /// 为当前题目选择选项
    SelectOption(String),
    Next,
    Previous,
    /// 通过题目导航直接跳转
    JumpTo(usize),
    Submit,
    /// 离开考试页面
    Leave,
}

/// 界面持有的命令发送端
#[derive(Debug, Clone)]
pub struct RunnerHandle {
    commands: mpsc::UnboundedSender<RunnerCommand>,
}

impl RunnerHandle {
    pub(crate) fn new(commands: mpsc::UnboundedSender<RunnerCommand>) -> Self {
        Self { commands }
    }

    /// 运行器已经结束时返回 false
    pub fn send(&self, command: RunnerCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn select_option(&self, option: impl Into<String>) -> bool {
        self.send(RunnerCommand::SelectOption(option.into()))
    }

    pub fn next(&self) -> bool {
        self.send(RunnerCommand::Next)
    }

    pub fn previous(&self) -> bool {
        self.send(RunnerCommand::Previous)
    }

    pub fn jump_to(&self, index: usize) -> bool {
        self.send(RunnerCommand::JumpTo(index))
    }

    pub fn submit(&self) -> bool {
        self.send(RunnerCommand::Submit)
    }

    pub fn leave(&self) -> bool {
        self.send(RunnerCommand::Leave)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Success,
    /// 提交失败；答案保留，可以重试
    Failure,
}

/// 运行器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    NotStarted,
    Loading,
    Active,
    Submitting,
    Done(Completion),
    /// 已经考过，只展示提示
    AlreadyGiven,
    /// 无法开始，即将返回仪表盘
    StartFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// 给用户看的提示
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Dashboard,
}

/// 当前题目的展示数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionView {
    pub index: usize,
    pub total: usize,
    pub question_id: String,
    pub text: String,
    pub options: Vec<String>,
    pub marks: u32,
    pub selected: Option<String>,
    /// 题目导航：每道题是否已作答
    pub answered: Vec<bool>,
}

/// 运行器发给界面的更新
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerUpdate {
    State(RunnerState),
    Question(QuestionView),
    TimeLeft(u64),
    Notice(Notice),
    Redirect { route: Route, after: Duration },
    ProctorFlag(bool),
}

/// 一次运行的结局
#[derive(Debug)]
pub enum RunOutcome {
    Submitted(SubmissionReceipt),
    /// 后端判定已提交过
    AlreadySubmitted,
    /// 开始时后端表示已经考过
    AlreadyGiven,
    StartFailed(StartError),
    /// 离开页面，没有提交
    Abandoned,
}

/// 运行结束后的汇总
#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// 本地尽力而为的监考事件日志
    pub proctor_events: Vec<ProctorEvent>,
    /// 结束时已作答的题目数
    pub answered: usize,
    /// 结束后作答是否已经清空
    pub attempt_cleared: bool,
}

impl RunReport {
    /// 写入作答日志用的简短描述
    pub fn outcome_label(&self) -> &'static str {
        match self.outcome {
            RunOutcome::Submitted(_) => "submitted",
            RunOutcome::AlreadySubmitted => "already_submitted",
            RunOutcome::AlreadyGiven => "already_given",
            RunOutcome::StartFailed(_) => "start_failed",
            RunOutcome::Abandoned => "abandoned",
        }
    }
}
