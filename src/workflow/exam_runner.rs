//! 考试运行器 - 流程层
//!
//! 核心职责：定义“一次作答”的完整状态机
//!
//! 状态顺序：
//! 1. NotStarted → Loading：拿到考试编号后向后端请求开始
//! 2. Loading → Active：题目和时长就绪，同时启动计时器和监考
//! 3. Active → Submitting：手动提交或时间到，只允许一次提交在途
//! 4. Submitting → Done(Success)：停止计时和监考，清空作答，返回仪表盘
//! 5. Submitting → Done(Failure)：保留答案，用户可以重试

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{StartError, SubmissionError};
use crate::models::{AttemptStatus, ExamId, ProctorEvent, SubmissionReceipt};
use crate::services::submission::build_request;
use crate::services::{
    BeginOutcome, CountdownTimer, ProctorMonitor, SessionStore, SubmissionPipeline,
};
use crate::workflow::messages::{
    Completion, Notice, QuestionView, Route, RunOutcome, RunReport, RunnerCommand, RunnerHandle,
    RunnerState, RunnerUpdate,
};
use crate::workflow::session_ctx::SessionContext;

/// 运行器内部事件
#[derive(Debug)]
enum RunnerEvent {
    Tick(u64),
    TimeExpired,
    Submitted(Result<SubmissionReceipt, SubmissionError>),
}

/// 考试运行器
///
/// - 独占本次作答的会话存储
/// - 持有唯一的计时器和监考器，激活时各启动一次，结束时各停止一次
/// - 所有答案写入都经由 `SessionStore::record_answer`
pub struct ExamRunner {
    ctx: SessionContext,
    store: SessionStore,
    timer: CountdownTimer,
    monitor: ProctorMonitor,
    pipeline: Arc<SubmissionPipeline>,

    commands: mpsc::UnboundedReceiver<RunnerCommand>,
    commands_open: bool,
    updates: mpsc::UnboundedSender<RunnerUpdate>,
    events_tx: mpsc::UnboundedSender<RunnerEvent>,
    events: mpsc::UnboundedReceiver<RunnerEvent>,
    proctor_tx: mpsc::UnboundedSender<ProctorEvent>,
    proctor_rx: mpsc::UnboundedReceiver<ProctorEvent>,

    state: RunnerState,
    current: usize,
    flagged: bool,
    proctor_log: Vec<ProctorEvent>,
    answered: usize,
    leave_requested: bool,
    /// 倒计时已到 0；之后答案只读，只允许重试提交
    time_expired: bool,

    start_error_redirect: Duration,
    submit_redirect: Duration,
}

impl ExamRunner {
    /// 创建运行器，返回命令句柄和更新接收端
    pub fn new(
        ctx: SessionContext,
        config: &Config,
    ) -> (Self, RunnerHandle, mpsc::UnboundedReceiver<RunnerUpdate>) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (updates, updates_rx) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        let (proctor_tx, proctor_rx) = mpsc::unbounded_channel();

        let runner = Self {
            store: SessionStore::new(
                ctx.api.clone(),
                config.duration_unit,
                config.default_duration_secs,
            ),
            timer: CountdownTimer::new(config.tick_interval()),
            monitor: ProctorMonitor::new(ctx.api.clone(), ctx.host.clone(), config),
            pipeline: Arc::new(SubmissionPipeline::new()),
            ctx,
            commands,
            commands_open: true,
            updates,
            events_tx,
            events,
            proctor_tx,
            proctor_rx,
            state: RunnerState::NotStarted,
            current: 0,
            flagged: false,
            proctor_log: Vec::new(),
            answered: 0,
            leave_requested: false,
            time_expired: false,
            start_error_redirect: config.start_error_redirect(),
            submit_redirect: config.submit_redirect(),
        };

        (runner, RunnerHandle::new(commands_tx), updates_rx)
    }

    /// 运行一次作答直到结束
    pub async fn run(mut self, exam_id: ExamId) -> RunReport {
        info!("{} 进入考试 {}", self.ctx, exam_id);
        self.set_state(RunnerState::Loading);

        if !self.ctx.user.is_student() {
            return self.start_failed(StartError::NotStudent);
        }

        let begun = match self.load(&exam_id).await {
            Some(result) => result,
            None => {
                info!("加载期间离开考试页面");
                return self.finish(RunOutcome::Abandoned);
            }
        };

        match begun {
            Ok(BeginOutcome::Started) => {}
            Ok(BeginOutcome::AlreadyGiven { title }) => {
                self.notify(Notice::info(format!("你已经完成过考试「{}」", title)));
                self.set_state(RunnerState::AlreadyGiven);
                return self.finish(RunOutcome::AlreadyGiven);
            }
            Err(e) => return self.start_failed(e),
        }

        self.activate();
        let outcome = self.active_loop().await;
        self.finish(outcome)
    }

    /// 开始请求与“离开”竞争；加载期间的其他命令被忽略
    async fn load(&mut self, exam_id: &ExamId) -> Option<Result<BeginOutcome, StartError>> {
        let store = &mut self.store;
        let commands = &mut self.commands;
        let begin = store.begin_attempt(exam_id);
        tokio::pin!(begin);

        loop {
            tokio::select! {
                result = &mut begin => return Some(result),
                command = commands.recv() => match command {
                    Some(RunnerCommand::Leave) | None => return None,
                    Some(other) => debug!("加载中，忽略命令 {:?}", other),
                },
            }
        }
    }

    fn activate(&mut self) {
        let Some(attempt) = self.store.attempt() else {
            return;
        };
        let exam_id = attempt.exam_id().clone();
        let duration = attempt.meta().duration_seconds;

        self.set_state(RunnerState::Active);

        let tick_tx = self.events_tx.clone();
        let expire_tx = self.events_tx.clone();
        self.timer.start(
            duration,
            move |remaining| {
                let _ = tick_tx.send(RunnerEvent::Tick(remaining));
            },
            move || {
                let _ = expire_tx.send(RunnerEvent::TimeExpired);
            },
        );
        self.monitor.activate(exam_id, Some(self.proctor_tx.clone()));

        self.push(RunnerUpdate::TimeLeft(duration));
        self.push_question();
    }

    async fn active_loop(&mut self) -> RunOutcome {
        loop {
            tokio::select! {
                command = self.commands.recv(), if self.commands_open => {
                    let command = command.unwrap_or_else(|| {
                        self.commands_open = false;
                        RunnerCommand::Leave
                    });
                    if let Some(outcome) = self.on_command(command) {
                        return outcome;
                    }
                }
                Some(event) = self.events.recv() => {
                    if let Some(outcome) = self.on_event(event) {
                        return outcome;
                    }
                }
                Some(event) = self.proctor_rx.recv() => self.on_proctor_event(event),
            }
        }
    }

    fn on_command(&mut self, command: RunnerCommand) -> Option<RunOutcome> {
        if let RunnerCommand::Leave = command {
            return self.on_leave();
        }

        let interactive = matches!(
            self.state,
            RunnerState::Active | RunnerState::Done(Completion::Failure)
        );
        if !interactive {
            debug!("状态 {:?} 下忽略命令 {:?}", self.state, command);
            return None;
        }

        match command {
            RunnerCommand::SelectOption(_) if self.time_expired => {
                warn!("考试时间已到，不能再修改答案");
                self.notify(Notice::error("考试时间已到，答案不能再修改"));
            }
            RunnerCommand::SelectOption(option) => {
                match self.store.record_answer(self.current, option) {
                    Ok(()) => self.push_question(),
                    Err(e) => warn!("无法记录答案: {}", e),
                }
            }
            RunnerCommand::Next => self.navigate_to(self.current.saturating_add(1)),
            RunnerCommand::Previous => self.navigate_to(self.current.saturating_sub(1)),
            RunnerCommand::JumpTo(index) => {
                if index < self.question_count() {
                    self.navigate_to(index);
                } else {
                    warn!("题目 {} 不存在，共 {} 题", index + 1, self.question_count());
                }
            }
            RunnerCommand::Submit => self.trigger_submit("手动提交"),
            RunnerCommand::Leave => {}
        }
        None
    }

    fn on_leave(&mut self) -> Option<RunOutcome> {
        info!("🚪 离开考试页面");
        self.leave_requested = true;
        self.timer.stop();
        self.monitor.teardown();

        if self.state == RunnerState::Submitting {
            info!("提交已发出，等待结果");
            return None;
        }
        Some(RunOutcome::Abandoned)
    }

    fn on_event(&mut self, event: RunnerEvent) -> Option<RunOutcome> {
        match event {
            RunnerEvent::Tick(remaining) => {
                self.store.set_remaining(remaining);
                if !self.leave_requested {
                    self.push(RunnerUpdate::TimeLeft(remaining));
                }
                None
            }
            RunnerEvent::TimeExpired => {
                self.time_expired = true;
                if self.leave_requested || self.state == RunnerState::Submitting {
                    debug!("时间到，但答卷已在提交中");
                    return None;
                }
                self.notify(Notice::info("考试时间到，答卷将自动提交"));
                self.trigger_submit("时间到");
                None
            }
            RunnerEvent::Submitted(result) => self.on_submitted(result),
        }
    }

    fn on_proctor_event(&mut self, event: ProctorEvent) {
        let flagged = event.event_type.is_suspicious();
        if flagged != self.flagged {
            self.flagged = flagged;
            self.push(RunnerUpdate::ProctorFlag(flagged));
        }
        self.proctor_log.push(event);
    }

    /// 手动提交和时间到共用的入口
    fn trigger_submit(&mut self, trigger: &str) {
        let ready = matches!(
            self.state,
            RunnerState::Active | RunnerState::Done(Completion::Failure)
        );
        if !ready {
            debug!("{}: 当前状态 {:?} 不能提交", trigger, self.state);
            return;
        }
        let Some(ticket) = self.pipeline.try_acquire() else {
            debug!("{}: 已有提交在途", trigger);
            return;
        };
        let Some(attempt) = self.store.attempt() else {
            warn!("{}: 没有可提交的作答", trigger);
            return;
        };

        info!("📤 {}，开始提交", trigger);
        let request = build_request(attempt, self.proctor_flags());
        self.answered = request.answers.len();
        self.store.set_status(AttemptStatus::Submitting);
        self.set_state(RunnerState::Submitting);

        let pipeline = self.pipeline.clone();
        let api = self.ctx.api.clone();
        let done_tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = pipeline.deliver(api.as_ref(), ticket, &request).await;
            let _ = done_tx.send(RunnerEvent::Submitted(result));
        });
    }

    fn on_submitted(
        &mut self,
        result: Result<SubmissionReceipt, SubmissionError>,
    ) -> Option<RunOutcome> {
        match result {
            Ok(receipt) => {
                self.wind_down();
                self.store.set_status(AttemptStatus::Submitted);
                self.clear_attempt();
                self.set_state(RunnerState::Done(Completion::Success));
                self.notify(Notice::success("答卷提交成功！"));
                self.redirect(self.submit_redirect);
                Some(RunOutcome::Submitted(receipt))
            }
            Err(SubmissionError::AlreadySubmitted) => {
                self.wind_down();
                self.clear_attempt();
                self.set_state(RunnerState::Done(Completion::Success));
                self.notify(Notice::info("这场考试的答卷已经提交过"));
                self.redirect(self.submit_redirect);
                Some(RunOutcome::AlreadySubmitted)
            }
            Err(e) => {
                if matches!(e, SubmissionError::SessionExpired) {
                    self.ctx.auth.mark_expired();
                }
                self.store.set_status(AttemptStatus::Failed);
                self.set_state(RunnerState::Done(Completion::Failure));
                self.notify(Notice::error(format!("提交答卷失败: {}", e)));

                if self.leave_requested {
                    warn!("已离开考试页面，放弃未提交的答案");
                    return Some(RunOutcome::Abandoned);
                }
                None
            }
        }
    }

    fn start_failed(mut self, err: StartError) -> RunReport {
        error!("❌ 开始考试失败: {}", err);
        if matches!(err, StartError::SessionExpired) {
            self.ctx.auth.mark_expired();
        }
        self.notify(Notice::error(format!("开始考试失败: {}", err)));
        self.set_state(RunnerState::StartFailed);
        self.redirect(self.start_error_redirect);
        self.finish(RunOutcome::StartFailed(err))
    }

    /// 所有退出路径都经过这里：停止计时和监考，清空作答
    fn finish(mut self, outcome: RunOutcome) -> RunReport {
        self.wind_down();
        self.clear_attempt();
        while let Ok(event) = self.proctor_rx.try_recv() {
            self.proctor_log.push(event);
        }

        info!(
            "🏁 作答结束: {:?} | 已答 {} 题 | 监考事件 {} 个",
            self.state,
            self.answered,
            self.proctor_log.len()
        );

        RunReport {
            outcome,
            proctor_events: self.proctor_log,
            answered: self.answered,
            attempt_cleared: self.store.is_empty(),
        }
    }

    fn wind_down(&mut self) {
        self.timer.stop();
        self.monitor.teardown();
    }

    /// 每次作答只清空一次
    fn clear_attempt(&mut self) {
        let Some(attempt) = self.store.attempt() else {
            return;
        };
        self.answered = attempt.answered_count();
        self.store.clear();
    }

    /// 监考标记：出现过的可疑事件类型，按首次出现的顺序
    fn proctor_flags(&self) -> Vec<String> {
        let mut flags: Vec<String> = Vec::new();
        for event in &self.proctor_log {
            let name = event.event_type.as_str();
            if event.event_type.is_suspicious() && !flags.iter().any(|f| f == name) {
                flags.push(name.to_string());
            }
        }
        flags
    }

    fn question_count(&self) -> usize {
        self.store
            .attempt()
            .map(|a| a.question_count())
            .unwrap_or(0)
    }

    fn navigate_to(&mut self, index: usize) {
        let last = self.question_count().saturating_sub(1);
        self.current = index.min(last);
        self.push_question();
    }

    fn push_question(&self) {
        let Some(attempt) = self.store.attempt() else {
            return;
        };
        let Some(question) = attempt.question(self.current) else {
            return;
        };
        let view = QuestionView {
            index: self.current,
            total: attempt.question_count(),
            question_id: question.id.clone(),
            text: question.text.clone(),
            options: question.options.clone(),
            marks: question.marks,
            selected: attempt.answer(self.current).map(str::to_string),
            answered: (0..attempt.question_count())
                .map(|i| attempt.answer(i).is_some())
                .collect(),
        };
        self.push(RunnerUpdate::Question(view));
    }

    fn set_state(&mut self, state: RunnerState) {
        if self.state != state {
            debug!("状态: {:?} → {:?}", self.state, state);
            self.state = state;
            self.push(RunnerUpdate::State(state));
        }
    }

    fn notify(&self, notice: Notice) {
        self.push(RunnerUpdate::Notice(notice));
    }

    fn redirect(&self, after: Duration) {
        self.push(RunnerUpdate::Redirect {
            route: Route::Dashboard,
            after,
        });
    }

    fn push(&self, update: RunnerUpdate) {
        // 界面已经关闭时更新无处可去
        let _ = self.updates.send(update);
    }
}
