use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chromiumoxide::Browser;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::browser;
use crate::config::{BackendKind, Config};
use crate::infrastructure::{
    AuthSession, BrowserHost, CdpBrowserHost, ChannelBrowserHost, ExamApi, HttpExamApi,
    InMemoryExamApi, JsExecutor,
};
use crate::models::{CurrentUser, ExamId};
use crate::orchestrator::terminal;
use crate::services::{AttemptJournal, JournalEntry};
use crate::utils::logging;
use crate::workflow::{ExamRunner, QuestionView, RunOutcome, RunReport, SessionContext};

/// 应用主结构
///
/// 只有这里持有浏览器和后端；向下只传能力。
pub struct App {
    config: Config,
    auth: AuthSession,
    api: Arc<dyn ExamApi>,
    host: Arc<dyn BrowserHost>,
    /// 没有真实浏览器时，终端可以向它投递模拟信号
    signal_host: Option<Arc<ChannelBrowserHost>>,
    user: CurrentUser,
    journal: AttemptJournal,
    _browser: Option<Browser>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        let auth = AuthSession::new(config.auth_token.clone());

        let api: Arc<dyn ExamApi> = match config.backend {
            BackendKind::Http => {
                if !auth.has_token() {
                    warn!("⚠️ 没有配置登录凭证 (EXAM_AUTH_TOKEN)，请求可能被拒绝");
                }
                info!("🔌 连接考试后端: {}", config.api_base_url);
                Arc::new(HttpExamApi::new(&config, auth.clone())?)
            }
            BackendKind::Memory => {
                info!("📁 加载离线试卷: {}", config.exam_fixture);
                Arc::new(
                    InMemoryExamApi::from_toml_file(Path::new(&config.exam_fixture))
                        .await
                        .context("加载离线试卷失败")?,
                )
            }
        };

        let mut signal_host = None;
        let mut cdp_browser = None;
        let host: Arc<dyn BrowserHost> = if config.use_browser {
            let (attached, page) = browser::attach_to_exam_page(
                config.browser_debug_port,
                &config.target_title,
                None,
            )
            .await?;
            cdp_browser = Some(attached);
            let executor = Arc::new(JsExecutor::new(page));
            Arc::new(CdpBrowserHost::spawn(executor, config.browser_poll_interval()))
        } else {
            let channel = Arc::new(ChannelBrowserHost::new(true));
            signal_host = Some(channel.clone());
            channel
        };

        let user = api.current_user().await.context("获取当前用户失败")?;
        info!("👤 当前用户: {} ({:?})", user.name, user.role);

        Ok(Self {
            journal: AttemptJournal::with_path(config.journal_file.clone()),
            config,
            auth,
            api,
            host,
            signal_host,
            user,
            _browser: cdp_browser,
        })
    }

    /// 运行一次作答
    pub async fn run(&self, exam_id: ExamId) -> Result<RunReport> {
        logging::log_startup(&self.config, &exam_id);

        let ctx = SessionContext::new(
            self.user.clone(),
            self.auth.clone(),
            self.api.clone(),
            self.host.clone(),
        );
        let (runner, handle, updates) = ExamRunner::new(ctx, &self.config);

        let (view_tx, view_rx) = watch::channel(None::<QuestionView>);
        let renderer = tokio::spawn(terminal::render_updates(updates, view_tx));
        let reader = tokio::spawn(terminal::read_commands(
            handle,
            view_rx,
            self.signal_host.clone(),
        ));

        let report = runner.run(exam_id.clone()).await;
        reader.abort();
        if let Err(e) = renderer.await {
            warn!("界面任务异常结束: {}", e);
        }

        self.record(&exam_id, &report).await;
        self.show_result(&report).await;

        if self.auth.is_expired() {
            error!("🔒 登录已失效，请重新登录后再进入考试");
        }
        logging::print_run_summary(&report, self.journal.path());

        Ok(report)
    }

    async fn record(&self, exam_id: &ExamId, report: &RunReport) {
        let entry = JournalEntry {
            exam_id: exam_id.clone(),
            outcome: report.outcome_label().to_string(),
            answered: report.answered,
            proctor_events: report.proctor_events.len(),
        };
        if let Err(e) = self.journal.append(&entry).await {
            warn!("写入作答日志失败: {:#}", e);
        }
    }

    async fn show_result(&self, report: &RunReport) {
        let RunOutcome::Submitted(receipt) = &report.outcome else {
            return;
        };
        match self.api.fetch_result(&receipt.result_id).await {
            Ok(result) => logging::print_result_report(&result),
            Err(e) => warn!("获取成绩报告失败: {}", e),
        }
    }
}
