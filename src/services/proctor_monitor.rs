//! 监考 - 业务能力层
//!
//! 只在作答进行期间观察浏览器信号，把每个信号转换成监考事件并独立上报。
//! 它是旁路上报者，从不阻塞或改变考试流程；上报失败只记日志。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::ProctorReportError;
use crate::infrastructure::{BrowserHost, BrowserSignal, ExamApi};
use crate::models::{ExamId, ProctorEvent, ProctorEventType};

/// 监考器
///
/// `activate` 与 `teardown` 各调用一次；teardown 之后，
/// 即使信号已在途也不会再产生事件。
pub struct ProctorMonitor {
    api: Arc<dyn ExamApi>,
    host: Arc<dyn BrowserHost>,
    away_threshold: Duration,
    active: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ProctorMonitor {
    pub fn new(api: Arc<dyn ExamApi>, host: Arc<dyn BrowserHost>, config: &Config) -> Self {
        Self {
            api,
            host,
            away_threshold: config.away_threshold(),
            active: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// 开始监考
    ///
    /// 订阅在返回前完成，之后到达的信号都不会丢失。
    /// `observer` 收到每个已产生的事件（尽力而为的本地日志）。
    pub fn activate(
        &mut self,
        exam_id: ExamId,
        observer: Option<mpsc::UnboundedSender<ProctorEvent>>,
    ) -> bool {
        if self.worker.is_some() {
            warn!("监考已经启动，忽略重复启动");
            return false;
        }

        let signals = self.host.subscribe();
        self.active.store(true, Ordering::SeqCst);
        info!("👁️ 监考已启动: {}", exam_id);

        let worker = MonitorWorker {
            exam_id,
            api: self.api.clone(),
            active: self.active.clone(),
            away_threshold: self.away_threshold,
            last_focus: Instant::now(),
            observer,
            reports: JoinSet::new(),
        };
        self.worker = Some(tokio::spawn(worker.run(self.host.clone(), signals)));
        true
    }

    /// 结束监考：立即退订
    ///
    /// 工作任务被中止，尚在途中的上报请求也随之取消，即使答卷已经提交成功。
    pub fn teardown(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            worker.abort();
            info!("👁️ 监考已结束");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Drop for ProctorMonitor {
    fn drop(&mut self) {
        self.teardown();
    }
}

struct MonitorWorker {
    exam_id: ExamId,
    api: Arc<dyn ExamApi>,
    active: Arc<AtomicBool>,
    away_threshold: Duration,
    last_focus: Instant,
    observer: Option<mpsc::UnboundedSender<ProctorEvent>>,
    reports: JoinSet<()>,
}

impl MonitorWorker {
    async fn run(
        mut self,
        host: Arc<dyn BrowserHost>,
        mut signals: broadcast::Receiver<BrowserSignal>,
    ) {
        if let Err(e) = host.request_fullscreen().await {
            warn!("全屏请求失败: {}", e);
            self.emit(
                ProctorEventType::FullscreenRequestFailed,
                "User denied fullscreen",
                None,
            );
        }

        loop {
            tokio::select! {
                signal = signals.recv() => match signal {
                    Ok(signal) => self.handle(signal),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("监考信号积压，丢弃了 {} 个信号", skipped);
                    }
                    Err(RecvError::Closed) => {
                        debug!("信号源已关闭");
                        break;
                    }
                },
                Some(_) = self.reports.join_next(), if !self.reports.is_empty() => {}
            }
        }

        while self.reports.join_next().await.is_some() {}
    }

    fn handle(&mut self, signal: BrowserSignal) {
        if !self.active.load(Ordering::SeqCst) {
            debug!("监考已结束，忽略信号 {:?}", signal);
            return;
        }

        match signal {
            BrowserSignal::FullscreenChange { fullscreen: false } => {
                self.emit(ProctorEventType::FullscreenExit, "User exited fullscreen", None);
            }
            BrowserSignal::FullscreenChange { fullscreen: true } => {
                self.emit(ProctorEventType::FullscreenEnter, "User entered fullscreen", None);
            }
            BrowserSignal::VisibilityChange { hidden: true } => {
                let away = self.last_focus.elapsed().as_secs_f64();
                self.emit(ProctorEventType::TabSwitch, "User switched tabs", Some(away));
            }
            BrowserSignal::VisibilityChange { hidden: false } => {
                self.last_focus = Instant::now();
                self.emit(ProctorEventType::TabFocus, "User returned to tab", None);
            }
            BrowserSignal::WindowBlur => {
                self.emit(ProctorEventType::WindowBlur, "Window lost focus", None);
            }
            BrowserSignal::WindowFocus => {
                let away = self.last_focus.elapsed();
                if away > self.away_threshold {
                    self.emit(
                        ProctorEventType::WindowFocusAfterDelay,
                        "User minimized or switched window",
                        Some(away.as_secs_f64()),
                    );
                }
                self.last_focus = Instant::now();
            }
        }
    }

    fn emit(&mut self, event_type: ProctorEventType, message: &str, away: Option<f64>) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }

        let event = ProctorEvent::new(self.exam_id.clone(), event_type, message, away);
        info!("🚨 监考事件: {} ({})", event_type, message);

        if let Some(observer) = &self.observer {
            // 观察者已经离开时只丢本地日志
            let _ = observer.send(event.clone());
        }

        let api = self.api.clone();
        self.reports.spawn(async move {
            if let Err(source) = api.report_proctor_event(&event).await {
                let err = ProctorReportError {
                    event_type: event.event_type,
                    source,
                };
                warn!("{}", err);
            }
        });
    }
}
