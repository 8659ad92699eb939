//! 浏览器信号 - 基础设施层
//!
//! 把全屏变化、可见性变化、窗口获得/失去焦点四类信号抽象成显式的订阅能力。
//! 订阅返回一个 broadcast 接收端，丢弃接收端即退订。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::BrowserError;
use crate::infrastructure::js_executor::JsExecutor;

const SIGNAL_CAPACITY: usize = 64;

/// 浏览器级信号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserSignal {
    FullscreenChange { fullscreen: bool },
    VisibilityChange { hidden: bool },
    WindowFocus,
    WindowBlur,
}

/// 浏览器宿主能力
#[async_trait]
pub trait BrowserHost: Send + Sync {
    /// 请求进入全屏
    async fn request_fullscreen(&self) -> Result<(), BrowserError>;

    /// 订阅四类信号
    fn subscribe(&self) -> broadcast::Receiver<BrowserSignal>;
}

/// 由调用方手动投递信号的宿主（终端模式与测试）
pub struct ChannelBrowserHost {
    signals: broadcast::Sender<BrowserSignal>,
    fullscreen_allowed: bool,
}

impl ChannelBrowserHost {
    pub fn new(fullscreen_allowed: bool) -> Self {
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self {
            signals,
            fullscreen_allowed,
        }
    }

    /// 投递一个信号，返回收到它的订阅者数量
    pub fn emit(&self, signal: BrowserSignal) -> usize {
        self.signals.send(signal).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.signals.receiver_count()
    }
}

#[async_trait]
impl BrowserHost for ChannelBrowserHost {
    async fn request_fullscreen(&self) -> Result<(), BrowserError> {
        if self.fullscreen_allowed {
            Ok(())
        } else {
            Err(BrowserError::FullscreenDenied {
                reason: "fullscreen is not available in this environment".to_string(),
            })
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<BrowserSignal> {
        self.signals.subscribe()
    }
}

/// 页面状态快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
struct PageSnapshot {
    hidden: bool,
    fullscreen: bool,
    focused: bool,
}

impl PageSnapshot {
    /// 两次快照之间发生的信号
    fn diff(&self, next: &PageSnapshot) -> Vec<BrowserSignal> {
        let mut signals = Vec::new();
        if self.fullscreen != next.fullscreen {
            signals.push(BrowserSignal::FullscreenChange {
                fullscreen: next.fullscreen,
            });
        }
        if self.hidden != next.hidden {
            signals.push(BrowserSignal::VisibilityChange {
                hidden: next.hidden,
            });
        }
        if self.focused != next.focused {
            signals.push(if next.focused {
                BrowserSignal::WindowFocus
            } else {
                BrowserSignal::WindowBlur
            });
        }
        signals
    }
}

const SNAPSHOT_SCRIPT: &str = r#"
(() => ({
    hidden: document.hidden,
    fullscreen: !!document.fullscreenElement,
    focused: document.hasFocus()
}))()
"#;

const FULLSCREEN_SCRIPT: &str = r#"
(async () => {
    try {
        await document.documentElement.requestFullscreen();
        return { ok: true, reason: null };
    } catch (err) {
        return { ok: false, reason: String(err && err.message || err) };
    }
})()
"#;

#[derive(Debug, Deserialize)]
struct FullscreenOutcome {
    ok: bool,
    reason: Option<String>,
}

/// 通过 CDP 轮询真实考试页面的宿主
pub struct CdpBrowserHost {
    executor: Arc<JsExecutor>,
    signals: broadcast::Sender<BrowserSignal>,
    poller: JoinHandle<()>,
}

impl CdpBrowserHost {
    /// 开始轮询页面状态；宿主被丢弃时停止
    pub fn spawn(executor: Arc<JsExecutor>, poll_interval: Duration) -> Self {
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
        let poller = tokio::spawn(poll_page(executor.clone(), signals.clone(), poll_interval));
        info!("👀 已开始观察考试页面 (间隔 {:?})", poll_interval);
        Self {
            executor,
            signals,
            poller,
        }
    }
}

impl Drop for CdpBrowserHost {
    fn drop(&mut self) {
        self.poller.abort();
    }
}

#[async_trait]
impl BrowserHost for CdpBrowserHost {
    async fn request_fullscreen(&self) -> Result<(), BrowserError> {
        let outcome: FullscreenOutcome = self.executor.eval_as(FULLSCREEN_SCRIPT).await?;
        if outcome.ok {
            Ok(())
        } else {
            Err(BrowserError::FullscreenDenied {
                reason: outcome.reason.unwrap_or_else(|| "unknown".to_string()),
            })
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<BrowserSignal> {
        self.signals.subscribe()
    }
}

async fn poll_page(
    executor: Arc<JsExecutor>,
    signals: broadcast::Sender<BrowserSignal>,
    poll_interval: Duration,
) {
    let mut previous: Option<PageSnapshot> = None;
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let snapshot: PageSnapshot = match executor.eval_as(SNAPSHOT_SCRIPT).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("读取页面状态失败: {}", e);
                continue;
            }
        };

        if let Some(prev) = previous {
            for signal in prev.diff(&snapshot) {
                debug!("页面信号: {:?}", signal);
                // 没有订阅者时丢弃
                let _ = signals.send(signal);
            }
        }
        previous = Some(snapshot);
    }
}
