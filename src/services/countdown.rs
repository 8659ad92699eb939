//! 倒计时 - 业务能力层
//!
//! 状态机：Idle → Running → Expired（或中途 Stopped）。
//! 运行中每个周期把剩余秒数减 1，归零时只调用一次“时间到”回调；
//! 停止后立刻不再计时，也不会再调用回调。页面重载会丢失剩余时间。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running,
    Expired,
    Stopped,
}

/// 单次 tick 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// 还剩多少秒
    Ticked(u64),
    /// 本次 tick 归零
    Expired,
    /// 已经过期，之后的 tick 不再有效果
    Inert,
}

/// 纯计数部分，不涉及时间
#[derive(Debug, Clone)]
pub struct Countdown {
    remaining: u64,
    expired: bool,
}

impl Countdown {
    pub fn new(seconds: u64) -> Self {
        Self {
            remaining: seconds,
            expired: false,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    pub fn tick(&mut self) -> TickOutcome {
        if self.expired {
            return TickOutcome::Inert;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.expired = true;
            TickOutcome::Expired
        } else {
            TickOutcome::Ticked(self.remaining)
        }
    }

    /// 时长为 0 时无需等待，直接过期
    fn expire_if_empty(&mut self) -> bool {
        if !self.expired && self.remaining == 0 {
            self.expired = true;
            return true;
        }
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSnapshot {
    pub state: TimerState,
    pub remaining_seconds: u64,
}

/// 由考试运行器持有的唯一计时器实例
pub struct CountdownTimer {
    period: Duration,
    snapshot: Option<watch::Receiver<TimerSnapshot>>,
    cancelled: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    stopped: bool,
}

impl CountdownTimer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            snapshot: None,
            cancelled: Arc::new(AtomicBool::new(false)),
            handle: None,
            stopped: false,
        }
    }

    /// 启动计时；每个实例只能启动一次
    ///
    /// `on_tick` 收到新的剩余秒数（包括最后的 0），`on_expire` 至多被调用一次。
    pub fn start<T, E>(&mut self, duration_seconds: u64, mut on_tick: T, on_expire: E) -> bool
    where
        T: FnMut(u64) + Send + 'static,
        E: FnOnce() + Send + 'static,
    {
        if self.snapshot.is_some() {
            warn!("计时器已经启动过，忽略重复启动");
            return false;
        }

        let (tx, rx) = watch::channel(TimerSnapshot {
            state: TimerState::Running,
            remaining_seconds: duration_seconds,
        });
        self.snapshot = Some(rx);

        let cancelled = self.cancelled.clone();
        let period = self.period;
        info!("⏱️ 计时开始: {} 秒", duration_seconds);

        self.handle = Some(tokio::spawn(async move {
            let mut countdown = Countdown::new(duration_seconds);
            let mut on_expire = Some(on_expire);

            let fire = |countdown: &Countdown, on_expire: &mut Option<E>| {
                tx.send_replace(TimerSnapshot {
                    state: TimerState::Expired,
                    remaining_seconds: countdown.remaining(),
                });
                if cancelled.load(Ordering::SeqCst) {
                    return;
                }
                if let Some(callback) = on_expire.take() {
                    info!("⏰ 考试时间到");
                    callback();
                }
            };

            if countdown.expire_if_empty() {
                fire(&countdown, &mut on_expire);
                return;
            }

            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                if cancelled.load(Ordering::SeqCst) {
                    debug!("计时器已取消");
                    return;
                }
                match countdown.tick() {
                    TickOutcome::Ticked(remaining) => {
                        on_tick(remaining);
                        tx.send_replace(TimerSnapshot {
                            state: TimerState::Running,
                            remaining_seconds: remaining,
                        });
                    }
                    TickOutcome::Expired => {
                        on_tick(0);
                        fire(&countdown, &mut on_expire);
                        return;
                    }
                    TickOutcome::Inert => return,
                }
            }
        }));

        true
    }

    /// 立即停止；之后不会再 tick，也不会调用过期回调
    pub fn stop(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.abort();
            self.stopped = true;
            debug!("计时器已停止");
        }
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        match &self.snapshot {
            None => TimerSnapshot {
                state: TimerState::Idle,
                remaining_seconds: 0,
            },
            Some(rx) => {
                let mut snapshot = *rx.borrow();
                if self.stopped && snapshot.state == TimerState::Running {
                    snapshot.state = TimerState::Stopped;
                }
                snapshot
            }
        }
    }

    pub fn state(&self) -> TimerState {
        self.snapshot().state
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tokio::time::{advance, sleep};

    #[test]
    fn test_countdown_strictly_decreases_then_expires_once() {
        let mut countdown = Countdown::new(3);
        assert_eq!(countdown.tick(), TickOutcome::Ticked(2));
        assert_eq!(countdown.tick(), TickOutcome::Ticked(1));
        assert_eq!(countdown.tick(), TickOutcome::Expired);
        for _ in 0..5 {
            assert_eq!(countdown.tick(), TickOutcome::Inert);
        }
        assert_eq!(countdown.remaining(), 0);
        assert!(countdown.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_expiry_exactly_once() {
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let expired = Arc::new(AtomicUsize::new(0));

        let mut timer = CountdownTimer::new(Duration::from_secs(1));
        let ticks_clone = ticks.clone();
        let expired_clone = expired.clone();
        assert!(timer.start(
            3,
            move |r| ticks_clone.lock().unwrap().push(r),
            move || {
                expired_clone.fetch_add(1, Ordering::SeqCst);
            },
        ));
        assert_eq!(timer.state(), TimerState::Running);

        sleep(Duration::from_secs(10)).await;

        assert_eq!(*ticks.lock().unwrap(), vec![2, 1, 0]);
        assert_eq!(expired.load(Ordering::SeqCst), 1);
        assert_eq!(timer.state(), TimerState::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_timer_never_expires() {
        let expired = Arc::new(AtomicUsize::new(0));
        let mut timer = CountdownTimer::new(Duration::from_secs(1));
        let expired_clone = expired.clone();
        timer.start(
            2,
            |_| {},
            move || {
                expired_clone.fetch_add(1, Ordering::SeqCst);
            },
        );

        advance(Duration::from_millis(1500)).await;
        timer.stop();
        sleep(Duration::from_secs(5)).await;

        assert_eq!(expired.load(Ordering::SeqCst), 0);
        assert_eq!(timer.state(), TimerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_duration_expires_immediately() {
        let expired = Arc::new(AtomicUsize::new(0));
        let mut timer = CountdownTimer::new(Duration::from_secs(1));
        let expired_clone = expired.clone();
        timer.start(
            0,
            |_| {},
            move || {
                expired_clone.fetch_add(1, Ordering::SeqCst);
            },
        );
        sleep(Duration::from_millis(1)).await;

        assert_eq!(expired.load(Ordering::SeqCst), 1);
        assert!(!timer.start(5, |_| {}, || {}));
    }

    #[test]
    fn test_idle_before_start() {
        let timer = CountdownTimer::new(Duration::from_secs(1));
        assert_eq!(timer.state(), TimerState::Idle);
    }
}
