//! 登录凭证 - 基础设施层
//!
//! 持有 Bearer token，并在收到 401/403 时发出“登录已失效”信号。
//! 全局登出由外层处理，考试核心只把它当作一次失败的操作。

use std::sync::Arc;

use tokio::sync::watch;
use tracing::warn;

#[derive(Clone)]
pub struct AuthSession {
    token: Arc<str>,
    expired: Arc<watch::Sender<bool>>,
}

impl AuthSession {
    pub fn new(token: impl Into<String>) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            token: Arc::from(token.into()),
            expired: Arc::new(tx),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn has_token(&self) -> bool {
        !self.token.is_empty()
    }

    /// 标记登录失效（只在第一次时记日志）
    pub fn mark_expired(&self) {
        let changed = self.expired.send_if_modified(|expired| {
            if *expired {
                false
            } else {
                *expired = true;
                true
            }
        });
        if changed {
            warn!("🔒 登录已失效，需要重新登录");
        }
    }

    pub fn is_expired(&self) -> bool {
        *self.expired.borrow()
    }

    /// 订阅登录失效信号
    pub fn expired_signal(&self) -> watch::Receiver<bool> {
        self.expired.subscribe()
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("has_token", &self.has_token())
            .field("expired", &self.is_expired())
            .finish()
    }
}
