//! 作答上下文
//!
//! 封装“谁在考、连着哪个后端、观察哪个浏览器”这一信息，构造时显式传给运行器

use std::fmt::Display;
use std::sync::Arc;

use crate::infrastructure::{AuthSession, BrowserHost, ExamApi};
use crate::models::CurrentUser;

/// 作答上下文
#[derive(Clone)]
pub struct SessionContext {
    /// 当前登录用户
    pub user: CurrentUser,

    /// 登录凭证，收到 401/403 时标记失效
    pub auth: AuthSession,

    /// 考试后端
    pub api: Arc<dyn ExamApi>,

    /// 浏览器信号来源
    pub host: Arc<dyn BrowserHost>,
}

impl SessionContext {
    pub fn new(
        user: CurrentUser,
        auth: AuthSession,
        api: Arc<dyn ExamApi>,
        host: Arc<dyn BrowserHost>,
    ) -> Self {
        Self {
            user,
            auth,
            api,
            host,
        }
    }
}

impl Display for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[考生 {}#{}]", self.user.name, self.user.id)
    }
}
