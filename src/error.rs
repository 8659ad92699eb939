use thiserror::Error;

use crate::models::{ExamId, ProctorEventType};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 考试无法开始
    #[error("开始考试失败: {0}")]
    Start(#[from] StartError),
    /// 答卷提交失败
    #[error("提交答卷失败: {0}")]
    Submission(#[from] SubmissionError),
    /// 会话状态错误
    #[error("会话错误: {0}")]
    Session(#[from] SessionError),
    /// API 调用错误
    #[error("API错误: {0}")]
    Api(#[from] ApiError),
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
}

/// API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败（没有收到响应）
    #[error("API请求失败 ({endpoint}): {source}")]
    Network {
        endpoint: String,
        #[source]
        source: BoxError,
    },
    /// 登录已失效（401/403）
    #[error("登录已失效 ({endpoint}): HTTP {status}")]
    Unauthorized { endpoint: String, status: u16 },
    /// API 返回错误响应
    #[error("API返回错误响应 ({endpoint}): status={status}, message={message:?}")]
    BadResponse {
        endpoint: String,
        status: u16,
        message: Option<String>,
    },
    /// API 返回空结果
    #[error("API返回空结果: {endpoint}")]
    EmptyResponse { endpoint: String },
    /// JSON 解析失败
    #[error("JSON解析失败 ({endpoint}): {source}")]
    JsonParseFailed {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
    /// HTTP 客户端构建失败
    #[error("HTTP客户端构建失败: {source}")]
    ClientBuildFailed {
        #[source]
        source: BoxError,
    },
}

impl ApiError {
    /// 后端给出的错误信息
    pub fn message(&self) -> Option<&str> {
        match self {
            ApiError::BadResponse { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::BadResponse { status, .. } | ApiError::Unauthorized { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

/// 考试无法开始；不可重试，用户会被送回仪表盘
#[derive(Debug, Error)]
pub enum StartError {
    #[error("考试不存在: {exam_id}")]
    NotFound { exam_id: ExamId },
    #[error("考试当前不可作答: {message}")]
    ExamInactive { message: String },
    #[error("你已经完成过这场考试")]
    AlreadyCompleted,
    #[error("尚未报名这场考试")]
    NotEnrolled,
    #[error("只有学生可以参加考试")]
    NotStudent,
    #[error("考试没有任何题目")]
    NoQuestions,
    #[error("已有进行中的考试: {active}")]
    AttemptInProgress { active: ExamId },
    #[error("登录已失效，请重新登录")]
    SessionExpired,
    #[error("网络异常: {0}")]
    Network(#[source] ApiError),
    #[error("后端拒绝开始考试: {message}")]
    Rejected { message: String },
}

/// 提交失败；区分暂时性与终态
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// 网络或服务端暂时性故障，可以用内存中的答案重试
    #[error("暂时无法提交: {0}")]
    Transient(#[source] ApiError),
    /// 后端判定该考试已提交，视为接近成功
    #[error("答卷已经提交过")]
    AlreadySubmitted,
    /// 后端校验失败
    #[error("后端拒绝答卷 (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("登录已失效，请重新登录后再提交")]
    SessionExpired,
}

impl SubmissionError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SubmissionError::Transient(_))
    }
}

/// 监考事件上报失败；永远不影响考试流程
#[derive(Debug, Error)]
#[error("监考事件上报失败 ({event_type}): {source}")]
pub struct ProctorReportError {
    pub event_type: ProctorEventType,
    #[source]
    pub source: ApiError,
}

/// 会话存储上的非法操作
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("没有进行中的考试")]
    NoActiveAttempt,
    #[error("题目索引 {index} 超出范围 [0, {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("当前状态不接受作答: {status}")]
    NotAcceptingAnswers { status: String },
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("无法连接到浏览器 (端口: {port}): {source}")]
    ConnectionFailed {
        port: u16,
        #[source]
        source: BoxError,
    },
    #[error("创建页面失败: {source}")]
    PageCreationFailed {
        #[source]
        source: BoxError,
    },
    #[error("执行脚本失败: {source}")]
    ScriptExecutionFailed {
        #[source]
        source: BoxError,
    },
    #[error("全屏请求被拒绝: {reason}")]
    FullscreenDenied { reason: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置项 {field} 无效: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: BoxError,
    },
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: BoxError,
    },
}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        BrowserError::ScriptExecutionFailed {
            source: Box::new(err),
        }
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::File(FileError::TomlParseFailed {
            path: String::new(), // TOML错误本身不带路径
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }
}

impl ApiError {
    /// 创建网络请求失败错误
    pub fn network(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ApiError::Network {
            endpoint: endpoint.into(),
            source: Box::new(source),
        }
    }
}

impl BrowserError {
    /// 创建浏览器连接错误
    pub fn connection_failed(
        port: u16,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        BrowserError::ConnectionFailed {
            port,
            source: Box::new(source),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
