use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppError, AppResult, ConfigError, FileError};

/// 后端返回的考试时长单位
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    #[default]
    Seconds,
    Minutes,
}

impl DurationUnit {
    /// 把后端的时长换算成秒
    pub fn to_seconds(self, value: u64) -> u64 {
        match self {
            DurationUnit::Seconds => value,
            DurationUnit::Minutes => value.saturating_mul(60),
        }
    }
}

impl std::str::FromStr for DurationUnit {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "seconds" | "s" => Ok(DurationUnit::Seconds),
            "minutes" | "m" => Ok(DurationUnit::Minutes),
            _ => Err(()),
        }
    }
}

/// 后端类型
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// 远程 REST 服务
    #[default]
    Http,
    /// 从 TOML 试卷加载的内存后端（离线演练）
    Memory,
}

impl std::str::FromStr for BackendKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(BackendKind::Http),
            "memory" => Ok(BackendKind::Memory),
            _ => Err(()),
        }
    }
}

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 后端 ---
    pub backend: BackendKind,
    pub api_base_url: String,
    /// Bearer 凭证
    pub auth_token: String,
    /// 内存后端使用的试卷文件
    pub exam_fixture: String,
    pub request_timeout_secs: u64,

    // --- 浏览器 ---
    /// 是否通过 CDP 连接浏览器观察焦点/可见性/全屏信号
    pub use_browser: bool,
    pub browser_debug_port: u16,
    /// 考试页面标题（用于在已打开的标签页中查找）
    pub target_title: String,
    pub browser_poll_interval_ms: u64,

    // --- 考试会话 ---
    pub tick_interval_ms: u64,
    /// 离开多少秒以上才记录“离开后返回”事件
    pub away_threshold_secs: u64,
    pub duration_unit: DurationUnit,
    pub default_duration_secs: u64,
    pub start_error_redirect_ms: u64,
    pub submit_redirect_ms: u64,

    // --- 日志 ---
    pub verbose_logging: bool,
    pub journal_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::Http,
            api_base_url: "http://localhost:10000/api".to_string(),
            auth_token: String::new(),
            exam_fixture: "exam.toml".to_string(),
            request_timeout_secs: 30,
            use_browser: false,
            browser_debug_port: 9222,
            target_title: "Exam".to_string(),
            browser_poll_interval_ms: 500,
            tick_interval_ms: 1000,
            away_threshold_secs: 5,
            duration_unit: DurationUnit::Seconds,
            default_duration_secs: 60,
            start_error_redirect_ms: 3000,
            submit_redirect_ms: 500,
            verbose_logging: false,
            journal_file: "exam_journal.txt".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 先读取 `EXAM_CONFIG` 指向的 TOML 文件（若设置），再用环境变量覆盖
    pub fn load() -> AppResult<Self> {
        match std::env::var("EXAM_CONFIG") {
            Ok(path) => Ok(Self::from_toml_file(Path::new(&path))?.with_env_overrides()),
            Err(_) => Ok(Self::from_env()),
        }
    }

    pub fn from_toml_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
        Self::from_toml_str(&content).map_err(|e| match e {
            AppError::File(FileError::TomlParseFailed { source, .. }) => {
                AppError::File(FileError::TomlParseFailed {
                    path: path.display().to_string(),
                    source,
                })
            }
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn with_env_overrides(self) -> Self {
        let default = self;
        Self {
            backend: env_parse("EXAM_BACKEND").unwrap_or(default.backend),
            api_base_url: std::env::var("EXAM_API_BASE_URL").unwrap_or(default.api_base_url),
            auth_token: std::env::var("EXAM_AUTH_TOKEN").unwrap_or(default.auth_token),
            exam_fixture: std::env::var("EXAM_FIXTURE").unwrap_or(default.exam_fixture),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS").unwrap_or(default.request_timeout_secs),
            use_browser: env_parse("USE_BROWSER").unwrap_or(default.use_browser),
            browser_debug_port: env_parse("BROWSER_DEBUG_PORT").unwrap_or(default.browser_debug_port),
            target_title: std::env::var("TARGET_TITLE").unwrap_or(default.target_title),
            browser_poll_interval_ms: env_parse("BROWSER_POLL_INTERVAL_MS").unwrap_or(default.browser_poll_interval_ms),
            tick_interval_ms: env_parse("TICK_INTERVAL_MS").unwrap_or(default.tick_interval_ms),
            away_threshold_secs: env_parse("AWAY_THRESHOLD_SECS").unwrap_or(default.away_threshold_secs),
            duration_unit: env_parse("DURATION_UNIT").unwrap_or(default.duration_unit),
            default_duration_secs: env_parse("DEFAULT_DURATION_SECS").unwrap_or(default.default_duration_secs),
            start_error_redirect_ms: env_parse("START_ERROR_REDIRECT_MS").unwrap_or(default.start_error_redirect_ms),
            submit_redirect_ms: env_parse("SUBMIT_REDIRECT_MS").unwrap_or(default.submit_redirect_ms),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(default.verbose_logging),
            journal_file: std::env::var("JOURNAL_FILE").unwrap_or(default.journal_file),
        }
    }

    fn validate(&self) -> AppResult<()> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "tick_interval_ms".to_string(),
                reason: "必须大于 0".to_string(),
            }
            .into());
        }
        if self.browser_poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "browser_poll_interval_ms".to_string(),
                reason: "必须大于 0".to_string(),
            }
            .into());
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn away_threshold(&self) -> Duration {
        Duration::from_secs(self.away_threshold_secs)
    }

    pub fn start_error_redirect(&self) -> Duration {
        Duration::from_millis(self.start_error_redirect_ms)
    }

    pub fn submit_redirect(&self) -> Duration {
        Duration::from_millis(self.submit_redirect_ms)
    }

    pub fn browser_poll_interval(&self) -> Duration {
        Duration::from_millis(self.browser_poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_overrides_only_given_fields() {
        let config = Config::from_toml_str(
            r#"
            backend = "memory"
            exam_fixture = "fixtures/demo.toml"
            duration_unit = "minutes"
            away_threshold_secs = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.backend, BackendKind::Memory);
        assert_eq!(config.exam_fixture, "fixtures/demo.toml");
        assert_eq!(config.duration_unit, DurationUnit::Minutes);
        assert_eq!(config.away_threshold(), Duration::from_secs(8));
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.api_base_url, "http://localhost:10000/api");
    }

    #[test]
    fn test_zero_tick_interval_is_rejected() {
        let err = Config::from_toml_str("tick_interval_ms = 0").unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_duration_unit_conversion() {
        assert_eq!(DurationUnit::Seconds.to_seconds(90), 90);
        assert_eq!(DurationUnit::Minutes.to_seconds(2), 120);
        assert_eq!("Minutes".parse::<DurationUnit>(), Ok(DurationUnit::Minutes));
    }
}
