use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::exam::ExamId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProctorEventType {
    FullscreenExit,
    FullscreenEnter,
    TabSwitch,
    TabFocus,
    WindowBlur,
    WindowFocusAfterDelay,
    FullscreenRequestFailed,
}

impl ProctorEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProctorEventType::FullscreenExit => "fullscreen_exit",
            ProctorEventType::FullscreenEnter => "fullscreen_enter",
            ProctorEventType::TabSwitch => "tab_switch",
            ProctorEventType::TabFocus => "tab_focus",
            ProctorEventType::WindowBlur => "window_blur",
            ProctorEventType::WindowFocusAfterDelay => "window_focus_after_delay",
            ProctorEventType::FullscreenRequestFailed => "fullscreen_request_failed",
        }
    }

    /// 是否说明考生可能离开了考试环境
    pub fn is_suspicious(self) -> bool {
        !matches!(
            self,
            ProctorEventType::FullscreenEnter | ProctorEventType::TabFocus
        )
    }
}

impl fmt::Display for ProctorEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 监考事件；产生后立即上报，本地只保留尽力而为的日志
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProctorEvent {
    pub exam_id: ExamId,
    pub event_type: ProctorEventType,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    #[serde(rename = "duration", default, skip_serializing_if = "Option::is_none")]
    pub duration_away_seconds: Option<f64>,
}

impl ProctorEvent {
    pub fn new(
        exam_id: ExamId,
        event_type: ProctorEventType,
        message: impl Into<String>,
        duration_away_seconds: Option<f64>,
    ) -> Self {
        Self {
            exam_id,
            event_type,
            timestamp: Utc::now(),
            message: message.into(),
            duration_away_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_wire_names() {
        let event = ProctorEvent::new(
            ExamId::new("e1"),
            ProctorEventType::WindowFocusAfterDelay,
            "User minimized or switched window",
            Some(7.5),
        );
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["eventType"], "window_focus_after_delay");
        assert_eq!(value["examId"], "e1");
        assert_eq!(value["duration"], 7.5);
        assert!(value.get("durationAwaySeconds").is_none());
    }

    #[test]
    fn test_duration_omitted_when_absent() {
        let event = ProctorEvent::new(
            ExamId::new("e1"),
            ProctorEventType::WindowBlur,
            "Window lost focus",
            None,
        );
        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("duration").is_none());
    }

    #[test]
    fn test_only_return_events_are_not_suspicious() {
        assert!(ProctorEventType::TabSwitch.is_suspicious());
        assert!(ProctorEventType::FullscreenRequestFailed.is_suspicious());
        assert!(!ProctorEventType::TabFocus.is_suspicious());
        assert!(!ProctorEventType::FullscreenEnter.is_suspicious());
    }
}
