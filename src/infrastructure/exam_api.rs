//! 考试后端 API - 基础设施层
//!
//! `ExamApi` 是考试核心与 REST 后端之间唯一的边界；
//! `HttpExamApi` 用 reqwest 实现它，每个请求都带 Bearer 凭证。

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::ApiError;
use crate::infrastructure::auth::AuthSession;
use crate::models::{
    CurrentUser, ExamId, ProctorEvent, Question, ResultReport, StartExamResponse, SubmitRequest,
    SubmitResponse,
};

/// 考试核心用到的后端操作
#[async_trait]
pub trait ExamApi: Send + Sync {
    /// `GET /auth/me`
    async fn current_user(&self) -> Result<CurrentUser, ApiError>;

    /// `GET /exam/start/{id}`
    async fn start_exam(&self, exam_id: &ExamId) -> Result<StartExamResponse, ApiError>;

    /// `GET /question/exam/{id}`，开始响应里没有题目时使用
    async fn exam_questions(&self, exam_id: &ExamId) -> Result<Vec<Question>, ApiError>;

    /// `POST /result`
    async fn submit_result(&self, request: &SubmitRequest) -> Result<SubmitResponse, ApiError>;

    /// `POST /proctoring-events`，只需确认
    async fn report_proctor_event(&self, event: &ProctorEvent) -> Result<(), ApiError>;

    /// `GET /result/{id}`
    async fn fetch_result(&self, result_id: &str) -> Result<ResultReport, ApiError>;
}

/// 基于 reqwest 的后端客户端
pub struct HttpExamApi {
    client: Client,
    base_url: String,
    session: AuthSession,
}

impl HttpExamApi {
    pub fn new(config: &Config, session: AuthSession) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ApiError::ClientBuildFailed {
                source: Box::new(e),
            })?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// 发送请求并解析响应
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        endpoint: &str,
    ) -> Result<T, ApiError> {
        let body = self.send(request, endpoint).await?;
        decode_envelope(endpoint, body)
    }

    async fn send(&self, request: RequestBuilder, endpoint: &str) -> Result<Value, ApiError> {
        debug!("请求 {}", endpoint);

        let request = if self.session.has_token() {
            request.bearer_auth(self.session.token())
        } else {
            request
        };

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::network(endpoint, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::network(endpoint, e))?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|source| ApiError::JsonParseFailed {
                endpoint: endpoint.to_string(),
                source,
            })?
        };

        debug!("{} 返回 HTTP {}", endpoint, status.as_u16());
        check_status(endpoint, status, &body, &self.session)?;
        Ok(body)
    }
}

#[async_trait]
impl ExamApi for HttpExamApi {
    async fn current_user(&self) -> Result<CurrentUser, ApiError> {
        let endpoint = "auth/me";
        let body = self.send(self.client.get(self.url(endpoint)), endpoint).await?;
        // 形如 {status, data: {user}}
        let user = body
            .get("data")
            .and_then(|data| data.get("user"))
            .cloned()
            .ok_or_else(|| ApiError::EmptyResponse {
                endpoint: endpoint.to_string(),
            })?;
        serde_json::from_value(user).map_err(|source| ApiError::JsonParseFailed {
            endpoint: endpoint.to_string(),
            source,
        })
    }

    async fn start_exam(&self, exam_id: &ExamId) -> Result<StartExamResponse, ApiError> {
        let endpoint = format!("exam/start/{}", exam_id);
        self.send_json(self.client.get(self.url(&endpoint)), &endpoint)
            .await
    }

    async fn exam_questions(&self, exam_id: &ExamId) -> Result<Vec<Question>, ApiError> {
        let endpoint = format!("question/exam/{}", exam_id);
        let body = self.send(self.client.get(self.url(&endpoint)), &endpoint).await?;
        // 题目可能放在 data、data.questions 或 questions 下
        let questions = body
            .get("data")
            .map(|data| data.get("questions").unwrap_or(data))
            .or_else(|| body.get("questions"))
            .cloned()
            .unwrap_or(Value::Array(Vec::new()));
        serde_json::from_value(questions).map_err(|source| ApiError::JsonParseFailed {
            endpoint,
            source,
        })
    }

    async fn submit_result(&self, request: &SubmitRequest) -> Result<SubmitResponse, ApiError> {
        let endpoint = "result";
        self.send_json(self.client.post(self.url(endpoint)).json(request), endpoint)
            .await
    }

    async fn report_proctor_event(&self, event: &ProctorEvent) -> Result<(), ApiError> {
        let endpoint = "proctoring-events";
        self.send(self.client.post(self.url(endpoint)).json(event), endpoint)
            .await?;
        Ok(())
    }

    async fn fetch_result(&self, result_id: &str) -> Result<ResultReport, ApiError> {
        let endpoint = format!("result/{}", result_id);
        self.send_json(self.client.get(self.url(&endpoint)), &endpoint)
            .await
    }
}

/// 非 2xx 转成错误；401/403 同时标记登录失效
fn check_status(
    endpoint: &str,
    status: StatusCode,
    body: &Value,
    session: &AuthSession,
) -> Result<(), ApiError> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        session.mark_expired();
        return Err(ApiError::Unauthorized {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        });
    }

    if !status.is_success() {
        return Err(ApiError::BadResponse {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            message: body
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string),
        });
    }

    Ok(())
}

/// 后端响应统一为 `{status, data, message}`，有 `data` 时取 `data`
pub(crate) fn decode_envelope<T: DeserializeOwned>(
    endpoint: &str,
    body: Value,
) -> Result<T, ApiError> {
    if body.is_null() {
        return Err(ApiError::EmptyResponse {
            endpoint: endpoint.to_string(),
        });
    }

    let payload = match body {
        Value::Object(mut map) if map.contains_key("data") => {
            match map.remove("data").unwrap_or(Value::Null) {
                Value::Null => {
                    return Err(ApiError::EmptyResponse {
                        endpoint: endpoint.to_string(),
                    })
                }
                data => data,
            }
        }
        other => other,
    };

    serde_json::from_value(payload).map_err(|source| ApiError::JsonParseFailed {
        endpoint: endpoint.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_envelope_prefers_data() {
        let response: SubmitResponse = decode_envelope(
            "result",
            json!({"status": "success", "data": {"resultId": "r1", "status": "completed"}}),
        )
        .unwrap();
        assert_eq!(response.result_id, "r1");
    }

    #[test]
    fn test_decode_envelope_accepts_bare_payload() {
        let response: SubmitResponse =
            decode_envelope("result", json!({"resultId": "r2"})).unwrap();
        assert_eq!(response.result_id, "r2");
        assert!(response.status.is_none());
    }

    #[test]
    fn test_decode_envelope_rejects_null_data() {
        let err = decode_envelope::<SubmitResponse>("result", json!({"data": null})).unwrap_err();
        assert!(matches!(err, ApiError::EmptyResponse { .. }));
    }

    #[test]
    fn test_forbidden_marks_session_expired() {
        let session = AuthSession::new("t");
        let err = check_status("result", StatusCode::FORBIDDEN, &Value::Null, &session).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized { status: 403, .. }));
        assert!(session.is_expired());
    }

    #[test]
    fn test_error_message_is_extracted() {
        let session = AuthSession::new("t");
        let err = check_status(
            "exam/start/e1",
            StatusCode::BAD_REQUEST,
            &json!({"message": "Exam is not active"}),
            &session,
        )
        .unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.message(), Some("Exam is not active"));
        assert!(!session.is_expired());
    }
}
