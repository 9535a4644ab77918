use crate::message::{Request, Response};
use crate::middleware::{Middleware, Next};
use crate::router::dispatcher::DispatchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

pub const ACCESS_LOG_TARGET: &str = "routeline::access";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    ERROR,
    WARN,
    INFO,
}

/// One structured access-log line.
#[derive(Debug, Serialize)]
pub struct LogEntry<'a> {
    timestamp: String,
    level: LogLevel,
    request_id: Uuid,
    method: &'a str,
    path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    duration_micros: u128,
    message: &'a str,
}

impl<'a> LogEntry<'a> {
    pub fn new(
        level: LogLevel,
        request_id: Uuid,
        method: &'a str,
        path: &'a str,
        status: Option<u16>,
        duration_micros: u128,
        message: &'a str,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level,
            request_id,
            method,
            path,
            status,
            duration_micros,
            message,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or(String::from("Error serializing log entry"))
    }
}

/// Emits one JSON [`LogEntry`] per dispatch through the `log` facade.
///
/// Entries are logged under the [`ACCESS_LOG_TARGET`] target: successful
/// dispatches at `info`, server errors at `warn` and failures at `error`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessLog;

impl AccessLog {
    pub const NAME: &'static str = "access_log";
}

#[async_trait]
impl Middleware for AccessLog {
    async fn process(&self, request: Request, next: Next<'_>) -> Result<Response, DispatchError> {
        let started = Instant::now();
        let request_id = *request.id();
        let method = request.method().to_string();
        let path = request.path().to_string();

        let result = next.run(request).await;
        let elapsed = started.elapsed().as_micros();
        match &result {
            Ok(response) => {
                let status = response.status();
                let (level, message) = if status.is_server_error() {
                    (LogLevel::WARN, "completed with server error")
                } else {
                    (LogLevel::INFO, "completed")
                };
                let entry = LogEntry::new(level, request_id, &method, &path, Some(status.as_u16()), elapsed, message);
                match level {
                    LogLevel::WARN => log::warn!(target: ACCESS_LOG_TARGET, "{}", entry.to_json()),
                    _ => log::info!(target: ACCESS_LOG_TARGET, "{}", entry.to_json()),
                }
            }
            Err(e) => {
                let message = e.to_string();
                let entry = LogEntry::new(LogLevel::ERROR, request_id, &method, &path, None, elapsed, &message);
                log::error!(target: ACCESS_LOG_TARGET, "{}", entry.to_json());
            }
        }
        result
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{Endpoint, MiddlewareChain, SharedMiddleware};
    use crate::status::StatusCode;
    use std::sync::Arc;

    struct Fixed;

    #[async_trait]
    impl Endpoint for Fixed {
        async fn call(&self, _request: Request) -> Result<Response, DispatchError> {
            Ok(Response::new().with_status(StatusCode::NO_CONTENT))
        }
    }

    #[test]
    fn test_log_entry_json() {
        let id = Uuid::new_v4();
        let entry = LogEntry::new(LogLevel::INFO, id, "GET", "/users/1", Some(200), 42, "completed");
        let json: serde_json::Value = serde_json::from_str(&entry.to_json()).unwrap();
        assert_eq!(json["level"], "INFO");
        assert_eq!(json["request_id"], id.to_string());
        assert_eq!(json["path"], "/users/1");
        assert_eq!(json["status"], 200);
        assert!(chrono::DateTime::parse_from_rfc3339(json["timestamp"].as_str().unwrap()).is_ok());

        let failed = LogEntry::new(LogLevel::ERROR, id, "GET", "/", None, 1, "boom");
        assert!(!failed.to_json().contains("status"));
    }

    #[tokio::test]
    async fn test_access_log_passes_response_through() {
        let _ = env_logger::builder().is_test(true).try_init();
        let stages: Vec<SharedMiddleware> = vec![Arc::new(AccessLog)];
        let response = MiddlewareChain::run(&stages, Request::new("GET", "/"), &Fixed)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(AccessLog.name(), "access_log");
    }
}
