//! HTTP status to error mapping

use crate::error_code::StandardErrorCode;
use crate::{Error, ErrorContext};
use serde_json::Value;

/// Where the failed response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Plain JSON request (quota, history). Eligible for retry.
    Request,
    /// Opening a generation stream. Never retried by the client.
    StreamOpen,
}

/// Map a non-success response to the error taxonomy.
///
/// 429 and 5xx become [`Error::Remote`] so the retry policy can see the
/// status and `Retry-After`. Anything else is final.
pub(crate) fn classify_status(
    status: u16,
    body: &str,
    retry_after_ms: Option<u64>,
    request_id: &str,
    phase: Phase,
) -> Error {
    match status {
        401 => Error::authentication("Invalid API key"),
        402 => Error::quota_exceeded("API quota exceeded"),
        429 | 500..=599 => Error::Remote {
            status,
            code: StandardErrorCode::from_http_status(status),
            message: body_message(body),
            retry_after_ms,
        },
        _ => match phase {
            Phase::Request => Error::network_with_context(
                format!("HTTP {}: {}", status, body.trim()),
                ErrorContext::new()
                    .with_status_code(status)
                    .with_request_id(request_id)
                    .with_source("request"),
            ),
            Phase::StreamOpen => {
                Error::video_generation(format!("HTTP {}: {}", status, body_message(body)))
            }
        },
    }
}

/// Best-effort extraction of a human-readable message from an error body.
///
/// The vendor answers with `{"message": ..}`, `{"error": ..}`,
/// `{"detail": ..}` or plain text depending on the route.
pub(crate) fn body_message(body: &str) -> String {
    let trimmed = body.trim();
    if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(trimmed) {
        for key in ["message", "error", "detail"] {
            match obj.get(key) {
                Some(Value::String(s)) if !s.is_empty() => return s.clone(),
                Some(Value::Object(inner)) => {
                    if let Some(m) = inner.get("message").and_then(Value::as_str) {
                        return m.to_string();
                    }
                }
                _ => {}
            }
        }
    }
    if trimmed.is_empty() {
        "empty response body".to_string()
    } else {
        trimmed.to_string()
    }
}
