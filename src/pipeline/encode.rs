//! SSE relay encoding (events -> text frames).

use crate::types::StreamEvent;
use crate::Error;
use serde_json::{json, Value};

/// Render a JSON payload as one SSE frame.
///
/// The `event:` line is omitted for the default `message` type.
pub fn format_sse_event(payload: &Value, event_type: &str) -> String {
    let data = serde_json::to_string(payload).unwrap_or_else(|_| "null".to_string());
    if event_type.is_empty() || event_type == "message" {
        format!("data: {}\n\n", data)
    } else {
        format!("event: {}\ndata: {}\n\n", event_type, data)
    }
}

/// Render a reconciled event for a downstream consumer.
pub fn encode_event(event: &StreamEvent) -> String {
    let payload = serde_json::to_value(event).unwrap_or(Value::Null);
    format_sse_event(&payload, "message")
}

/// Render an error as a terminal `failed` frame.
pub fn encode_error(err: &Error) -> String {
    let payload = json!({
        "status": "failed",
        "error": err.to_string(),
        "error_type": err.type_name(),
    });
    format_sse_event(&payload, "error")
}
