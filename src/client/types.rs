use crate::client::signals::SignalsSnapshot;
use serde::Serialize;

/// Per-call facts about a request, for logging and diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct CallStats {
    pub endpoint: String,
    pub http_status: u16,
    /// Retries before the final attempt (non-streaming calls only).
    pub retry_count: u32,
    /// Time until the response head arrived.
    pub duration_ms: u128,
    pub client_request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_request_id: Option<String>,
    #[serde(skip)]
    pub signals: SignalsSnapshot,
}
