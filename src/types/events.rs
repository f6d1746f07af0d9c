//! Generation progress events and terminal results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const DEFAULT_FAILURE_MESSAGE: &str = "Unknown error occurred";

/// Lifecycle status of a generation as reported by the vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Processing,
    Completed,
    Failed,
}

impl GenerationStatus {
    /// Parse a vendor status string. Anything not recognized is still in flight.
    pub fn from_wire(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Processing,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing)
    }
}

/// One normalized progress/result unit of a generation stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub status: GenerationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_percentage: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The payload exactly as the vendor sent it.
    #[serde(skip)]
    pub raw: Value,
}

impl StreamEvent {
    pub fn processing(percentage: Option<u8>) -> Self {
        Self {
            status: GenerationStatus::Processing,
            process_percentage: percentage.map(|p| p.min(100)),
            file_url: None,
            file_urls: Vec::new(),
            id: None,
            error: None,
            raw: Value::Null,
        }
    }

    pub fn completed(file_url: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            status: GenerationStatus::Completed,
            process_percentage: Some(100),
            file_url: Some(file_url.into()),
            file_urls: Vec::new(),
            id: Some(id.into()),
            error: None,
            raw: Value::Null,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: GenerationStatus::Failed,
            process_percentage: None,
            file_url: None,
            file_urls: Vec::new(),
            id: None,
            error: Some(message.into()),
            raw: Value::Null,
        }
    }

    /// Build an event from an object payload.
    ///
    /// `forced` overrides the status when the wire shape implies one (the
    /// array form never carries `status`). An `error` field always wins.
    pub fn from_object(obj: &Map<String, Value>, forced: Option<GenerationStatus>) -> Self {
        let error = obj.get("error").and_then(error_text);
        let file_url = obj
            .get("file_url")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let file_urls: Vec<String> = obj
            .get("file_urls")
            .and_then(Value::as_array)
            .map(|urls| {
                urls.iter()
                    .filter_map(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let wire_status = obj
            .get("status")
            .and_then(Value::as_str)
            .map(GenerationStatus::from_wire);
        let status = if error.is_some() {
            GenerationStatus::Failed
        } else if let Some(forced) = forced {
            forced
        } else if let Some(status) = wire_status {
            status
        } else if file_url.is_some() || !file_urls.is_empty() {
            GenerationStatus::Completed
        } else {
            GenerationStatus::Processing
        };

        let error = match status {
            GenerationStatus::Failed => {
                Some(error.unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()))
            }
            _ => error,
        };

        Self {
            status,
            process_percentage: obj.get("process_percentage").and_then(percentage),
            file_url,
            file_urls,
            id: obj.get("id").and_then(id_text),
            error,
            raw: Value::Object(obj.clone()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// All result URLs: `file_urls` when present, else the single `file_url`.
    pub fn urls(&self) -> Vec<String> {
        if !self.file_urls.is_empty() {
            self.file_urls.clone()
        } else {
            self.file_url.iter().cloned().collect()
        }
    }

    /// Read a vendor field that has no typed counterpart.
    pub fn raw_str(&self, key: &str) -> Option<&str> {
        self.raw.get(key).and_then(Value::as_str)
    }
}

fn error_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(o) => o
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(v.to_string())),
        Value::Bool(false) => None,
        other => Some(other.to_string()),
    }
}

fn id_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn percentage(v: &Value) -> Option<u8> {
    let raw = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok()?,
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    Some(raw.round().clamp(0.0, 100.0) as u8)
}

/// A finished generation's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedMedia {
    pub id: Option<String>,
    pub urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl GeneratedMedia {
    pub fn primary_url(&self) -> Option<&str> {
        self.urls.first().map(String::as_str)
    }
}

/// Terminal outcome of one generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum GenerationResult {
    Completed(GeneratedMedia),
    Failed { message: String },
}

impl GenerationResult {
    /// Derive a result from a terminal event; `None` for `processing` events.
    pub fn from_terminal(event: &StreamEvent) -> Option<Self> {
        match event.status {
            GenerationStatus::Processing => None,
            GenerationStatus::Failed => Some(Self::Failed {
                message: event
                    .error
                    .clone()
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
            }),
            GenerationStatus::Completed => Some(Self::Completed(GeneratedMedia {
                id: event.id.clone(),
                urls: event.urls(),
                prompt: event.raw_str("prompt").map(str::to_string),
                created_at: event.raw_str("created_at").map(str::to_string),
            })),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Convert a vendor-reported failure into [`crate::Error::VideoGeneration`].
    pub fn into_media(self) -> crate::Result<GeneratedMedia> {
        match self {
            Self::Completed(media) => Ok(media),
            Self::Failed { message } => Err(crate::Error::video_generation(message)),
        }
    }
}

/// A stream event annotated with carried-forward progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub event: StreamEvent,
    /// Last known percentage; events without one keep the previous value.
    pub progress: u8,
    pub is_complete: bool,
    pub is_processing: bool,
}
