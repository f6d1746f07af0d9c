use crate::error_code::{ErrorCategory, StandardErrorCode};
use crate::pipeline::PipelineError;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "request.prompt", "settings.base_url")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected range, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "request_validator", "history_poll")
    pub source: Option<String>,
    /// HTTP status returned by the vendor, when there was one
    pub status_code: Option<u16>,
    /// Client-side correlation id of the request
    pub request_id: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_status_code(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }
}

/// Unified error type for the VEO client.
///
/// The first five variants are the user-facing taxonomy: every generation
/// request ends in one of them or in success. The rest describe local
/// failures (bad input, bad configuration, I/O).
#[derive(Debug, Error)]
pub enum Error {
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("Quota exceeded: {message}")]
    QuotaExceeded { message: String },

    #[error("Network error: {message}{}", format_context(.context))]
    Network {
        message: String,
        context: ErrorContext,
    },

    #[error("Video generation failed: {message}")]
    VideoGeneration { message: String },

    #[error("SSE stream interrupted: {message}")]
    StreamInterrupted { message: String },

    #[error("Invalid image: {message}{}", format_context(.context))]
    InvalidImage {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Remote error: HTTP {status} ({code}): {message}")]
    Remote {
        status: u16,
        code: StandardErrorCode,
        message: String,
        retry_after_ms: Option<u64>,
    },

    #[error("Pipeline processing error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Network transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if let Some(status) = ctx.status_code {
        parts.push(format!("status: {}", status));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn authentication(msg: impl Into<String>) -> Self {
        Error::Authentication {
            message: msg.into(),
        }
    }

    pub fn quota_exceeded(msg: impl Into<String>) -> Self {
        Error::QuotaExceeded {
            message: msg.into(),
        }
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::network_with_context(msg, ErrorContext::new())
    }

    pub fn network_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Network {
            message: msg.into(),
            context,
        }
    }

    pub fn video_generation(msg: impl Into<String>) -> Self {
        Error::VideoGeneration {
            message: msg.into(),
        }
    }

    pub fn stream_interrupted(msg: impl Into<String>) -> Self {
        Error::StreamInterrupted {
            message: msg.into(),
        }
    }

    pub fn invalid_image(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::InvalidImage {
            message: msg.into(),
            context,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::validation_with_context(msg, ErrorContext::new())
    }

    /// Create a new validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::configuration_with_context(msg, ErrorContext::new())
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Network { context, .. }
            | Error::InvalidImage { context, .. }
            | Error::Validation { context, .. }
            | Error::Configuration { context, .. } => Some(context),
            _ => None,
        }
    }

    /// The canonical code for this error.
    pub fn standard_code(&self) -> StandardErrorCode {
        match self {
            Error::Authentication { .. } => StandardErrorCode::Authentication,
            Error::QuotaExceeded { .. } => StandardErrorCode::QuotaExhausted,
            Error::Network { context, .. } => context
                .status_code
                .map(StandardErrorCode::from_http_status)
                .unwrap_or(StandardErrorCode::Timeout),
            Error::VideoGeneration { message } => StandardErrorCode::from_message(message),
            Error::StreamInterrupted { .. } => StandardErrorCode::StreamInterrupted,
            Error::InvalidImage { .. } | Error::Validation { .. } => {
                StandardErrorCode::InvalidRequest
            }
            Error::Remote { code, .. } => *code,
            Error::Transport(_) => StandardErrorCode::Timeout,
            Error::Configuration { .. }
            | Error::Pipeline(_)
            | Error::Io(_)
            | Error::Serialization(_) => StandardErrorCode::Unknown,
        }
    }

    /// Whether a fresh attempt of the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        self.standard_code().retryable()
    }

    /// Coarse category used by the batch engine to report failures.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Authentication { .. }
            | Error::QuotaExceeded { .. }
            | Error::InvalidImage { .. }
            | Error::Validation { .. }
            | Error::Configuration { .. } => ErrorCategory::Permanent,
            Error::Network { .. } | Error::StreamInterrupted { .. } | Error::Transport(_) => {
                ErrorCategory::Retryable
            }
            other => ErrorCategory::from_message(&other.to_string()),
        }
    }

    /// Stable type name, as surfaced to relayed SSE consumers (`error_type`).
    pub fn type_name(&self) -> &'static str {
        match self {
            Error::Authentication { .. } => "AuthenticationError",
            Error::QuotaExceeded { .. } => "QuotaExceededError",
            Error::Network { .. } | Error::Transport(_) => "NetworkError",
            Error::VideoGeneration { .. } => "VideoGenerationError",
            Error::StreamInterrupted { .. } => "StreamInterruptedError",
            Error::InvalidImage { .. } => "InvalidImageError",
            Error::Validation { .. } => "ValidationError",
            Error::Configuration { .. } => "ConfigurationError",
            Error::Remote { .. } => "RemoteError",
            Error::Pipeline(_) => "PipelineError",
            Error::Io(_) => "IoError",
            Error::Serialization(_) => "SerializationError",
        }
    }
}
