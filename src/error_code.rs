//! Standard error codes and failure categories.
//!
//! Every [`crate::Error`] maps onto one [`StandardErrorCode`], which carries
//! the retry semantics the client and the batch engine rely on.
//!
//! ## Error Code Categories
//!
//! | Prefix | Category    | Description                            |
//! |--------|-------------|----------------------------------------|
//! | E1xxx  | client      | Request-side errors                    |
//! | E2xxx  | rate        | Rate limit and quota errors            |
//! | E3xxx  | server      | Vendor-side and stream errors          |
//! | E9xxx  | unknown     | Catch-all / unclassified               |
//!
//! ## Example
//!
//! ```rust
//! use genaipro_veo::error_code::StandardErrorCode;
//!
//! let code = StandardErrorCode::from_http_status(402);
//! assert_eq!(code.code(), "E2002");
//! assert!(!code.retryable());
//! assert_eq!(code.category(), "rate");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Standard error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardErrorCode {
    /// E1001: Malformed request, invalid parameters, or missing required fields
    InvalidRequest,
    /// E1002: Invalid, expired, or missing API key
    Authentication,
    /// E1003: Request refused (the vendor answers 403 when its reCAPTCHA gate trips)
    PermissionDenied,
    /// E1004: Requested endpoint or resource does not exist
    NotFound,
    /// E1005: Upload exceeds the payload size limit
    RequestTooLarge,
    /// E1006: Prompt or input rejected by the vendor's content policy
    ContentPolicy,
    /// E2001: Request rate limit exceeded
    RateLimited,
    /// E2002: Account credits exhausted
    QuotaExhausted,
    /// E3001: Internal server error on vendor side
    ServerError,
    /// E3002: Vendor temporarily overloaded or behind a failing gateway
    Overloaded,
    /// E3003: Request timed out or the connection failed
    Timeout,
    /// E3004: Event stream went silent or closed before a terminal event
    StreamInterrupted,
    /// E3005: Vendor reported that the generation failed
    GenerationFailed,
    /// E9999: Error could not be classified
    Unknown,
}

impl StandardErrorCode {
    /// Returns the canonical code string (e.g., `"E1001"`).
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "E1001",
            Self::Authentication => "E1002",
            Self::PermissionDenied => "E1003",
            Self::NotFound => "E1004",
            Self::RequestTooLarge => "E1005",
            Self::ContentPolicy => "E1006",
            Self::RateLimited => "E2001",
            Self::QuotaExhausted => "E2002",
            Self::ServerError => "E3001",
            Self::Overloaded => "E3002",
            Self::Timeout => "E3003",
            Self::StreamInterrupted => "E3004",
            Self::GenerationFailed => "E3005",
            Self::Unknown => "E9999",
        }
    }

    /// Returns the standard name (e.g., `"invalid_request"`).
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::Authentication => "authentication",
            Self::PermissionDenied => "permission_denied",
            Self::NotFound => "not_found",
            Self::RequestTooLarge => "request_too_large",
            Self::ContentPolicy => "content_policy",
            Self::RateLimited => "rate_limited",
            Self::QuotaExhausted => "quota_exhausted",
            Self::ServerError => "server_error",
            Self::Overloaded => "overloaded",
            Self::Timeout => "timeout",
            Self::StreamInterrupted => "stream_interrupted",
            Self::GenerationFailed => "generation_failed",
            Self::Unknown => "unknown",
        }
    }

    /// Returns whether this error is retryable by default.
    #[inline]
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied
                | Self::RateLimited
                | Self::ServerError
                | Self::Overloaded
                | Self::Timeout
                | Self::StreamInterrupted
        )
    }

    /// Returns the category: `"client"`, `"rate"`, `"server"`, or `"unknown"`.
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidRequest
            | Self::Authentication
            | Self::PermissionDenied
            | Self::NotFound
            | Self::RequestTooLarge
            | Self::ContentPolicy => "client",
            Self::RateLimited | Self::QuotaExhausted => "rate",
            Self::ServerError
            | Self::Overloaded
            | Self::Timeout
            | Self::StreamInterrupted
            | Self::GenerationFailed => "server",
            Self::Unknown => "unknown",
        }
    }

    /// Maps an HTTP status code to the most likely `StandardErrorCode`.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::InvalidRequest,
            401 => Self::Authentication,
            402 => Self::QuotaExhausted,
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            408 => Self::Timeout,
            413 => Self::RequestTooLarge,
            429 => Self::RateLimited,
            500 => Self::ServerError,
            502 | 503 => Self::Overloaded,
            504 => Self::Timeout,
            s if (500..600).contains(&s) => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    /// Best-effort classification of a vendor failure message.
    ///
    /// The vendor reports generation failures as free text only.
    pub fn from_message(message: &str) -> Self {
        let m = message.to_lowercase();
        if m.contains("recaptcha") {
            Self::PermissionDenied
        } else if m.contains("quota") || m.contains("insufficient credit") {
            Self::QuotaExhausted
        } else if m.contains("unauthorized") || m.contains("invalid api key") {
            Self::Authentication
        } else if CONTENT_POLICY_PATTERNS.iter().any(|p| m.contains(p)) {
            Self::ContentPolicy
        } else if m.contains("rate limit") || m.contains("too many requests") {
            Self::RateLimited
        } else if m.contains("timeout") || m.contains("timed out") {
            Self::Timeout
        } else if m.contains("500") || m.contains("internal error") || m.contains("server error")
        {
            Self::ServerError
        } else if m.contains("502") || m.contains("503") || m.contains("overloaded") {
            Self::Overloaded
        } else {
            Self::GenerationFailed
        }
    }
}

impl fmt::Display for StandardErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

const CONTENT_POLICY_PATTERNS: &[&str] = &[
    "content policy",
    "blocked",
    "inappropriate",
    "violates",
    "not allowed",
];

const PERMANENT_PATTERNS: &[&str] = &[
    "content policy",
    "blocked",
    "authentication",
    "unauthorized",
    "forbidden",
    "invalid api key",
    "account suspended",
    "inappropriate",
    "violates",
    "not allowed",
];

const RETRYABLE_PATTERNS: &[&str] = &[
    "timeout",
    "timed out",
    "rate limit",
    "too many requests",
    "server error",
    "internal error",
    "503",
    "502",
    "500",
    "connection",
    "network",
    "temporarily",
    "try again",
    "overloaded",
    "recaptcha",
];

/// How a failed batch item should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Don't retry: content policy, auth.
    Permanent,
    /// Retry: timeouts, rate limits, server errors.
    Retryable,
    /// Retry with a warning.
    Unknown,
}

impl ErrorCategory {
    /// Categorize a free-text error. Permanent patterns win over retryable ones.
    pub fn from_message(message: &str) -> Self {
        let m = message.to_lowercase();
        if PERMANENT_PATTERNS.iter().any(|p| m.contains(p)) {
            return Self::Permanent;
        }
        if RETRYABLE_PATTERNS.iter().any(|p| m.contains(p)) {
            return Self::Retryable;
        }
        Self::Unknown
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Permanent => "permanent",
            Self::Retryable => "retryable",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
