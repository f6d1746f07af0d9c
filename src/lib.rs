//! # genaipro-veo
//!
//! Async client for the GenAIPro VEO video and image generation API.
//!
//! ## Overview
//!
//! Generation endpoints answer with a Server-Sent Events stream that reports
//! progress and, eventually, a result. The vendor's stream is loosely shaped:
//! progress arrives as JSON objects, results arrive either as an object with
//! `status: "completed"` or as a bare array of result objects, errors arrive
//! as `event: error` frames or `error` fields, and the connection may go
//! quiet. This crate folds all of that into one typed event sequence that
//! ends in exactly one terminal outcome.
//!
//! ## Key Features
//!
//! - **Generation Client**: [`VeoClient`] covers text-to-video, frames-to-video,
//!   ingredients-to-video, image creation, quota and history
//! - **Progress Reconciliation**: [`pipeline`] decodes SSE frames and applies the
//!   inactivity timeout
//! - **Resilience**: rate limiting and named retry strategies via [`resilience`]
//! - **Batching**: [`batch::AutomationEngine`] runs prompt lists with history
//!   fallback and resumable job files
//! - **Progress Reporting**: pluggable sinks via [`telemetry`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use genaipro_veo::types::{AspectRatio, TextToVideoRequest};
//! use genaipro_veo::VeoClientBuilder;
//!
//! #[tokio::main]
//! async fn main() -> genaipro_veo::Result<()> {
//!     let client = VeoClientBuilder::new().api_key("your-api-key").build()?;
//!
//!     let request = TextToVideoRequest::new("a paper boat drifting down a gutter")
//!         .aspect_ratio(AspectRatio::Portrait);
//!     let mut progress = client.text_to_video(request).await?.with_progress();
//!     while let Some(update) = progress.next().await {
//!         let update = update?;
//!         println!("{}%", update.progress);
//!         if update.is_complete {
//!             println!("{:?}", update.event.urls());
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | API client and builder |
//! | [`pipeline`] | SSE decoding and event reconciliation |
//! | [`types`] | Requests, events, results, account data |
//! | [`batch`] | Batch automation and job persistence |
//! | [`resilience`] | Rate limiter and retry strategies |
//! | [`telemetry`] | Batch progress sinks |
//! | [`config`] | Settings from YAML, environment and keyring |
//! | [`transport`] | Shared HTTP connection pool |

pub mod batch;
pub mod client;
pub mod config;
pub mod error_code;
pub mod pipeline;
pub mod resilience;
pub mod telemetry;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use client::{CallStats, GenerationStream, VeoClient, VeoClientBuilder};
pub use config::Settings;
pub use error_code::{ErrorCategory, StandardErrorCode};
pub use telemetry::{ProgressEvent, ProgressSink};
pub use types::{GenerationResult, GenerationStatus, StreamEvent};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `Result<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
