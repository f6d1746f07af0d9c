//! Streaming pipeline: turns the raw body of a generation request into
//! uniform progress events.
//!
//! ## Pipeline Stages
//!
//! ```text
//! Raw Bytes → Decoder → Reconciler → StreamEvent
//!     │          │           │
//!   HTTP      SSE framing  object / array
//!   body      idle timeout  payload shapes
//! ```
//!
//! ## Submodules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`decode`] | SSE frame splitting with an inactivity bound |
//! | [`reconcile`] | Payload shapes to [`StreamEvent`], terminal detection |
//! | [`encode`] | Re-emitting events as SSE for relays |
//!
//! ## Example
//!
//! ```rust,no_run
//! use genaipro_veo::pipeline::Pipeline;
//! use std::time::Duration;
//!
//! let pipeline = Pipeline::new(Duration::from_secs(30))?;
//! // let events = pipeline.process_stream(byte_stream);
//! # Ok::<(), genaipro_veo::pipeline::PipelineError>(())
//! ```

pub mod decode;
pub mod encode;
pub mod reconcile;

#[cfg(test)]
mod tests;

use crate::types::StreamEvent;
use crate::BoxStream;
use std::time::Duration;

/// Default inactivity window of a generation stream.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Pipeline error types
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Pipeline that processes streaming responses
#[derive(Debug, Clone, Copy)]
pub struct Pipeline {
    idle_timeout: Duration,
}

impl Pipeline {
    pub fn new(idle_timeout: Duration) -> Result<Self, PipelineError> {
        if idle_timeout.is_zero() {
            return Err(PipelineError::Configuration(
                "stream idle timeout must be greater than zero".to_string(),
            ));
        }
        Ok(Self { idle_timeout })
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Process a byte stream through the pipeline
    pub fn process_stream(
        &self,
        input: BoxStream<'static, bytes::Bytes>,
    ) -> BoxStream<'static, StreamEvent> {
        let frames = decode::decode_stream(input, self.idle_timeout);
        reconcile::reconcile_stream(frames)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}
