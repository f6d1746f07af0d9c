//! Batch progress reporting.
//!
//! The automation engine never prints; it reports [`ProgressEvent`]s to a
//! [`ProgressSink`]. Applications pick the destination.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ProgressEvent`] | Typed progress event enum |
//! | [`ProgressSink`] | Trait for progress destinations |
//! | [`NoopProgressSink`] | Default no-op sink |
//! | [`InMemoryProgressSink`] | In-memory sink for testing |
//! | [`LoggingProgressSink`] | Emits events as `tracing` records |
//! | [`CompositeProgressSink`] | Multi-destination composite sink |

use crate::batch::ContentKind;
use crate::error_code::ErrorCategory;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{info, warn};

/// One progress notification from the automation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    BatchStarted {
        total: usize,
        content_type: ContentKind,
    },
    ItemStarted {
        id: String,
        prompt: String,
    },
    /// Percentage reported by the item's event stream.
    ItemProgress {
        id: String,
        progress: u8,
    },
    ItemCompleted {
        id: String,
        urls: Vec<String>,
    },
    ItemFailed {
        id: String,
        error: String,
        category: ErrorCategory,
    },
    BatchCompleted {
        completed: usize,
        failed: usize,
    },
    /// A multi-step pipeline moved on to `step` of `total_steps`.
    StepStarted {
        step: u8,
        total_steps: u8,
        name: String,
    },
}

impl ProgressEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::BatchStarted { .. } => "batch_started",
            Self::ItemStarted { .. } => "item_started",
            Self::ItemProgress { .. } => "item_progress",
            Self::ItemCompleted { .. } => "item_completed",
            Self::ItemFailed { .. } => "item_failed",
            Self::BatchCompleted { .. } => "batch_completed",
            Self::StepStarted { .. } => "step_started",
        }
    }

    pub fn item_id(&self) -> Option<&str> {
        match self {
            Self::ItemStarted { id, .. }
            | Self::ItemProgress { id, .. }
            | Self::ItemCompleted { id, .. }
            | Self::ItemFailed { id, .. } => Some(id),
            _ => None,
        }
    }
}

/// Destination for progress events.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, event: ProgressEvent) -> Result<()>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Drops every event.
pub struct NoopProgressSink;

#[async_trait]
impl ProgressSink for NoopProgressSink {
    async fn report(&self, _event: ProgressEvent) -> Result<()> {
        Ok(())
    }
}

pub fn noop_sink() -> Arc<dyn ProgressSink> {
    Arc::new(NoopProgressSink)
}

/// In-memory sink for testing.
pub struct InMemoryProgressSink {
    events: Mutex<Vec<ProgressEvent>>,
    max_events: usize,
}

impl InMemoryProgressSink {
    pub fn new(max: usize) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            max_events: max,
        }
    }

    pub fn get_events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn get_events_by_item(&self, item_id: &str) -> Vec<ProgressEvent> {
        self.get_events()
            .into_iter()
            .filter(|e| e.item_id() == Some(item_id))
            .collect()
    }

    pub fn event_types(&self) -> Vec<&'static str> {
        self.get_events().iter().map(|e| e.event_type()).collect()
    }

    pub fn len(&self) -> usize {
        self.get_events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ProgressSink for InMemoryProgressSink {
    async fn report(&self, event: ProgressEvent) -> Result<()> {
        let mut events = self
            .events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        events.push(event);
        if events.len() > self.max_events {
            events.remove(0);
        }
        Ok(())
    }
}

/// Turns events into `tracing` records.
#[derive(Default)]
pub struct LoggingProgressSink;

#[async_trait]
impl ProgressSink for LoggingProgressSink {
    async fn report(&self, event: ProgressEvent) -> Result<()> {
        match &event {
            ProgressEvent::BatchStarted {
                total,
                content_type,
            } => info!(total, content_type = content_type.as_str(), "batch started"),
            ProgressEvent::ItemStarted { id, .. } => info!(item = id.as_str(), "item started"),
            ProgressEvent::ItemProgress { id, progress } => {
                info!(item = id.as_str(), progress, "item progress")
            }
            ProgressEvent::ItemCompleted { id, urls } => {
                info!(item = id.as_str(), urls = urls.len(), "item completed")
            }
            ProgressEvent::ItemFailed {
                id,
                error,
                category,
            } => warn!(
                item = id.as_str(),
                category = category.as_str(),
                error = error.as_str(),
                "item failed"
            ),
            ProgressEvent::BatchCompleted { completed, failed } => {
                info!(completed, failed, "batch completed")
            }
            ProgressEvent::StepStarted {
                step,
                total_steps,
                name,
            } => info!(step, total_steps, name = name.as_str(), "step started"),
        }
        Ok(())
    }
}

/// Composite sink for multiple destinations.
#[derive(Default)]
pub struct CompositeProgressSink {
    sinks: Vec<Arc<dyn ProgressSink>>,
}

impl CompositeProgressSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

#[async_trait]
impl ProgressSink for CompositeProgressSink {
    async fn report(&self, event: ProgressEvent) -> Result<()> {
        for s in &self.sinks {
            if let Err(e) = s.report(event.clone()).await {
                warn!(error = %e, "progress sink failed");
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        for s in &self.sinks {
            let _ = s.close().await;
        }
        Ok(())
    }
}

static GLOBAL_SINK: once_cell::sync::Lazy<RwLock<Arc<dyn ProgressSink>>> =
    once_cell::sync::Lazy::new(|| RwLock::new(Arc::new(NoopProgressSink)));

/// Returns the globally configured progress sink.
pub fn get_progress_sink() -> Arc<dyn ProgressSink> {
    GLOBAL_SINK
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

/// Sets the global progress sink, used by engines built without an explicit one.
pub fn set_progress_sink(sink: Arc<dyn ProgressSink>) {
    *GLOBAL_SINK
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner()) = sink;
}
