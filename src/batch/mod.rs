//! # Batch Automation Module
//!
//! Runs many prompts against the API unattended: bounded concurrency, a
//! client-side rate limit, stream-then-history result recovery, progress
//! events and resumable job files.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`AutomationEngine`] | Processes a list of [`BatchItem`]s |
//! | [`ContentKind`] | Images or videos, each with its own [`EngineTuning`] |
//! | [`ProcessingResult`] | Per-item outcome with error category |
//! | [`validate_prompts`] | Rejects prompts the vendor would refuse |
//! | [`JobStore`] | Saves and lists [`AutomationJob`]s |
//! | [`BrollPipeline`] | Images, then one video per image as its start frame |
//! | [`results_csv`] / [`failed_csv`] | CSV reports of a finished run |
//!
//! ## Example
//!
//! ```rust,no_run
//! use genaipro_veo::batch::{validate_prompts, AutomationEngine, BatchItem, ContentKind};
//! use genaipro_veo::types::AspectRatio;
//! use genaipro_veo::VeoClient;
//!
//! # async fn run() -> genaipro_veo::Result<()> {
//! let client = VeoClient::from_env()?;
//! let (items, rejected) = validate_prompts(BatchItem::from_lines("a red kite over dunes\n"));
//! for reason in rejected {
//!     eprintln!("{}", reason);
//! }
//! let engine = AutomationEngine::new(client, ContentKind::Images);
//! let report = engine.run(items, AspectRatio::Landscape).await;
//! println!("{} completed, {} failed", report.completed, report.failed);
//! # Ok(())
//! # }
//! ```

mod broll;
mod executor;
mod export;
mod item;
mod job;

pub use broll::{BrollPipeline, BrollResult};
pub use executor::{AutomationEngine, BatchReport};
pub use export::{broll_csv, failed_csv, items_from_csv, results_csv, URL_SEPARATOR};
pub use item::{
    validate_prompts, BatchItem, ContentKind, EngineTuning, ProcessingResult, MAX_PROMPT_CHARS,
    MIN_PROMPT_CHARS, STOPPED_MESSAGE,
};
pub use job::{AutomationJob, JobStatus, JobStore, JobSummary};
