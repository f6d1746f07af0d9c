//! Batch items, per-item results and prompt screening.

use crate::error_code::ErrorCategory;
use crate::types::GenerationStatus;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const MIN_PROMPT_CHARS: usize = 10;
pub const MAX_PROMPT_CHARS: usize = 2000;

/// Message recorded for items skipped after [`request_stop`](super::AutomationEngine::request_stop).
pub const STOPPED_MESSAGE: &str = "Processing stopped by user";

/// What a batch generates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Images,
    Videos,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Images => "images",
            Self::Videos => "videos",
        }
    }

    /// Defaults tuned for how long each kind takes on the vendor side.
    pub fn tuning(&self) -> EngineTuning {
        match self {
            Self::Images => EngineTuning {
                timeout: Duration::from_secs(10 * 60),
                initial_poll: Duration::from_secs(5),
                max_poll: Duration::from_secs(30),
                max_concurrent: 5,
                requests_per_minute: 30,
                ..EngineTuning::default()
            },
            Self::Videos => EngineTuning {
                timeout: Duration::from_secs(20 * 60),
                initial_poll: Duration::from_secs(5),
                max_poll: Duration::from_secs(45),
                max_concurrent: 3,
                requests_per_minute: 20,
                ..EngineTuning::default()
            },
        }
    }
}

impl std::str::FromStr for ContentKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "images" | "image" => Ok(Self::Images),
            "videos" | "video" => Ok(Self::Videos),
            other => Err(crate::Error::validation(format!(
                "unknown content kind '{}'",
                other
            ))),
        }
    }
}

/// Timing and concurrency knobs of the automation engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineTuning {
    /// Give up on an item's history polling after this long.
    pub timeout: Duration,
    pub initial_poll: Duration,
    /// Poll intervals grow by 1.5x up to this cap.
    pub max_poll: Duration,
    pub max_concurrent: usize,
    /// 0 disables the engine's own limiter.
    pub requests_per_minute: u32,
    /// Rows fetched per history lookup.
    pub history_page_size: u32,
    /// Re-open rejected streams using the retry strategy picked from the error.
    pub retry_stream_open: bool,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20 * 60),
            initial_poll: Duration::from_secs(5),
            max_poll: Duration::from_secs(45),
            max_concurrent: 3,
            requests_per_minute: 20,
            history_page_size: 10,
            retry_stream_open: true,
        }
    }
}

/// One prompt of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub id: String,
    pub prompt: String,
    /// Images or videos requested for this prompt.
    #[serde(default = "one")]
    pub count: u8,
    /// Start frame (videos) or reference image (images).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_image: Option<PathBuf>,
}

fn one() -> u8 {
    1
}

impl BatchItem {
    pub fn new(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            count: 1,
            reference_image: None,
        }
    }

    pub fn with_count(mut self, count: u8) -> Self {
        self.count = count;
        self
    }

    pub fn with_reference_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.reference_image = Some(path.into());
        self
    }

    /// Items from a text file, one prompt per non-blank line, ids `item_001`...
    pub fn from_lines(text: &str) -> Vec<Self> {
        text.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .enumerate()
            .map(|(i, prompt)| Self::new(format!("item_{:03}", i + 1), prompt))
            .collect()
    }
}

/// Outcome of one batch item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub id: String,
    pub prompt: String,
    pub status: GenerationStatus,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,
}

impl ProcessingResult {
    pub fn completed(item: &BatchItem, urls: Vec<String>) -> Self {
        Self {
            id: item.id.clone(),
            prompt: item.prompt.clone(),
            status: GenerationStatus::Completed,
            urls,
            error: None,
            error_category: None,
        }
    }

    pub fn failed(item: &BatchItem, error: impl Into<String>, category: Option<ErrorCategory>) -> Self {
        Self {
            id: item.id.clone(),
            prompt: item.prompt.clone(),
            status: GenerationStatus::Failed,
            urls: Vec::new(),
            error: Some(error.into()),
            error_category: category,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == GenerationStatus::Completed
    }

    /// Skipped because a stop was requested; never sent to the vendor.
    pub fn is_stopped(&self) -> bool {
        self.error.as_deref() == Some(STOPPED_MESSAGE)
    }
}

/// Screen prompts before spending credits on them.
///
/// Returns the acceptable items and one `"<id>: <reason>"` message per
/// rejected item. Prompts are trimmed in the returned items.
pub fn validate_prompts(items: Vec<BatchItem>) -> (Vec<BatchItem>, Vec<String>) {
    let mut valid = Vec::new();
    let mut errors = Vec::new();
    for mut item in items {
        let prompt = item.prompt.trim();
        let len = prompt.chars().count();
        if len == 0 {
            errors.push(format!("{}: Empty prompt", item.id));
        } else if len < MIN_PROMPT_CHARS {
            errors.push(format!(
                "{}: Too short (min {} chars, got {})",
                item.id, MIN_PROMPT_CHARS, len
            ));
        } else if len > MAX_PROMPT_CHARS {
            errors.push(format!(
                "{}: Too long (max {} chars, got {})",
                item.id, MAX_PROMPT_CHARS, len
            ));
        } else {
            item.prompt = prompt.to_string();
            valid.push(item);
        }
    }
    (valid, errors)
}
