//! Two-step B-roll pipeline: images first, then one video per image.

use super::executor::AutomationEngine;
use super::item::{BatchItem, ContentKind, ProcessingResult};
use crate::client::VeoClient;
use crate::telemetry::{get_progress_sink, ProgressEvent, ProgressSink};
use crate::types::AspectRatio;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const TOTAL_STEPS: u8 = 2;

/// Image and video outcome of one prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrollResult {
    pub id: String,
    pub prompt: String,
    pub image: ProcessingResult,
    /// `None` when the image step produced nothing to animate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<ProcessingResult>,
}

impl BrollResult {
    pub fn is_completed(&self) -> bool {
        self.image.is_completed() && self.video.as_ref().is_some_and(|v| v.is_completed())
    }
}

/// Generates an image per prompt, then animates it.
///
/// The first image URL of each finished item is downloaded into
/// `frames_dir` and used as the start frame of a single video for the
/// same prompt. Frames are removed once the video step ends.
pub struct BrollPipeline {
    client: VeoClient,
    images: AutomationEngine,
    videos: AutomationEngine,
    sink: Arc<dyn ProgressSink>,
    frames_dir: PathBuf,
}

impl BrollPipeline {
    pub fn new(client: VeoClient) -> Self {
        Self::with_engines(
            client.clone(),
            AutomationEngine::new(client.clone(), ContentKind::Images),
            AutomationEngine::new(client, ContentKind::Videos),
        )
    }

    /// `images` and `videos` must be engines of those kinds.
    pub fn with_engines(client: VeoClient, images: AutomationEngine, videos: AutomationEngine) -> Self {
        Self {
            client,
            images,
            videos,
            sink: get_progress_sink(),
            frames_dir: std::env::temp_dir().join(format!("veo-broll-{}", uuid::Uuid::new_v4())),
        }
    }

    /// Step events go here; item events go to each engine's own sink.
    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_frames_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.frames_dir = dir.into();
        self
    }

    pub fn frames_dir(&self) -> &Path {
        &self.frames_dir
    }

    /// Stops both steps; items already running finish normally.
    pub fn request_stop(&self) {
        self.images.request_stop();
        self.videos.request_stop();
    }

    /// Run both steps. Results keep the input order.
    pub async fn run(&self, items: Vec<BatchItem>, aspect_ratio: AspectRatio) -> Vec<BrollResult> {
        self.step(1, "images").await;
        let images = self.images.run(items.clone(), aspect_ratio).await;

        let mut frames = HashMap::new();
        let mut frame_errors = HashMap::new();
        for result in images.results.iter().filter(|r| r.is_completed()) {
            match self.fetch_frame(result).await {
                Ok(path) => {
                    frames.insert(result.id.clone(), path);
                }
                Err(e) => {
                    warn!(item = result.id.as_str(), error = %e, "start frame download failed");
                    frame_errors.insert(result.id.clone(), e);
                }
            }
        }

        self.step(2, "videos").await;
        let video_items: Vec<BatchItem> = items
            .iter()
            .filter_map(|item| {
                frames
                    .get(&item.id)
                    .map(|frame| BatchItem::new(&item.id, &item.prompt).with_reference_image(frame))
            })
            .collect();
        let mut videos: HashMap<String, ProcessingResult> = if video_items.is_empty() {
            HashMap::new()
        } else {
            self.videos
                .run(video_items, aspect_ratio)
                .await
                .results
                .into_iter()
                .map(|r| (r.id.clone(), r))
                .collect()
        };

        for path in frames.values() {
            if let Err(e) = tokio::fs::remove_file(path).await {
                debug!(path = %path.display(), error = %e, "could not remove start frame");
            }
        }
        if let Err(e) = tokio::fs::remove_dir(&self.frames_dir).await {
            debug!(dir = %self.frames_dir.display(), error = %e, "frames dir left in place");
        }

        let results: Vec<BrollResult> = items
            .iter()
            .zip(images.results)
            .map(|(item, image)| {
                let video = match frame_errors.remove(&item.id) {
                    Some(e) => {
                        let category = e.category();
                        Some(ProcessingResult::failed(item, e.to_string(), Some(category)))
                    }
                    None => videos.remove(&item.id),
                };
                BrollResult {
                    id: item.id.clone(),
                    prompt: item.prompt.clone(),
                    image,
                    video,
                }
            })
            .collect();
        info!(
            items = results.len(),
            completed = results.iter().filter(|r| r.is_completed()).count(),
            "b-roll pipeline finished"
        );
        results
    }

    async fn fetch_frame(&self, image: &ProcessingResult) -> Result<PathBuf> {
        let url = image.urls.first().ok_or_else(|| {
            Error::network_with_context(
                "image completed without a URL",
                ErrorContext::new().with_source("broll_frame"),
            )
        })?;
        let bytes = self.client.download(url).await?;
        tokio::fs::create_dir_all(&self.frames_dir).await?;
        let path = self
            .frames_dir
            .join(format!("{}.{}", image.id, frame_extension(url)));
        tokio::fs::write(&path, &bytes).await?;
        debug!(item = image.id.as_str(), bytes = bytes.len(), "start frame saved");
        Ok(path)
    }

    async fn step(&self, step: u8, name: &str) {
        info!(step, name, "b-roll step started");
        let event = ProgressEvent::StepStarted {
            step,
            total_steps: TOTAL_STEPS,
            name: name.to_string(),
        };
        if let Err(e) = self.sink.report(event).await {
            warn!(error = %e, "progress sink rejected event");
        }
    }
}

/// Extension of the image behind `url`, `png` when it is not a known format.
fn frame_extension(url: &str) -> &'static str {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_ascii_lowercase())
        .unwrap_or_default();
    if path.ends_with(".jpg") || path.ends_with(".jpeg") {
        "jpg"
    } else if path.ends_with(".webp") {
        "webp"
    } else {
        "png"
    }
}
