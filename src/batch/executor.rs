//! Batch automation engine.

use super::item::{BatchItem, ContentKind, EngineTuning, ProcessingResult, STOPPED_MESSAGE};
use super::job::{AutomationJob, JobStatus, JobStore};
use crate::client::{GenerationStream, VeoClient};
use crate::resilience::rate_limiter::{RateLimiter, RateLimiterConfig};
use crate::resilience::retry::{retry_with_backoff_after, RetryStrategyKind};
use crate::telemetry::{get_progress_sink, ProgressEvent, ProgressSink};
use crate::types::{
    AspectRatio, CreateImageRequest, FramesToVideoRequest, GenerationResult, GenerationStatus,
    TextToVideoRequest,
};
use crate::{Error, ErrorContext, Result};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tracing::{info, warn};

/// Results of one [`AutomationEngine::run`], in input order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub results: Vec<ProcessingResult>,
    pub completed: usize,
    pub failed: usize,
}

impl BatchReport {
    fn from_results(results: Vec<ProcessingResult>) -> Self {
        let completed = results.iter().filter(|r| r.is_completed()).count();
        Self {
            failed: results.len() - completed,
            completed,
            results,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &ProcessingResult> {
        self.results.iter().filter(|r| !r.is_completed())
    }
}

/// How a stream open ended when it did not produce a stream.
enum Opened {
    Stream(GenerationStream),
    /// The request may have reached the vendor; look for it in history.
    Lost(Error),
}

struct JobSlot {
    store: JobStore,
    job: Mutex<AutomationJob>,
}

/// Runs a list of prompts against the API with bounded concurrency.
///
/// Each item tries the event stream first and falls back to polling the
/// history endpoint when the stream is lost.
pub struct AutomationEngine {
    client: VeoClient,
    kind: ContentKind,
    tuning: EngineTuning,
    semaphore: Arc<Semaphore>,
    rate_limiter: Option<RateLimiter>,
    sink: Arc<dyn ProgressSink>,
    stop: AtomicBool,
    start_frame: Option<PathBuf>,
    job: Option<JobSlot>,
}

impl AutomationEngine {
    pub fn new(client: VeoClient, kind: ContentKind) -> Self {
        Self::with_tuning(client, kind, kind.tuning())
    }

    pub fn with_tuning(client: VeoClient, kind: ContentKind, tuning: EngineTuning) -> Self {
        let rate_limiter = (tuning.requests_per_minute > 0).then(|| {
            RateLimiter::new(RateLimiterConfig::from_rpm(tuning.requests_per_minute))
        });
        Self {
            client,
            kind,
            semaphore: Arc::new(Semaphore::new(tuning.max_concurrent.max(1))),
            tuning,
            rate_limiter,
            sink: get_progress_sink(),
            stop: AtomicBool::new(false),
            start_frame: None,
            job: None,
        }
    }

    /// Defaults to the global sink from [`crate::telemetry::set_progress_sink`].
    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Start frame for video items that carry no reference image of their own.
    pub fn with_start_frame(mut self, path: impl Into<PathBuf>) -> Self {
        self.start_frame = Some(path.into());
        self
    }

    /// Record every finished item into `job` and save it to `store`.
    pub fn with_job(mut self, store: JobStore, job: AutomationJob) -> Self {
        self.job = Some(JobSlot {
            store,
            job: Mutex::new(job),
        });
        self
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    pub fn tuning(&self) -> &EngineTuning {
        &self.tuning
    }

    /// Items not yet started fail with `Processing stopped by user`.
    /// Items already running finish normally.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Current state of the attached job, if any.
    pub async fn job_snapshot(&self) -> Option<AutomationJob> {
        match &self.job {
            Some(slot) => Some(slot.job.lock().await.clone()),
            None => None,
        }
    }

    /// Process every item and report progress along the way.
    pub async fn run(&self, items: Vec<BatchItem>, aspect_ratio: AspectRatio) -> BatchReport {
        self.report(ProgressEvent::BatchStarted {
            total: items.len(),
            content_type: self.kind,
        })
        .await;
        self.update_job(|job| {
            job.current_step = self.kind.as_str().to_string();
            job.set_status(JobStatus::Running);
        })
        .await;

        let tasks = items
            .iter()
            .map(|item| self.process_and_save(item, aspect_ratio));
        let report = BatchReport::from_results(futures::future::join_all(tasks).await);

        let stopped = self.is_stop_requested();
        self.update_job(|job| {
            let status = if stopped && job.remaining_count() > 0 {
                JobStatus::Paused
            } else {
                JobStatus::Completed
            };
            job.set_status(status);
        })
        .await;
        self.report(ProgressEvent::BatchCompleted {
            completed: report.completed,
            failed: report.failed,
        })
        .await;
        info!(
            content_type = self.kind.as_str(),
            completed = report.completed,
            failed = report.failed,
            stopped,
            "batch finished"
        );
        report
    }

    async fn process_and_save(&self, item: &BatchItem, aspect_ratio: AspectRatio) -> ProcessingResult {
        let result = self.process_item(item, aspect_ratio).await;
        // Stopped items stay pending so the job can be resumed.
        if !result.is_stopped() {
            let recorded = result.clone();
            self.update_job(move |job| job.update_result(recorded)).await;
        }
        result
    }

    async fn process_item(&self, item: &BatchItem, aspect_ratio: AspectRatio) -> ProcessingResult {
        let _permit = match self.semaphore.clone().acquire_owned().await {
            Ok(p) => p,
            Err(_) => return ProcessingResult::failed(item, "engine semaphore closed", None),
        };
        if let Some(rl) = &self.rate_limiter {
            if self.is_stop_requested() {
                return ProcessingResult::failed(item, STOPPED_MESSAGE, None);
            }
            if let Err(e) = rl.acquire().await {
                return self.fail(item, e).await;
            }
        }
        if self.is_stop_requested() {
            return ProcessingResult::failed(item, STOPPED_MESSAGE, None);
        }

        self.report(ProgressEvent::ItemStarted {
            id: item.id.clone(),
            prompt: item.prompt.clone(),
        })
        .await;
        info!(item = item.id.as_str(), content_type = self.kind.as_str(), "item started");

        match self.generate(item, aspect_ratio).await {
            Ok(urls) => {
                self.report(ProgressEvent::ItemCompleted {
                    id: item.id.clone(),
                    urls: urls.clone(),
                })
                .await;
                info!(item = item.id.as_str(), urls = urls.len(), "item completed");
                ProcessingResult::completed(item, urls)
            }
            Err(e) => self.fail(item, e).await,
        }
    }

    async fn fail(&self, item: &BatchItem, err: Error) -> ProcessingResult {
        let category = err.category();
        let message = err.to_string();
        warn!(
            item = item.id.as_str(),
            category = category.as_str(),
            error = message.as_str(),
            "item failed"
        );
        self.report(ProgressEvent::ItemFailed {
            id: item.id.clone(),
            error: message.clone(),
            category,
        })
        .await;
        ProcessingResult::failed(item, message, Some(category))
    }

    /// Stream first, history second. Returns the result URLs.
    async fn generate(&self, item: &BatchItem, aspect_ratio: AspectRatio) -> Result<Vec<String>> {
        let lost = match self.open_with_retry(item, aspect_ratio).await? {
            Opened::Stream(stream) => match self.follow_stream(item, stream).await? {
                Some(urls) => return Ok(urls),
                None => None,
            },
            Opened::Lost(e) => Some(e),
        };
        if let Some(e) = lost {
            warn!(item = item.id.as_str(), error = %e, "stream failed, switching to polling");
        }
        self.poll_history(item).await
    }

    async fn open_with_retry(&self, item: &BatchItem, aspect_ratio: AspectRatio) -> Result<Opened> {
        let first = match self.open(item, aspect_ratio).await {
            Ok(opened) => return Ok(opened),
            Err(e) => e,
        };
        if !self.tuning.retry_stream_open {
            return Err(first);
        }
        let strategy = RetryStrategyKind::classify(&first.to_string());
        let id = item.id.as_str();
        retry_with_backoff_after(
            first,
            || self.open(item, aspect_ratio),
            strategy,
            |retry, delay, _| {
                info!(
                    item = id,
                    retry,
                    delay_ms = delay.as_millis() as u64,
                    strategy = strategy.name(),
                    "re-opening generation stream"
                )
            },
        )
        .await
    }

    /// One stream open. Transport failures come back as [`Opened::Lost`].
    async fn open(&self, item: &BatchItem, aspect_ratio: AspectRatio) -> Result<Opened> {
        let opened = match self.kind {
            ContentKind::Images => {
                let mut request = CreateImageRequest::new(item.prompt.clone())
                    .aspect_ratio(aspect_ratio)
                    .number_of_images(item.count);
                if let Some(path) = &item.reference_image {
                    request = request.reference_image(path.clone());
                }
                self.client.create_image(request).await
            }
            ContentKind::Videos => match item.reference_image.as_ref().or(self.start_frame.as_ref()) {
                Some(frame) => {
                    let request = FramesToVideoRequest::new(item.prompt.clone(), frame.clone())
                        .aspect_ratio(aspect_ratio)
                        .number_of_videos(item.count);
                    self.client.frames_to_video(request).await
                }
                None => {
                    let request = TextToVideoRequest::new(item.prompt.clone())
                        .aspect_ratio(aspect_ratio)
                        .number_of_videos(item.count);
                    self.client.text_to_video(request).await
                }
            },
        };
        match opened {
            Ok(stream) => Ok(Opened::Stream(stream)),
            Err(e @ Error::Transport(_)) => Ok(Opened::Lost(e)),
            Err(e) => Err(e),
        }
    }

    /// `Ok(None)` when the stream ended without an outcome.
    async fn follow_stream(
        &self,
        item: &BatchItem,
        stream: GenerationStream,
    ) -> Result<Option<Vec<String>>> {
        let mut updates = stream.with_progress();
        let mut last_progress = None;
        while let Some(update) = updates.next().await {
            let update = match update {
                Ok(u) => u,
                Err(e) => {
                    warn!(item = item.id.as_str(), error = %e, "stream failed, switching to polling");
                    return Ok(None);
                }
            };
            match GenerationResult::from_terminal(&update.event) {
                Some(GenerationResult::Completed(media)) => return Ok(Some(media.urls)),
                Some(GenerationResult::Failed { message }) => {
                    return Err(Error::video_generation(message))
                }
                None => {
                    if last_progress != Some(update.progress) {
                        last_progress = Some(update.progress);
                        self.report(ProgressEvent::ItemProgress {
                            id: item.id.clone(),
                            progress: update.progress,
                        })
                        .await;
                    }
                }
            }
        }
        Ok(None)
    }

    /// Look for the item in history with a growing poll interval.
    async fn poll_history(&self, item: &BatchItem) -> Result<Vec<String>> {
        let start = tokio::time::Instant::now();
        let mut interval = self.tuning.initial_poll;
        loop {
            if start.elapsed() > self.tuning.timeout {
                return Err(Error::network_with_context(
                    format!(
                        "Generation exceeded {}min timeout",
                        self.tuning.timeout.as_secs() / 60
                    ),
                    ErrorContext::new().with_source("history_poll"),
                ));
            }
            tokio::time::sleep(interval).await;

            match self
                .client
                .find_in_history(&item.prompt, self.tuning.history_page_size)
                .await
            {
                Ok(Some(found)) => match found.status() {
                    GenerationStatus::Completed => return Ok(found.urls()),
                    GenerationStatus::Failed => {
                        return Err(Error::video_generation(
                            found
                                .error
                                .unwrap_or_else(|| "Generation failed".to_string()),
                        ))
                    }
                    GenerationStatus::Processing => {}
                },
                Ok(None) => {}
                Err(e) => warn!(item = item.id.as_str(), error = %e, "history check failed"),
            }

            interval = interval.mul_f64(1.5).min(self.tuning.max_poll);
        }
    }

    async fn report(&self, event: ProgressEvent) {
        if let Err(e) = self.sink.report(event).await {
            warn!(error = %e, "progress sink rejected event");
        }
    }

    async fn update_job(&self, f: impl FnOnce(&mut AutomationJob)) {
        let Some(slot) = &self.job else {
            return;
        };
        let mut job = slot.job.lock().await;
        f(&mut job);
        if let Err(e) = slot.store.save(&job).await {
            warn!(job_id = job.job_id.as_str(), error = %e, "failed to save job");
        }
    }
}
