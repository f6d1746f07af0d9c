//! Generation endpoints and the stream handle they return.

use crate::client::execution::StreamBody;
use crate::client::types::CallStats;
use crate::pipeline::reconcile::track_progress;
use crate::types::{
    CreateImageRequest, FramesToVideoRequest, GeneratedMedia, GenerationResult, ImageUpload,
    IngredientsToVideoRequest, ProgressUpdate, StreamEvent, TextToVideoRequest,
};
use crate::{BoxStream, Error, Result};
use futures::{Stream, StreamExt};
use reqwest::multipart::Form;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::OwnedSemaphorePermit;

use super::core::VeoClient;

impl VeoClient {
    /// `POST /veo/text-to-video`
    pub async fn text_to_video(&self, request: TextToVideoRequest) -> Result<GenerationStream> {
        let request = request.validate()?;
        self.open_stream("/veo/text-to-video", StreamBody::Json(request.to_body()?))
            .await
    }

    /// `POST /veo/frames-to-video` (multipart)
    pub async fn frames_to_video(&self, request: FramesToVideoRequest) -> Result<GenerationStream> {
        let request = request.validate()?;
        let start =
            ImageUpload::load(&request.start_frame, "start_frame", self.max_upload_bytes).await?;
        let mut form = Form::new()
            .text("prompt", request.prompt.clone())
            .part("start_frame", start.into_part()?);
        if let Some(end_frame) = &request.end_frame {
            let end = ImageUpload::load(end_frame, "end_frame", self.max_upload_bytes).await?;
            form = form.part("end_frame", end.into_part()?);
        }
        if let Some(ar) = request.aspect_ratio {
            form = form.text("aspect_ratio", ar.video_wire()?);
        }
        if let Some(n) = request.number_of_videos {
            form = form.text("number_of_videos", n.to_string());
        }
        self.open_stream("/veo/frames-to-video", StreamBody::Multipart(form))
            .await
    }

    /// `POST /veo/ingredients-to-video` (multipart, repeated `images`)
    pub async fn ingredients_to_video(
        &self,
        request: IngredientsToVideoRequest,
    ) -> Result<GenerationStream> {
        let request = request.validate()?;
        let mut form = Form::new().text("prompt", request.prompt.clone());
        for (idx, path) in request.images.iter().enumerate() {
            let upload =
                ImageUpload::load(path, &format!("image_{}", idx), self.max_upload_bytes).await?;
            form = form.part("images", upload.into_part()?);
        }
        self.open_stream("/veo/ingredients-to-video", StreamBody::Multipart(form))
            .await
    }

    /// `POST /veo/create-image` (multipart)
    pub async fn create_image(&self, request: CreateImageRequest) -> Result<GenerationStream> {
        let request = request.validate()?;
        let mut form = Form::new()
            .text("prompt", request.prompt.clone())
            .text("aspect_ratio", request.aspect_ratio.image_wire())
            .text("number_of_images", request.number_of_images.to_string());
        for (idx, path) in request.reference_images.iter().enumerate() {
            let upload =
                ImageUpload::load(path, &format!("reference_{}", idx), self.max_upload_bytes)
                    .await?;
            form = form.part("reference_images", upload.into_part()?);
        }
        self.open_stream("/veo/create-image", StreamBody::Multipart(form))
            .await
    }
}

/// Live progress of one generation.
///
/// Yields reconciled [`StreamEvent`]s and ends after the terminal one.
/// Dropping it closes the connection.
pub struct GenerationStream {
    events: BoxStream<'static, StreamEvent>,
    stats: CallStats,
    _permit: Option<OwnedSemaphorePermit>,
}

impl GenerationStream {
    pub(crate) fn new(
        events: BoxStream<'static, StreamEvent>,
        stats: CallStats,
        permit: Option<OwnedSemaphorePermit>,
    ) -> Self {
        Self {
            events,
            stats,
            _permit: permit,
        }
    }

    pub fn stats(&self) -> &CallStats {
        &self.stats
    }

    /// Events annotated with the carried-forward percentage.
    ///
    /// The inflight permit moves into the returned stream.
    pub fn with_progress(self) -> BoxStream<'static, ProgressUpdate> {
        Box::pin(PermitGuarded {
            inner: track_progress(self.events),
            _permit: self._permit,
        })
    }

    /// Drive the stream to its terminal event.
    ///
    /// A vendor-reported failure is returned as [`GenerationResult::Failed`];
    /// interruption and transport problems are errors.
    pub async fn collect_result(mut self) -> Result<GenerationResult> {
        while let Some(item) = self.events.next().await {
            let event = item?;
            if let Some(result) = GenerationResult::from_terminal(&event) {
                return Ok(result);
            }
        }
        Err(Error::stream_interrupted(
            "stream ended without a terminal event",
        ))
    }

    /// Like [`collect_result`](Self::collect_result), with a vendor failure
    /// surfaced as [`Error::VideoGeneration`].
    pub async fn collect_media(self) -> Result<GeneratedMedia> {
        self.collect_result().await?.into_media()
    }
}

impl Stream for GenerationStream {
    type Item = Result<StreamEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.as_mut().poll_next(cx)
    }
}

/// A stream that holds an inflight permit until it is dropped.
struct PermitGuarded<T> {
    inner: BoxStream<'static, T>,
    _permit: Option<OwnedSemaphorePermit>,
}

impl<T> Stream for PermitGuarded<T> {
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}
