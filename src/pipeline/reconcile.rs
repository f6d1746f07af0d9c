//! Reconciler: SSE frames -> uniform [`StreamEvent`]s.
//!
//! The vendor sends two shapes on the same stream: progress objects carrying
//! a `status`, and a bare array whose first element is the finished asset.
//! Both collapse into one [`StreamEvent`].

use super::decode::SseFrame;
use crate::types::{GenerationStatus, ProgressUpdate, StreamEvent};
use crate::{BoxStream, Error};
use futures::{stream, StreamExt};
use serde_json::Value;
use tracing::{debug, trace};

/// Stateful frame-to-event mapper for a single generation stream.
#[derive(Debug, Default)]
pub struct Reconciler {
    terminated: bool,
    skipped: usize,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map one frame. Returns `None` for frames that carry no event (bad JSON,
    /// empty arrays) and for every frame after a terminal event.
    pub fn process_frame(&mut self, frame: &SseFrame) -> Option<StreamEvent> {
        if self.terminated {
            return None;
        }
        let event = if frame.event.as_deref() == Some("error") {
            Some(error_frame_event(&frame.data))
        } else {
            parse_payload(&frame.data)
        };
        match event {
            Some(ev) => {
                if ev.is_terminal() {
                    self.terminated = true;
                }
                Some(ev)
            }
            None => {
                self.skipped += 1;
                None
            }
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Frames dropped so far because they did not parse into an event.
    pub fn skipped_frames(&self) -> usize {
        self.skipped
    }
}

/// Parse one `data:` payload.
pub fn parse_payload(data: &str) -> Option<StreamEvent> {
    let trimmed = data.trim();
    if trimmed.is_empty() {
        return None;
    }
    let value: Value = match serde_json::from_str(trimmed) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "skipping malformed stream payload");
            return None;
        }
    };
    match value {
        Value::Object(obj) => Some(StreamEvent::from_object(&obj, None)),
        // The array form only ever announces completion.
        Value::Array(items) => match items.into_iter().next() {
            Some(Value::Object(first)) => Some(StreamEvent::from_object(
                &first,
                Some(GenerationStatus::Completed),
            )),
            Some(other) => {
                trace!(payload = %other, "array payload without an object element");
                None
            }
            None => None,
        },
        other => {
            trace!(payload = %other, "ignoring scalar payload");
            None
        }
    }
}

fn error_frame_event(data: &str) -> StreamEvent {
    let message = match serde_json::from_str::<Value>(data.trim()) {
        Ok(Value::Object(obj)) => ["message", "error", "detail"]
            .iter()
            .find_map(|k| match obj.get(*k) {
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                Some(Value::Object(inner)) => inner
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            }),
        Ok(Value::String(s)) if !s.is_empty() => Some(s),
        Ok(_) => None,
        Err(_) => Some(data.trim().to_string()).filter(|s| !s.is_empty()),
    };
    match message {
        Some(m) => StreamEvent::failed(m),
        None => StreamEvent::failed("Unknown error occurred"),
    }
}

/// Turn decoded frames into events, stopping after the first terminal event.
///
/// Upstream errors (idle timeout, transport failure) are forwarded once and
/// end the stream. A stream that closes before any terminal event ends with
/// [`Error::StreamInterrupted`].
pub fn reconcile_stream(
    frames: BoxStream<'static, SseFrame>,
) -> BoxStream<'static, StreamEvent> {
    struct State {
        frames: BoxStream<'static, SseFrame>,
        reconciler: Reconciler,
        done: bool,
    }

    let state = State {
        frames,
        reconciler: Reconciler::new(),
        done: false,
    };

    let stream = stream::unfold(state, |mut st| async move {
        if st.done || st.reconciler.is_terminated() {
            return None;
        }
        loop {
            match st.frames.next().await {
                Some(Ok(frame)) => {
                    if let Some(ev) = st.reconciler.process_frame(&frame) {
                        return Some((Ok(ev), st));
                    }
                }
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(e), st));
                }
                None => {
                    st.done = true;
                    debug!(
                        skipped_frames = st.reconciler.skipped_frames(),
                        "event stream closed before a terminal event"
                    );
                    return Some((
                        Err(Error::stream_interrupted(
                            "connection closed before generation finished",
                        )),
                        st,
                    ));
                }
            }
        }
    });

    Box::pin(stream)
}

/// Annotate events with the last known percentage.
pub fn track_progress(
    events: BoxStream<'static, StreamEvent>,
) -> BoxStream<'static, ProgressUpdate> {
    let stream = events.scan(0u8, |last, item| {
        let out = item.map(|event| {
            if let Some(p) = event.process_percentage {
                *last = p;
            }
            let is_complete = event.status == GenerationStatus::Completed;
            if is_complete {
                *last = 100;
            }
            ProgressUpdate {
                is_processing: event.status == GenerationStatus::Processing,
                is_complete,
                progress: *last,
                event,
            }
        });
        futures::future::ready(Some(out))
    });
    Box::pin(stream)
}
