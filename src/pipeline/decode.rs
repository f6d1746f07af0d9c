//! SSE framing decoder (Bytes -> frames)
//!
//! Frames are separated by a blank line (`\n\n` or `\r\n\r\n`). Bytes are
//! buffered raw so a multi-byte character split across chunks survives.

use crate::{BoxStream, Error};
use bytes::Bytes;
use futures::{stream, StreamExt};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::debug;

/// One SSE frame: optional `event:` name plus the joined `data:` lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental SSE frame splitter.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some((idx, delim_len)) = find_frame_delimiter(&self.buf) {
            let frame_bytes: Vec<u8> = self.buf.drain(..idx + delim_len).collect();
            if let Some(frame) = parse_frame(&frame_bytes[..idx]) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush whatever is left at EOF as a final, unterminated frame.
    pub fn finish(&mut self) -> Option<SseFrame> {
        let rest = std::mem::take(&mut self.buf);
        parse_frame(&rest)
    }
}

fn find_frame_delimiter(buf: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i + 1 < buf.len() {
        if buf[i] == b'\n' && buf[i + 1] == b'\n' {
            return Some((i, 2));
        }
        if i + 3 < buf.len() && &buf[i..i + 4] == b"\r\n\r\n" {
            return Some((i, 4));
        }
        i += 1;
    }
    None
}

fn parse_frame(bytes: &[u8]) -> Option<SseFrame> {
    if bytes.is_empty() {
        return None;
    }
    let text = String::from_utf8_lossy(bytes);
    let mut event = None;
    let mut data_lines: Vec<&str> = Vec::new();
    for raw_line in text.split('\n') {
        let line = raw_line.trim_end_matches('\r');
        // Comments and blank lines carry nothing.
        if line.trim().is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("event:") {
            event = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    if event.is_none() && data_lines.is_empty() {
        return None;
    }
    Some(SseFrame {
        event,
        data: data_lines.join("\n"),
    })
}

/// Decode a byte stream into SSE frames.
///
/// Every wait for the next chunk is bounded by `idle_timeout`; when it elapses
/// the stream yields [`Error::StreamInterrupted`] and ends. A transport error
/// mid-body is reported the same way, since the generation can no longer be
/// observed.
pub fn decode_stream(
    input: BoxStream<'static, Bytes>,
    idle_timeout: Duration,
) -> BoxStream<'static, SseFrame> {
    struct State {
        input: BoxStream<'static, Bytes>,
        decoder: SseDecoder,
        pending: VecDeque<SseFrame>,
        done: bool,
    }

    let state = State {
        input,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    let stream = stream::unfold(state, move |mut st| async move {
        loop {
            if let Some(frame) = st.pending.pop_front() {
                return Some((Ok(frame), st));
            }
            if st.done {
                return None;
            }

            match tokio::time::timeout(idle_timeout, st.input.next()).await {
                Ok(Some(Ok(bytes))) => {
                    st.pending.extend(st.decoder.push(&bytes));
                }
                Ok(Some(Err(e))) => {
                    st.done = true;
                    debug!(error = %e, "event stream read failed");
                    return Some((Err(Error::stream_interrupted(e.to_string())), st));
                }
                Ok(None) => {
                    st.done = true;
                    st.pending.extend(st.decoder.finish());
                }
                Err(_) => {
                    st.done = true;
                    return Some((
                        Err(Error::stream_interrupted(format!(
                            "no data received for {}s",
                            idle_timeout.as_secs()
                        ))),
                        st,
                    ));
                }
            }
        }
    });

    Box::pin(stream)
}
