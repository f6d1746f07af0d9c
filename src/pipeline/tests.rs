use crate::pipeline::Pipeline;
use crate::types::GenerationStatus;
use crate::{BoxStream, Error};
use bytes::Bytes;
use futures::{stream, StreamExt};
use std::time::Duration;

fn body(chunks: &[&str]) -> BoxStream<'static, Bytes> {
    let owned: Vec<crate::Result<Bytes>> = chunks
        .iter()
        .map(|c| Ok(Bytes::from(c.to_string())))
        .collect();
    Box::pin(stream::iter(owned))
}

/// Chunks delivered after the given delays, then the body stays open.
fn slow_body(chunks: Vec<(u64, &'static str)>) -> BoxStream<'static, Bytes> {
    let timed = stream::unfold(chunks.into_iter(), |mut it| async move {
        let (delay, chunk) = it.next()?;
        tokio::time::sleep(Duration::from_secs(delay)).await;
        Some((Ok(Bytes::from_static(chunk.as_bytes())), it))
    });
    Box::pin(timed.chain(stream::pending()))
}

#[tokio::test]
async fn processing_events_pass_through() {
    let events: Vec<_> = Pipeline::default()
        .process_stream(body(&[
            "data: {\"status\": \"processing\", \"process_percentage\": 45}\n\n",
            "data: {\"status\": \"completed\", \"file_url\": \"https://cdn/v.mp4\", \"id\": \"v1\"}\n\n",
        ]))
        .collect()
        .await;

    assert_eq!(events.len(), 2);
    let first = events[0].as_ref().unwrap();
    assert_eq!(first.status, GenerationStatus::Processing);
    assert_eq!(first.process_percentage, Some(45));
    let last = events[1].as_ref().unwrap();
    assert_eq!(last.status, GenerationStatus::Completed);
    assert_eq!(last.file_url.as_deref(), Some("https://cdn/v.mp4"));
}

#[tokio::test]
async fn array_payload_completes() {
    let events: Vec<_> = Pipeline::default()
        .process_stream(body(&[
            "data: [{\"file_url\": \"https://cdn/a.mp4\", \"id\": \"gen-9\", \"prompt\": \"a fox\"}]\n\n",
        ]))
        .collect()
        .await;

    assert_eq!(events.len(), 1);
    let ev = events[0].as_ref().unwrap();
    assert_eq!(ev.status, GenerationStatus::Completed);
    assert_eq!(ev.file_url.as_deref(), Some("https://cdn/a.mp4"));
    assert_eq!(ev.id.as_deref(), Some("gen-9"));
}

#[tokio::test]
async fn error_field_fails_and_stops() {
    let events: Vec<_> = Pipeline::default()
        .process_stream(body(&[
            "data: {\"status\": \"processing\", \"error\": \"quota exceeded\"}\n\n",
            "data: {\"status\": \"processing\", \"process_percentage\": 50}\n\n",
        ]))
        .collect()
        .await;

    assert_eq!(events.len(), 1);
    let ev = events[0].as_ref().unwrap();
    assert_eq!(ev.status, GenerationStatus::Failed);
    assert_eq!(ev.error.as_deref(), Some("quota exceeded"));
}

#[tokio::test]
async fn malformed_json_is_skipped() {
    let events: Vec<_> = Pipeline::default()
        .process_stream(body(&[
            "data: {\"status\": \"proc",
            "essing\"\n\n",
            "data: not json at all\n\n",
            "data: {\"status\": \"completed\", \"file_url\": \"https://cdn/v.mp4\"}\n\n",
        ]))
        .collect()
        .await;

    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].as_ref().unwrap().status,
        GenerationStatus::Completed
    );
}

#[tokio::test]
async fn nothing_processed_after_terminal() {
    let events: Vec<_> = Pipeline::default()
        .process_stream(body(&[
            "data: {\"status\": \"completed\", \"file_url\": \"https://cdn/1.mp4\"}\n\n\
             data: {\"status\": \"completed\", \"file_url\": \"https://cdn/2.mp4\"}\n\n",
            "data: {\"status\": \"failed\"}\n\n",
        ]))
        .collect()
        .await;

    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].as_ref().unwrap().file_url.as_deref(),
        Some("https://cdn/1.mp4")
    );
}

#[tokio::test]
async fn close_before_terminal_is_interrupted() {
    let events: Vec<_> = Pipeline::default()
        .process_stream(body(&["data: {\"status\": \"processing\"}\n\n"]))
        .collect()
        .await;

    assert_eq!(events.len(), 2);
    assert!(matches!(
        events[1],
        Err(Error::StreamInterrupted { .. })
    ));
}

#[tokio::test]
async fn trailing_frame_without_blank_line_is_parsed() {
    let events: Vec<_> = Pipeline::default()
        .process_stream(body(&[
            "data: {\"status\": \"completed\", \"file_url\": \"https://cdn/v.mp4\"}",
        ]))
        .collect()
        .await;

    assert_eq!(events.len(), 1);
    assert!(events[0].as_ref().unwrap().is_terminal());
}

#[tokio::test(start_paused = true)]
async fn idle_stream_times_out_after_thirty_seconds() {
    let started = tokio::time::Instant::now();
    let events: Vec<_> = Pipeline::default()
        .process_stream(slow_body(vec![(
            0,
            "data: {\"status\": \"processing\", \"process_percentage\": 5}\n\n",
        )]))
        .collect()
        .await;

    assert_eq!(events.len(), 2);
    assert!(events[0].is_ok());
    assert!(matches!(
        events[1],
        Err(Error::StreamInterrupted { .. })
    ));
    assert!(started.elapsed() >= Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn each_chunk_resets_the_idle_window() {
    let events: Vec<_> = Pipeline::default()
        .process_stream(slow_body(vec![
            (20, "data: {\"status\": \"processing\", \"process_percentage\": 30}\n\n"),
            (20, "data: {\"status\": \"processing\", \"process_percentage\": 60}\n\n"),
            (20, "data: {\"status\": \"completed\", \"file_url\": \"https://cdn/v.mp4\"}\n\n"),
        ]))
        .collect()
        .await;

    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|e| e.is_ok()));
}

#[tokio::test]
async fn progress_is_carried_forward() {
    use crate::pipeline::reconcile::track_progress;

    let events = Pipeline::default().process_stream(body(&[
        "data: {\"status\": \"processing\", \"process_percentage\": 40}\n\n",
        "data: {\"status\": \"processing\"}\n\n",
        "data: [{\"file_url\": \"https://cdn/v.mp4\"}]\n\n",
    ]));
    let updates: Vec<_> = track_progress(events)
        .map(|u| u.unwrap())
        .collect()
        .await;

    assert_eq!(updates[1].progress, 40);
    assert!(updates[1].is_processing);
    assert_eq!(updates[2].progress, 100);
    assert!(updates[2].is_complete);
}

#[test]
fn zero_idle_timeout_is_rejected() {
    assert!(Pipeline::new(Duration::ZERO).is_err());
    assert_eq!(
        Pipeline::new(Duration::from_secs(5)).unwrap().idle_timeout(),
        Duration::from_secs(5)
    );
}
