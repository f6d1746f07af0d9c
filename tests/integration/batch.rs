//! Integration tests for the batch automation engine

use crate::integration::mock_server::MockServerFixture;
use genaipro_veo::batch::{
    broll_csv, AutomationEngine, AutomationJob, BatchItem, BrollPipeline, ContentKind,
    EngineTuning, JobStatus, JobStore, STOPPED_MESSAGE,
};
use genaipro_veo::telemetry::InMemoryProgressSink;
use genaipro_veo::types::AspectRatio;
use genaipro_veo::{ErrorCategory, GenerationStatus};
use std::sync::Arc;
use std::time::Duration;

fn fast_tuning() -> EngineTuning {
    EngineTuning {
        timeout: Duration::from_millis(150),
        initial_poll: Duration::from_millis(10),
        max_poll: Duration::from_millis(20),
        max_concurrent: 2,
        requests_per_minute: 0,
        history_page_size: 10,
        retry_stream_open: false,
    }
}

fn temp_store() -> JobStore {
    JobStore::new(std::env::temp_dir().join(format!("veo-batch-{}", uuid::Uuid::new_v4())))
}

#[tokio::test]
async fn completes_items_in_input_order() {
    let fixture = MockServerFixture::new().await;
    let _mock = fixture
        .mock_sse_stream(
            "/veo/create-image",
            &[
                r#"{"status": "processing", "process_percentage": 50}"#,
                r#"{"status": "completed", "file_urls": ["https://cdn.example/x.png"]}"#,
            ],
        )
        .await;

    let sink = Arc::new(InMemoryProgressSink::new(100));
    let engine = AutomationEngine::with_tuning(fixture.client(), ContentKind::Images, fast_tuning())
        .with_sink(sink.clone());
    let items = vec![
        BatchItem::new("item_001", "a paper boat on a puddle"),
        BatchItem::new("item_002", "a brass compass on a map"),
    ];
    let report = engine.run(items, AspectRatio::Square).await;

    assert_eq!((report.completed, report.failed), (2, 0));
    let ids: Vec<_> = report.results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["item_001", "item_002"]);
    assert_eq!(report.results[0].urls, vec!["https://cdn.example/x.png".to_string()]);

    let types = sink.event_types();
    assert_eq!(types.first(), Some(&"batch_started"));
    assert_eq!(types.last(), Some(&"batch_completed"));
    let per_item: Vec<_> = sink
        .get_events_by_item("item_002")
        .iter()
        .map(|e| e.event_type())
        .collect();
    assert_eq!(per_item, vec!["item_started", "item_progress", "item_completed"]);
}

#[tokio::test]
async fn stop_before_run_leaves_job_resumable() {
    let fixture = MockServerFixture::new().await;
    let mock = {
        let mut server = fixture.server.lock().await;
        server
            .mock("POST", "/veo/text-to-video")
            .expect(0)
            .create_async()
            .await
    };

    let items = vec![BatchItem::new("item_001", "a lantern festival over a river")];
    let store = temp_store();
    let job = store.create("videos", items.clone(), Default::default());
    let job_id = job.job_id.clone();

    let engine = AutomationEngine::with_tuning(fixture.client(), ContentKind::Videos, fast_tuning())
        .with_job(store.clone(), job);
    engine.request_stop();
    let report = engine.run(items, AspectRatio::Landscape).await;
    mock.assert_async().await;

    assert_eq!(report.failed, 1);
    assert!(report.results[0].is_stopped());
    assert_eq!(report.results[0].error.as_deref(), Some(STOPPED_MESSAGE));

    let saved = store.load(&job_id).await.unwrap().unwrap();
    assert_eq!(saved.status, JobStatus::Paused);
    assert!(saved.is_resumable());
    assert_eq!(saved.pending_items().len(), 1);
    let _ = tokio::fs::remove_dir_all(store.dir()).await;
}

#[tokio::test]
async fn early_stream_close_falls_back_to_history() {
    let fixture = MockServerFixture::new().await;
    let _stream = fixture
        .mock_sse_stream(
            "/veo/text-to-video",
            &[r#"{"status": "processing", "process_percentage": 30}"#],
        )
        .await;
    let history = fixture
        .mock_get_json(
            "/veo/histories",
            200,
            r#"{"data": [{"id": "h1", "prompt": "A glacier calving into the sea",
                "status": "completed", "file_url": "https://cdn.example/g.mp4"}]}"#,
        )
        .await;

    let engine = AutomationEngine::with_tuning(fixture.client(), ContentKind::Videos, fast_tuning());
    let report = engine
        .run(
            vec![BatchItem::new("item_001", "a glacier calving into the sea")],
            AspectRatio::Landscape,
        )
        .await;
    history.assert_async().await;

    assert_eq!(report.completed, 1);
    assert_eq!(report.results[0].urls, vec!["https://cdn.example/g.mp4".to_string()]);
}

#[tokio::test]
async fn vendor_failure_fails_the_item() {
    let fixture = MockServerFixture::new().await;
    let _mock = fixture
        .mock_sse_stream(
            "/veo/text-to-video",
            &[r#"{"status": "failed", "error": "prompt blocked by safety filter"}"#],
        )
        .await;
    let history = {
        let mut server = fixture.server.lock().await;
        server
            .mock("GET", "/veo/histories")
            .match_query(mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await
    };

    let engine = AutomationEngine::with_tuning(fixture.client(), ContentKind::Videos, fast_tuning());
    let report = engine
        .run(
            vec![BatchItem::new("item_001", "a crowded night market in the rain")],
            AspectRatio::Portrait,
        )
        .await;
    history.assert_async().await;

    let result = &report.results[0];
    assert_eq!(result.status, GenerationStatus::Failed);
    assert!(result
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("prompt blocked by safety filter"));
    assert_eq!(result.error_category, Some(ErrorCategory::Permanent));
}

#[tokio::test]
async fn history_polling_times_out() {
    let fixture = MockServerFixture::new().await;
    let _stream = fixture
        .mock_sse_stream("/veo/create-image", &[r#"{"status": "processing"}"#])
        .await;
    let _history = fixture
        .mock_get_json("/veo/histories", 200, r#"{"data": []}"#)
        .await;

    let engine = AutomationEngine::with_tuning(fixture.client(), ContentKind::Images, fast_tuning());
    let report = engine
        .run(
            vec![BatchItem::new("item_001", "a snail racing a tortoise")],
            AspectRatio::Square,
        )
        .await;

    assert_eq!(report.failed, 1);
    assert!(report.results[0]
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("Generation exceeded"));
}

#[tokio::test]
async fn finished_job_is_saved_as_completed() {
    let fixture = MockServerFixture::new().await;
    let _mock = fixture
        .mock_sse_stream(
            "/veo/create-image",
            &[r#"{"status": "completed", "file_url": "https://cdn.example/j.png"}"#],
        )
        .await;

    let items = BatchItem::from_lines("a violin made of ice\n\n  a library inside a whale\n");
    let store = temp_store();
    let job = AutomationJob::new("images", items.clone(), Default::default());
    let job_id = job.job_id.clone();

    let engine = AutomationEngine::with_tuning(fixture.client(), ContentKind::Images, fast_tuning())
        .with_job(store.clone(), job);
    engine.run(items, AspectRatio::Landscape).await;

    let snapshot = engine.job_snapshot().await.unwrap();
    assert_eq!(snapshot.completed_count, 2);

    let saved = store.load(&job_id).await.unwrap().unwrap();
    assert_eq!(saved.status, JobStatus::Completed);
    assert_eq!(saved.remaining_count(), 0);
    assert!(!saved.is_resumable());
    let _ = tokio::fs::remove_dir_all(store.dir()).await;
}

#[tokio::test]
async fn rejected_stream_is_reopened_only_after_a_delay() {
    let fixture = MockServerFixture::new().await;
    let mock = {
        let mut server = fixture.server.lock().await;
        server
            .mock("POST", "/veo/text-to-video")
            .with_status(403)
            .with_body(r#"{"message": "reCAPTCHA verification failed"}"#)
            .expect(1)
            .create_async()
            .await
    };

    let tuning = EngineTuning {
        retry_stream_open: true,
        ..fast_tuning()
    };
    let engine = AutomationEngine::with_tuning(fixture.client(), ContentKind::Videos, tuning);
    let run = engine.run(
        vec![BatchItem::new("item_001", "a heron standing in a flooded field")],
        AspectRatio::Landscape,
    );

    // The first reCAPTCHA re-open waits at least four seconds.
    let outcome = tokio::time::timeout(Duration::from_millis(1500), run).await;
    assert!(outcome.is_err());
    mock.assert_async().await;
}

fn broll_pipeline(fixture: &MockServerFixture) -> BrollPipeline {
    let client = fixture.client();
    BrollPipeline::with_engines(
        client.clone(),
        AutomationEngine::with_tuning(client.clone(), ContentKind::Images, fast_tuning()),
        AutomationEngine::with_tuning(client, ContentKind::Videos, fast_tuning()),
    )
    .with_frames_dir(std::env::temp_dir().join(format!("veo-frames-{}", uuid::Uuid::new_v4())))
}

#[tokio::test]
async fn broll_animates_each_generated_image() {
    let fixture = MockServerFixture::new().await;
    let image_url = format!("{}/files/still.png", fixture.base_url);
    let image_frame = format!(r#"{{"status": "completed", "file_urls": ["{}"]}}"#, image_url);
    let _images = fixture
        .mock_sse_stream("/veo/create-image", &[image_frame.as_str()])
        .await;
    let (still, videos) = {
        let mut server = fixture.server.lock().await;
        let still = server
            .mock("GET", "/files/still.png")
            .with_status(200)
            .with_body(b"\x89PNG")
            .expect(2)
            .create_async()
            .await;
        let videos = server
            .mock("POST", "/veo/frames-to-video")
            .match_body(mockito::Matcher::Regex(r#"name="start_frame"; filename="start_frame.png""#.into()))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(MockServerFixture::sse_body(&[
                r#"{"status": "completed", "file_url": "https://cdn.example/clip.mp4"}"#,
            ]))
            .expect(2)
            .create_async()
            .await;
        (still, videos)
    };

    let sink = Arc::new(InMemoryProgressSink::new(100));
    let pipeline = broll_pipeline(&fixture).with_sink(sink.clone());
    let items = vec![
        BatchItem::new("item_001", "a heron in morning reeds"),
        BatchItem::new("item_002", "steam rising from a teacup"),
    ];
    let results = pipeline.run(items, AspectRatio::Landscape).await;

    still.assert_async().await;
    videos.assert_async().await;
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.is_completed()));
    assert_eq!(results[1].image.urls, vec![image_url]);
    assert_eq!(
        results[1].video.as_ref().map(|v| v.urls.clone()),
        Some(vec!["https://cdn.example/clip.mp4".to_string()])
    );
    assert_eq!(sink.event_types(), vec!["step_started", "step_started"]);
    assert!(!pipeline.frames_dir().exists());

    let csv = broll_csv(&results).unwrap();
    assert!(csv.lines().nth(2).unwrap().ends_with(",completed,https://cdn.example/clip.mp4,"));
}

#[tokio::test]
async fn broll_skips_video_when_image_fails() {
    let fixture = MockServerFixture::new().await;
    let _images = fixture
        .mock_sse_stream(
            "/veo/create-image",
            &[r#"{"status": "failed", "error": "prompt blocked by safety filter"}"#],
        )
        .await;
    let videos = {
        let mut server = fixture.server.lock().await;
        server
            .mock("POST", "/veo/frames-to-video")
            .expect(0)
            .create_async()
            .await
    };

    let results = broll_pipeline(&fixture)
        .run(
            vec![BatchItem::new("item_001", "a heron in morning reeds")],
            AspectRatio::Landscape,
        )
        .await;

    videos.assert_async().await;
    assert_eq!(results[0].image.status, GenerationStatus::Failed);
    assert_eq!(results[0].image.error_category, Some(ErrorCategory::Permanent));
    assert!(results[0].video.is_none());
}

#[tokio::test]
async fn broll_records_a_failed_frame_download() {
    let fixture = MockServerFixture::new().await;
    let missing = format!(
        r#"{{"status": "completed", "file_urls": ["{}/files/gone.png"]}}"#,
        fixture.base_url
    );
    let _images = fixture
        .mock_sse_stream("/veo/create-image", &[missing.as_str()])
        .await;
    let _gone = {
        let mut server = fixture.server.lock().await;
        server
            .mock("GET", "/files/gone.png")
            .with_status(404)
            .create_async()
            .await
    };

    let results = broll_pipeline(&fixture)
        .run(
            vec![BatchItem::new("item_001", "a heron in morning reeds")],
            AspectRatio::Landscape,
        )
        .await;

    assert!(results[0].image.is_completed());
    let video = results[0].video.as_ref().unwrap();
    assert_eq!(video.status, GenerationStatus::Failed);
    assert!(video.error.as_deref().unwrap_or_default().contains("404"));
}
