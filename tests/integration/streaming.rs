//! Integration tests for streaming generation responses

use crate::integration::mock_server::MockServerFixture;
use futures::StreamExt;
use genaipro_veo::types::{
    AspectRatio, CreateImageRequest, FramesToVideoRequest, GenerationStatus, TextToVideoRequest,
};
use genaipro_veo::{Error, GenerationResult};
use mockito::Matcher;
use serde_json::json;

#[tokio::test]
async fn text_to_video_progress_then_result() {
    let fixture = MockServerFixture::new().await;
    let mock = {
        let mut server = fixture.server.lock().await;
        server
            .mock("POST", "/veo/text-to-video")
            .match_body(Matcher::PartialJson(json!({
                "prompt": "a lighthouse in heavy fog",
                "aspect_ratio": "VIDEO_ASPECT_RATIO_PORTRAIT",
                "number_of_videos": 2
            })))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(MockServerFixture::sse_body(&[
                r#"{"status": "processing", "process_percentage": 10}"#,
                r#"{"status": "processing", "process_percentage": 55}"#,
                r#"{"status": "completed", "file_url": "https://cdn.example/v.mp4", "id": "gen-1"}"#,
            ]))
            .create_async()
            .await
    };

    let request = TextToVideoRequest::new("  a lighthouse in heavy fog ")
        .aspect_ratio(AspectRatio::Portrait)
        .number_of_videos(2);
    let stream = fixture.client().text_to_video(request).await.unwrap();
    assert_eq!(stream.stats().http_status, 200);
    assert_eq!(stream.stats().endpoint, "/veo/text-to-video");

    let events: Vec<_> = stream.collect().await;
    mock.assert_async().await;
    let events: Vec<_> = events.into_iter().map(|e| e.unwrap()).collect();
    assert_eq!(events.len(), 3);
    assert_eq!(events[1].process_percentage, Some(55));
    assert_eq!(events[2].status, GenerationStatus::Completed);
    assert_eq!(events[2].id.as_deref(), Some("gen-1"));
}

#[tokio::test]
async fn array_payload_completes_image_generation() {
    let fixture = MockServerFixture::new().await;
    let _mock = fixture
        .mock_sse_stream(
            "/veo/create-image",
            &[
                r#"{"status": "processing"}"#,
                r#"[{"file_url": "https://cdn.example/i.png", "id": "img-7"}]"#,
            ],
        )
        .await;

    let media = fixture
        .client()
        .create_image(CreateImageRequest::new("a ceramic teapot").aspect_ratio(AspectRatio::Square))
        .await
        .unwrap()
        .collect_media()
        .await
        .unwrap();
    assert_eq!(media.id.as_deref(), Some("img-7"));
    assert_eq!(media.primary_url(), Some("https://cdn.example/i.png"));
}

#[tokio::test]
async fn error_frame_ends_the_generation() {
    let fixture = MockServerFixture::new().await;
    let _mock = fixture
        .mock_sse_stream(
            "/veo/text-to-video",
            &[
                r#"{"status": "processing", "process_percentage": 20}"#,
                "event: error\ndata: {\"error\": \"quota exceeded\"}",
                r#"{"status": "completed", "file_url": "https://cdn.example/late.mp4"}"#,
            ],
        )
        .await;

    let client = fixture.client();
    let request = TextToVideoRequest::new("a lighthouse in heavy fog");
    let result = client
        .text_to_video(request.clone())
        .await
        .unwrap()
        .collect_result()
        .await
        .unwrap();
    assert_eq!(
        result,
        GenerationResult::Failed {
            message: "quota exceeded".into()
        }
    );

    let err = client
        .text_to_video(request)
        .await
        .unwrap()
        .collect_media()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::VideoGeneration { .. }));
}

#[tokio::test]
async fn malformed_frames_are_skipped() {
    let fixture = MockServerFixture::new().await;
    let _mock = fixture
        .mock_sse_stream(
            "/veo/text-to-video",
            &[
                "{not json",
                r#"{"status": "processing", "process_percentage": 70}"#,
                "{\"status\": \"compl",
                r#"{"status": "completed", "file_urls": ["https://cdn.example/a.mp4"]}"#,
            ],
        )
        .await;

    let media = fixture
        .client()
        .text_to_video(TextToVideoRequest::new("a lighthouse in heavy fog"))
        .await
        .unwrap()
        .collect_media()
        .await
        .unwrap();
    assert_eq!(media.urls, vec!["https://cdn.example/a.mp4".to_string()]);
}

#[tokio::test]
async fn early_close_is_an_interruption() {
    let fixture = MockServerFixture::new().await;
    let _mock = fixture
        .mock_sse_stream(
            "/veo/text-to-video",
            &[r#"{"status": "processing", "process_percentage": 5}"#],
        )
        .await;

    let err = fixture
        .client()
        .text_to_video(TextToVideoRequest::new("a lighthouse in heavy fog"))
        .await
        .unwrap()
        .collect_result()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::StreamInterrupted { .. }));
}

#[tokio::test]
async fn progress_is_carried_forward() {
    let fixture = MockServerFixture::new().await;
    let _mock = fixture
        .mock_sse_stream(
            "/veo/text-to-video",
            &[
                r#"{"status": "processing", "process_percentage": 40}"#,
                r#"{"status": "processing"}"#,
                r#"{"status": "completed", "file_url": "https://cdn.example/v.mp4"}"#,
            ],
        )
        .await;

    let updates: Vec<_> = fixture
        .client()
        .text_to_video(TextToVideoRequest::new("a lighthouse in heavy fog"))
        .await
        .unwrap()
        .with_progress()
        .map(|u| u.unwrap())
        .collect()
        .await;
    let progress: Vec<u8> = updates.iter().map(|u| u.progress).collect();
    assert_eq!(progress, vec![40, 40, 100]);
    assert!(updates[2].is_complete);
}

#[tokio::test]
async fn frames_to_video_uploads_multipart() {
    let fixture = MockServerFixture::new().await;
    let mock = {
        let mut server = fixture.server.lock().await;
        server
            .mock("POST", "/veo/frames-to-video")
            .match_header(
                "content-type",
                Matcher::Regex("^multipart/form-data; boundary=".into()),
            )
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"name="start_frame"; filename="start_frame.png""#.into()),
                Matcher::Regex("VIDEO_ASPECT_RATIO_LANDSCAPE".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(MockServerFixture::sse_body(&[
                r#"{"status": "completed", "file_url": "https://cdn.example/f.mp4"}"#,
            ]))
            .create_async()
            .await
    };

    let frame = std::env::temp_dir().join(format!("veo-frame-{}.png", uuid::Uuid::new_v4()));
    tokio::fs::write(&frame, b"not-really-a-png").await.unwrap();

    let request = FramesToVideoRequest::new("the kite lifts off", &frame)
        .aspect_ratio(AspectRatio::Landscape);
    let media = fixture
        .client()
        .frames_to_video(request)
        .await
        .unwrap()
        .collect_media()
        .await
        .unwrap();
    mock.assert_async().await;
    assert_eq!(media.primary_url(), Some("https://cdn.example/f.mp4"));
    let _ = tokio::fs::remove_file(&frame).await;
}

#[tokio::test]
async fn oversized_upload_is_rejected_locally() {
    let fixture = MockServerFixture::new().await;
    let frame = std::env::temp_dir().join(format!("veo-big-{}.jpg", uuid::Uuid::new_v4()));
    tokio::fs::write(&frame, vec![0u8; 2048]).await.unwrap();

    let client = fixture.builder().max_upload_bytes(1024).build().unwrap();
    let err = client
        .frames_to_video(FramesToVideoRequest::new("the kite lifts off", &frame))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, Error::InvalidImage { .. }));
    let _ = tokio::fs::remove_file(&frame).await;
}

#[tokio::test]
async fn progress_stream_holds_the_inflight_slot_until_dropped() {
    let fixture = MockServerFixture::new().await;
    let _mock = fixture
        .mock_sse_stream(
            "/veo/text-to-video",
            &[
                r#"{"status": "processing", "process_percentage": 10}"#,
                r#"{"status": "completed", "file_url": "https://cdn.example/v.mp4"}"#,
            ],
        )
        .await;

    let client = fixture.builder().max_inflight(1).build().unwrap();
    let mut updates = client
        .text_to_video(TextToVideoRequest::new("a lighthouse in heavy fog"))
        .await
        .unwrap()
        .with_progress();
    assert_eq!(updates.next().await.unwrap().unwrap().progress, 10);
    assert_eq!(client.signals().await.inflight.unwrap().in_use, 1);

    drop(updates);
    assert_eq!(client.signals().await.inflight.unwrap().in_use, 0);
}
