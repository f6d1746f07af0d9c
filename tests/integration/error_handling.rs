//! Integration tests for error mapping and retry

use crate::integration::mock_server::MockServerFixture;
use genaipro_veo::types::TextToVideoRequest;
use genaipro_veo::{Error, ErrorCategory};

#[tokio::test]
async fn server_errors_are_retried_then_surface_as_network_error() {
    let fixture = MockServerFixture::new().await;
    let mock = {
        let mut server = fixture.server.lock().await;
        server
            .mock("GET", "/veo/me")
            .with_status(503)
            .with_body(r#"{"message": "upstream unavailable"}"#)
            .expect(3)
            .create_async()
            .await
    };

    let err = fixture.client().quota().await.unwrap_err();
    mock.assert_async().await;
    assert!(matches!(err, Error::Network { .. }));
    assert!(err.to_string().contains("HTTP 503: upstream unavailable"));
    assert_eq!(err.category(), ErrorCategory::Retryable);
}

#[tokio::test]
async fn rate_limit_exhaustion_reports_max_retries() {
    let fixture = MockServerFixture::new().await;
    let mock = {
        let mut server = fixture.server.lock().await;
        server
            .mock("GET", "/veo/me")
            .with_status(429)
            .with_header("retry-after", "0")
            .with_body("slow down")
            .expect(2)
            .create_async()
            .await
    };

    let client = fixture.builder().max_retries(2).build().unwrap();
    let err = client.quota().await.unwrap_err();
    mock.assert_async().await;
    assert!(err.to_string().contains("Max retries (2) exceeded"));
}

#[tokio::test]
async fn unauthorized_is_not_retried() {
    let fixture = MockServerFixture::new().await;
    let mock = {
        let mut server = fixture.server.lock().await;
        server
            .mock("GET", "/veo/me")
            .with_status(401)
            .with_body(r#"{"detail": "bad token"}"#)
            .expect(1)
            .create_async()
            .await
    };

    let err = fixture.client().quota().await.unwrap_err();
    mock.assert_async().await;
    assert!(matches!(err, Error::Authentication { .. }));
    assert_eq!(err.category(), ErrorCategory::Permanent);
}

#[tokio::test]
async fn stream_open_status_mapping() {
    let fixture = MockServerFixture::new().await;
    let _quota = fixture
        .mock_post_error("/veo/text-to-video", 402, r#"{"message": "no credits"}"#)
        .await;
    let err = fixture
        .client()
        .text_to_video(TextToVideoRequest::new("a quiet harbour at dawn"))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, Error::QuotaExceeded { .. }));

    let fixture = MockServerFixture::new().await;
    let _captcha = fixture
        .mock_post_error(
            "/veo/text-to-video",
            403,
            r#"{"error": "reCAPTCHA verification failed"}"#,
        )
        .await;
    let err = fixture
        .client()
        .text_to_video(TextToVideoRequest::new("a quiet harbour at dawn"))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, Error::VideoGeneration { .. }));
    assert!(err.to_string().contains("HTTP 403: reCAPTCHA verification failed"));
    assert_eq!(
        genaipro_veo::resilience::retry::RetryStrategyKind::classify(&err.to_string()),
        genaipro_veo::resilience::retry::RetryStrategyKind::Recaptcha
    );
}

#[tokio::test]
async fn stream_open_is_single_attempt() {
    let fixture = MockServerFixture::new().await;
    let mock = {
        let mut server = fixture.server.lock().await;
        server
            .mock("POST", "/veo/text-to-video")
            .with_status(500)
            .with_body("boom")
            .expect(1)
            .create_async()
            .await
    };

    let err = fixture
        .client()
        .text_to_video(TextToVideoRequest::new("a quiet harbour at dawn"))
        .await
        .err()
        .unwrap();
    mock.assert_async().await;
    assert!(matches!(err, Error::Remote { status: 500, .. }));
}

#[tokio::test]
async fn invalid_requests_never_reach_the_server() {
    let fixture = MockServerFixture::new().await;
    let mock = {
        let mut server = fixture.server.lock().await;
        server
            .mock("POST", "/veo/text-to-video")
            .expect(0)
            .create_async()
            .await
    };

    let client = fixture.client();
    let empty = client
        .text_to_video(TextToVideoRequest::new("   "))
        .await
        .err()
        .unwrap();
    assert!(matches!(empty, Error::Validation { .. }));
    let too_many = client
        .text_to_video(TextToVideoRequest::new("a quiet harbour").number_of_videos(9))
        .await
        .err()
        .unwrap();
    assert!(too_many.to_string().contains("number_of_videos"));
    mock.assert_async().await;
}

#[tokio::test]
async fn backoff_sleep_releases_the_inflight_slot() {
    let fixture = MockServerFixture::new().await;
    let _mock = {
        let mut server = fixture.server.lock().await;
        server
            .mock("GET", "/veo/me")
            .with_status(429)
            .with_header("retry-after", "1")
            .with_body("slow down")
            .create_async()
            .await
    };

    let client = fixture.builder().max_inflight(1).max_retries(2).build().unwrap();
    let background = client.clone();
    let call = tokio::spawn(async move { background.quota().await });

    tokio::time::sleep(std::time::Duration::from_millis(400)).await;
    let inflight = client.signals().await.inflight.unwrap();
    assert_eq!(inflight.in_use, 0);
    assert_eq!(inflight.available, 1);

    assert!(call.await.unwrap().is_err());
}
