//! Quota, history and download

use crate::integration::mock_server::{MockServerFixture, TEST_API_KEY};
use mockito::Matcher;

#[tokio::test]
async fn quota_is_parsed() {
    let fixture = MockServerFixture::new().await;
    let mock = {
        let mut server = fixture.server.lock().await;
        server
            .mock("GET", "/veo/me")
            .match_header("authorization", format!("Bearer {}", TEST_API_KEY).as_str())
            .with_status(200)
            .with_body(r#"{"total_quota": 1000, "used_quota": 250, "available_quota": 750}"#)
            .create_async()
            .await
    };

    let quota = fixture.client().quota().await.unwrap();
    assert_eq!(quota.available_quota, 750);
    assert!((quota.usage_ratio() - 0.25).abs() < f64::EPSILON);
    mock.assert_async().await;
}

#[tokio::test]
async fn history_paging_is_clamped() {
    let fixture = MockServerFixture::new().await;
    let mock = {
        let mut server = fixture.server.lock().await;
        server
            .mock("GET", "/veo/histories")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("page".into(), "1".into()),
                Matcher::UrlEncoded("page_size".into(), "100".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"data": [
                    {"id": 42, "prompt": "A fox in snow", "status": "completed",
                     "file_urls": ["https://cdn.example/a.mp4", "https://cdn.example/b.mp4"]},
                    {"id": "x1", "prompt": "City at night", "status": "processing", "file_urls": null}
                ], "total": 2}"#,
            )
            .create_async()
            .await
    };

    let page = fixture.client().histories(0, 500).await.unwrap();
    mock.assert_async().await;
    assert_eq!(page.data.len(), 2);
    assert_eq!(page.data[0].id.as_deref(), Some("42"));
    assert_eq!(page.data[0].urls().len(), 2);
    assert!(page.data[1].urls().is_empty());
}

#[tokio::test]
async fn find_in_history_matches_loosely() {
    let fixture = MockServerFixture::new().await;
    let _mock = fixture
        .mock_get_json(
            "/veo/histories",
            200,
            r#"{"data": [
                {"id": "1", "prompt": "unrelated", "status": "completed", "file_url": "https://cdn.example/1.png"},
                {"id": "2", "prompt": "A red kite over the dunes, golden hour", "status": "completed",
                 "file_url": "https://cdn.example/2.png"}
            ]}"#,
        )
        .await;

    let found = fixture
        .client()
        .find_in_history("a red kite over the dunes", 10)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id.as_deref(), Some("2"));
    assert_eq!(found.urls(), vec!["https://cdn.example/2.png".to_string()]);
}

#[tokio::test]
async fn download_fetches_absolute_url() {
    let fixture = MockServerFixture::new().await;
    let mock = {
        let mut server = fixture.server.lock().await;
        server
            .mock("GET", "/files/clip.mp4")
            .with_status(200)
            .with_body(b"\x00\x00\x00\x18ftypmp42")
            .create_async()
            .await
    };

    let url = format!("{}/files/clip.mp4", fixture.base_url);
    let bytes = fixture.client().download(&url).await.unwrap();
    assert_eq!(&bytes[4..8], b"ftyp");
    mock.assert_async().await;

    let err = fixture.client().download("not a url").await.unwrap_err();
    assert!(matches!(err, genaipro_veo::Error::Validation { .. }));
}
