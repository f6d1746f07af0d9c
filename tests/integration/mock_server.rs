//! Mock HTTP server setup for integration tests

use genaipro_veo::{VeoClient, VeoClientBuilder};
use mockito::{Matcher, Mock, Server, ServerGuard};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub const TEST_API_KEY: &str = "test-key";

/// Test fixture that manages a mock server
pub struct MockServerFixture {
    pub server: Arc<Mutex<ServerGuard>>,
    pub base_url: String,
}

impl MockServerFixture {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        let base_url = server.url();
        Self {
            server: Arc::new(Mutex::new(server)),
            base_url,
        }
    }

    /// Client pointed at the mock server with fast retries and no rate limit.
    pub fn client(&self) -> VeoClient {
        self.builder().build().expect("client")
    }

    pub fn builder(&self) -> VeoClientBuilder {
        VeoClientBuilder::new()
            .api_key(TEST_API_KEY)
            .base_url(&self.base_url)
            .retry_base_delay(Duration::from_millis(5))
            .requests_per_minute(0)
    }

    /// Build an SSE body. Frames that already carry a field name are kept
    /// as they are; anything else becomes a `data:` line.
    pub fn sse_body(frames: &[&str]) -> String {
        frames
            .iter()
            .map(|frame| {
                if frame.starts_with("data:") || frame.starts_with("event:") {
                    format!("{}\n\n", frame)
                } else {
                    format!("data: {}\n\n", frame)
                }
            })
            .collect()
    }

    /// Create a mock for a streaming generation response
    pub async fn mock_sse_stream(&self, path: &str, frames: &[&str]) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock("POST", path)
            .match_header("authorization", format!("Bearer {}", TEST_API_KEY).as_str())
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(Self::sse_body(frames))
            .create_async()
            .await
    }

    /// Create a mock for an error response to a generation request
    pub async fn mock_post_error(&self, path: &str, status: u16, body: &str) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock("POST", path)
            .with_status(status as usize)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    /// Create a mock for a JSON GET endpoint, any query string
    pub async fn mock_get_json(&self, path: &str, status: u16, body: &str) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock("GET", path)
            .match_query(Matcher::Any)
            .with_status(status as usize)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }
}
