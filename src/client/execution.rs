//! Request execution logic (single-attempt stream open).

use crate::client::error_classification::{classify_status, Phase};
use crate::client::generation::GenerationStream;
use crate::client::preflight::{header_first, retry_after_ms, UPSTREAM_ID_HEADERS};
use crate::client::types::CallStats;
use crate::transport::HttpTransport;
use crate::Result;
use reqwest::multipart::Form;
use tracing::info;
use uuid::Uuid;

use super::core::VeoClient;

/// Body of a generation request.
pub(crate) enum StreamBody {
    Json(serde_json::Value),
    Multipart(Form),
}

impl VeoClient {
    /// Start a generation and return its event stream.
    ///
    /// This is a single attempt: a started generation costs credits, so the
    /// client never replays it on its own.
    pub(crate) async fn open_stream(
        &self,
        endpoint: &str,
        body: StreamBody,
    ) -> Result<GenerationStream> {
        let permit = self.preflight().await?;
        let client_request_id = Uuid::new_v4().to_string();
        let start = std::time::Instant::now();

        let resp = match body {
            StreamBody::Json(json) => {
                self.transport
                    .post_json_stream(endpoint, &json, &client_request_id)
                    .await?
            }
            StreamBody::Multipart(form) => {
                self.transport
                    .post_multipart_stream(endpoint, form, &client_request_id)
                    .await?
            }
        };

        let http_status = resp.status().as_u16();
        let upstream_request_id = header_first(resp.headers(), UPSTREAM_ID_HEADERS);

        if !resp.status().is_success() {
            let retry_after = retry_after_ms(resp.headers());
            let body = resp.text().await.unwrap_or_default();
            let err = classify_status(
                http_status,
                &body,
                retry_after,
                &client_request_id,
                Phase::StreamOpen,
            );
            if http_status == 429 {
                self.note_rate_limited(retry_after).await;
            }
            info!(
                http_status,
                standard_code = err.standard_code().code(),
                request_id = upstream_request_id.as_deref().unwrap_or(""),
                endpoint,
                duration_ms = start.elapsed().as_millis(),
                "generation request failed"
            );
            return Err(err);
        }

        info!(
            http_status,
            client_request_id = client_request_id.as_str(),
            endpoint,
            duration_ms = start.elapsed().as_millis(),
            "generation stream opened"
        );

        let events = self
            .pipeline
            .process_stream(HttpTransport::body_stream(resp));

        let stats = CallStats {
            endpoint: endpoint.to_string(),
            http_status,
            retry_count: 0,
            duration_ms: start.elapsed().as_millis(),
            client_request_id,
            upstream_request_id,
            signals: self.signals().await,
        };

        Ok(GenerationStream::new(events, stats, permit))
    }
}
