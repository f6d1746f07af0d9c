use super::TransportError;
use crate::{BoxStream, Error, Result};
use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::multipart::Form;
use reqwest::Proxy;
use std::time::Duration;
use tracing::debug;

/// Header carrying our own correlation id. The vendor ignores it; it ties
/// log lines to a request.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Connection pool and timeout knobs of the shared HTTP client.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    /// Bound on a whole non-streaming request. Streaming bodies are bounded by
    /// the pipeline's idle timeout instead.
    pub request_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: Duration,
    pub proxy_url: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(300),
            pool_max_idle_per_host: 5,
            pool_idle_timeout: Duration::from_secs(30),
            proxy_url: None,
        }
    }
}

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    request_timeout: Duration,
}

impl HttpTransport {
    pub fn new(base_url: &str, api_key: &str, config: &TransportConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(Some(config.pool_idle_timeout))
            .tcp_keepalive(Some(Duration::from_secs(30)));

        if let Some(proxy_url) = &config.proxy_url {
            let proxy = Proxy::all(proxy_url).map_err(|e| {
                Error::configuration(format!("invalid proxy url '{}': {}", proxy_url, e))
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            request_timeout: config.request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, req: reqwest::RequestBuilder, request_id: &str) -> reqwest::RequestBuilder {
        req.bearer_auth(&self.api_key)
            .header(REQUEST_ID_HEADER, request_id)
    }

    pub async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
        request_id: &str,
    ) -> Result<reqwest::Response> {
        let req = self
            .client
            .get(self.url(path))
            .query(query)
            .header("accept", "application/json")
            .timeout(self.request_timeout);
        debug!(path, request_id, "GET");
        self.authed(req, request_id)
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))
    }

    /// POST a JSON body and ask for an event stream back.
    pub async fn post_json_stream(
        &self,
        path: &str,
        body: &serde_json::Value,
        request_id: &str,
    ) -> Result<reqwest::Response> {
        let req = self
            .client
            .post(self.url(path))
            .json(body)
            .header("accept", "text/event-stream");
        debug!(path, request_id, "POST (stream)");
        self.authed(req, request_id)
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))
    }

    /// POST a multipart form and ask for an event stream back.
    pub async fn post_multipart_stream(
        &self,
        path: &str,
        form: Form,
        request_id: &str,
    ) -> Result<reqwest::Response> {
        let req = self
            .client
            .post(self.url(path))
            .multipart(form)
            .header("accept", "text/event-stream");
        debug!(path, request_id, "POST multipart (stream)");
        self.authed(req, request_id)
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))
    }

    /// Fetch an absolute URL (generated assets live on a CDN, not the API host).
    pub async fn download(&self, url: &str) -> Result<Bytes> {
        let resp = self
            .client
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::network_with_context(
                format!("download failed with HTTP {}", status.as_u16()),
                crate::ErrorContext::new()
                    .with_status_code(status.as_u16())
                    .with_source("download"),
            ));
        }
        resp.bytes()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))
    }

    /// Convert a response body into our unified byte stream.
    pub fn body_stream(resp: reqwest::Response) -> BoxStream<'static, Bytes> {
        let byte_stream = resp
            .bytes_stream()
            .map_err(|e| Error::Transport(TransportError::Http(e)));
        Box::pin(byte_stream)
    }
}
