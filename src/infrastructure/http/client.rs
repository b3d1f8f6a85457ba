use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

use crate::domain::ProvisionError;

/// Stream type for HTTP response bodies
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ProvisionError>> + Send>>;

/// Trait for HTTP client operations (for mocking)
#[async_trait]
pub trait HttpClientTrait: Send + Sync + std::fmt::Debug {
    /// GET `url` and return its body as a stream. Non-2xx statuses are
    /// [`ProvisionError::Remote`], transport failures are
    /// [`ProvisionError::FetchFailed`].
    async fn get_stream(&self, url: &str) -> Result<ByteStream, ProvisionError>;
}

/// Real HTTP client using reqwest
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Client whose connection attempts give up after `timeout`. The body
    /// transfer itself is bounded by the per-artifact deadline instead.
    pub fn with_connect_timeout(timeout: std::time::Duration) -> Result<Self, ProvisionError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ProvisionError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClientTrait for HttpClient {
    async fn get_stream(&self, url: &str) -> Result<ByteStream, ProvisionError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProvisionError::fetch_failed(url, format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ProvisionError::remote(url, response.status().as_u16()));
        }

        use futures::StreamExt;
        let source = url.to_string();
        let stream = response.bytes_stream().map(move |result| {
            result.map_err(|e| ProvisionError::fetch_failed(&source, format!("Stream error: {}", e)))
        });

        Ok(Box::pin(stream))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_get_stream_yields_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weights.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"abcdef".to_vec()))
            .mount(&server)
            .await;

        let client = HttpClient::new();
        let mut stream = client
            .get_stream(&format!("{}/weights.bin", server.uri()))
            .await
            .unwrap();

        let mut body = Vec::new();
        while let Some(chunk) = stream.next().await {
            body.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(body, b"abcdef");
    }

    #[tokio::test]
    async fn test_non_success_status_is_remote_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = HttpClient::new();
        let result = client.get_stream(&format!("{}/gated.bin", server.uri())).await;

        assert!(matches!(result, Err(ProvisionError::Remote { status: 403, .. })));
    }

    #[tokio::test]
    async fn test_connection_failure_is_fetch_failed() {
        let client = HttpClient::new();
        let result = client.get_stream("http://127.0.0.1:1/weights.bin").await;

        assert!(matches!(result, Err(ProvisionError::FetchFailed { .. })));
    }
}
