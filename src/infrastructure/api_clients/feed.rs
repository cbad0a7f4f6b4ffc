//! Vulnerability reference feed client

use super::traits::AdvisoryFeed;
use crate::application::errors::IndexError;
use crate::config::FeedConfig;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

/// Fetches the advisory feed document over HTTP
pub struct FeedClient {
    client: Client,
    url: String,
}

impl FeedClient {
    pub fn new(url: String, timeout: Duration) -> Result<Self, IndexError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("deppkg/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, url })
    }

    pub fn from_config(config: &FeedConfig) -> Result<Self, IndexError> {
        Self::new(
            config.url.clone(),
            Duration::from_secs(config.timeout_seconds),
        )
    }
}

#[async_trait]
impl AdvisoryFeed for FeedClient {
    async fn fetch(&self) -> Result<serde_json::Value, IndexError> {
        info!(url = %self.url, "Downloading vulnerability reference feed");

        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(IndexError::Http {
                status: response.status().as_u16(),
            });
        }

        let body = response.bytes().await?;
        debug!(bytes = body.len(), "Feed downloaded");

        serde_json::from_slice(&body).map_err(|e| IndexError::Format {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use serde_json::json;

    #[tokio::test]
    async fn test_fetch_success() {
        let mut server = Server::new_async().await;
        let document = json!({
            "django": [{"id": "pyup.io-12345", "cve": "CVE-2021-0001"}]
        });

        let mock = server
            .mock("GET", "/insecure_full.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(document.to_string())
            .expect(1)
            .create_async()
            .await;

        let client = FeedClient::new(
            format!("{}/insecure_full.json", server.url()),
            Duration::from_secs(5),
        )
        .unwrap();

        let fetched = client.fetch().await.unwrap();

        mock.assert_async().await;
        assert_eq!(fetched, document);
    }

    #[tokio::test]
    async fn test_fetch_http_error() {
        let mut server = Server::new_async().await;

        let _mock = server
            .mock("GET", "/feed.json")
            .with_status(503)
            .create_async()
            .await;

        let client =
            FeedClient::new(format!("{}/feed.json", server.url()), Duration::from_secs(5)).unwrap();

        match client.fetch().await {
            Err(IndexError::Http { status }) => assert_eq!(status, 503),
            other => panic!("Expected HTTP error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_invalid_json() {
        let mut server = Server::new_async().await;

        let _mock = server
            .mock("GET", "/feed.json")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let client =
            FeedClient::new(format!("{}/feed.json", server.url()), Duration::from_secs(5)).unwrap();

        assert!(matches!(
            client.fetch().await,
            Err(IndexError::Format { .. })
        ));
    }
}
