use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};

use crate::api::public::chat::ChatRequest;

pub type ByteStream = BoxStream<'static, Result<Bytes, Error>>;

/// Sends a chat request to the relay and hands back the raw response
/// body as it arrives.
#[async_trait]
pub trait RelayClient {
    async fn send(&self, request: &ChatRequest) -> Result<ByteStream, Error>;
}

pub struct HttpRelayClient {
    url: String,
    client: reqwest::Client,
}

impl HttpRelayClient {
    pub fn new(relay_url: &str) -> Self {
        Self {
            url: format!("{}/api/chat", relay_url.trim_end_matches("/")),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl RelayClient for HttpRelayClient {
    async fn send(&self, request: &ChatRequest) -> Result<ByteStream, Error> {
        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Relay returned {}: {}", status, body));
        }

        Ok(response.bytes_stream().map(|r| r.map_err(Error::from)).boxed())
    }
}
