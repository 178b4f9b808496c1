use crate::model::FetchError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::HttpError(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        debug!("Fetching page {}", url);
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::HttpError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!("❌ Page fetch failed [{}]: {}", status, url);
            return Err(FetchError::InvalidResponse(status.as_u16()));
        }

        response.text().await.map_err(|e| FetchError::HttpError(e.to_string()))
    }
}
