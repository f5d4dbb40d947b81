//! Radar metadata sources.
//! Uses the RainViewer public maps index - free, no API key required.

use reqwest::Client;
use serde_json::Value;
use skycast_core::{RadarConfig, ReqwestErrorExt};
use std::future::Future;
use std::time::Duration;
use tracing::instrument;

use crate::types::RadarError;

pub const RAINVIEWER_URL: &str = skycast_core::config::DEFAULT_RADAR_SOURCE_URL;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = "Skycast/0.1.0";

/// Something that can produce raw radar metadata.
///
/// Implementations do not retry; a failed fetch is reported and the caller
/// decides when to try again.
pub trait FrameSource: Send + Sync {
    fn fetch(&self) -> impl Future<Output = Result<Value, RadarError>> + Send;
}

/// HTTP source for RainViewer-compatible metadata.
#[derive(Debug, Clone)]
pub struct RainViewerSource {
    client: Client,
    url: String,
    timeout: Duration,
}

impl RainViewerSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RadarError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RadarError::Network(e.into_network_error()))?;

        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    pub fn from_config(config: &RadarConfig) -> Result<Self, RadarError> {
        Self::new(
            config.source_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch_inner(&self) -> Result<Value, RadarError> {
        let response = self.client.get(&self.url).send().await.map_err(|e| {
            if e.is_timeout() {
                RadarError::Timeout(self.timeout)
            } else {
                RadarError::Network(e.into_network_error())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Radar source returned status {}", status);
            return Err(RadarError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RadarError::Network(e.into_network_error()))?;

        // Undecodable bodies are handed on as null; normalization turns
        // them into an empty dataset.
        Ok(serde_json::from_str(&body).unwrap_or_else(|e| {
            tracing::warn!("Radar response is not JSON: {}", e);
            Value::Null
        }))
    }
}

impl FrameSource for RainViewerSource {
    #[instrument(skip(self), fields(url = %self.url), level = "info")]
    async fn fetch(&self) -> Result<Value, RadarError> {
        match tokio::time::timeout(self.timeout, self.fetch_inner()).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Radar fetch timed out after {:?}", self.timeout);
                Err(RadarError::Timeout(self.timeout))
            }
        }
    }
}
