//! reqwest-backed controller client.

use crate::api::{BoxFuture, ControllerApi, Endpoint};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use reqwest::Client;
use tracing::{debug, trace};
use trafficctl_core::{
    AnalyticsSnapshot, CameraImage, CameraResponse, ControlCommand, CoreError, SystemStatus,
    DIRECTION_COUNT,
};

/// Longest slice of an unparseable error body kept in the error message.
const MAX_ERROR_BODY: usize = 200;

/// HTTP client for the controller endpoints.
#[derive(Debug)]
pub struct HttpControllerApi {
    client: Client,
    base_url: String,
}

/// Extract the controller's `{"error": "..."}` message, or a body excerpt.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(msg) = value.get("error").and_then(|e| e.as_str()) {
            return msg.to_string();
        }
    }
    body.chars().take(MAX_ERROR_BODY).collect()
}

impl HttpControllerApi {
    /// Create a new controller client.
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "base_url must be an http(s) origin, got {base_url:?}"
            )));
        }

        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ClientError::Http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    /// Controller origin without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    async fn read_body(&self, endpoint: Endpoint, response: reqwest::Response) -> ClientResult<String> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Http(format!("{endpoint}: failed to read body: {e}")))?;

        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        trace!(%endpoint, bytes = body.len(), "Response received");
        Ok(body)
    }

    async fn get(&self, endpoint: Endpoint) -> ClientResult<String> {
        let url = self.url(endpoint);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ClientError::Http(format!("GET {url} failed: {e}")))?;
        self.read_body(endpoint, response).await
    }

    async fn post_command(&self, command: ControlCommand) -> ClientResult<()> {
        let url = self.url(Endpoint::Control);
        debug!(%command, "Sending control command");

        let response = self
            .client
            .post(&url)
            .json(&command)
            .send()
            .await
            .map_err(|e| ClientError::Http(format!("POST {url} failed: {e}")))?;
        self.read_body(Endpoint::Control, response).await?;
        Ok(())
    }
}

impl ControllerApi for HttpControllerApi {
    fn fetch_status(&self) -> BoxFuture<'_, ClientResult<SystemStatus>> {
        Box::pin(async move {
            let body = self.get(Endpoint::Status).await?;
            Ok(SystemStatus::from_json(&body)?)
        })
    }

    fn fetch_camera(&self, index: usize) -> BoxFuture<'_, ClientResult<Option<CameraImage>>> {
        Box::pin(async move {
            if index >= DIRECTION_COUNT {
                return Err(ClientError::InvalidCamera(index));
            }
            let body = self.get(Endpoint::Camera(index)).await?;
            let frame: CameraResponse = serde_json::from_str(&body).map_err(CoreError::from)?;
            Ok(frame.into_image())
        })
    }

    fn fetch_analytics(&self) -> BoxFuture<'_, ClientResult<AnalyticsSnapshot>> {
        Box::pin(async move {
            let body = self.get(Endpoint::Analytics).await?;
            Ok(AnalyticsSnapshot::from_json(&body)?)
        })
    }

    fn send_command(&self, command: ControlCommand) -> BoxFuture<'_, ClientResult<()>> {
        Box::pin(self.post_command(command))
    }
}
