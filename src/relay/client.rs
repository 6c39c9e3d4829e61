//! HTTP relay client.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use reqwest::{StatusCode, Url};
use serde_json::Value;

use super::{ImageReply, Method, RelayReply, RelayRequest, DEFAULT_TIMEOUT, EXPORT_TIMEOUT, STATUS_TIMEOUT};
use crate::config::RevitConfig;
use crate::error::ConfigError;

/// Sends relay calls to the host's route listener.
///
/// Each call builds its own HTTP client scoped to that call, so no
/// connection outlives it. There is no retry: the host's open document may
/// change between attempts, so a failure is reported once.
#[derive(Debug, Clone)]
pub struct RelayClient {
    base_url: Url,
    default_timeout: Duration,
    export_timeout: Duration,
    status_timeout: Duration,
}

impl RelayClient {
    /// Creates a client for the given base URL, e.g.
    /// `http://localhost:48884/revit_mcp`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not an absolute `http(s)` URL.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(base_url).map_err(|e| ConfigError::ValidationError {
            message: format!("Invalid Revit URL '{base_url}': {e}"),
        })?;

        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(ConfigError::ValidationError {
                message: format!("Invalid Revit URL '{base_url}': expected http:// or https://"),
            });
        }

        Ok(Self {
            base_url: url,
            default_timeout: DEFAULT_TIMEOUT,
            export_timeout: EXPORT_TIMEOUT,
            status_timeout: STATUS_TIMEOUT,
        })
    }

    /// Creates a client from the `revit` config section.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured URL is invalid.
    pub fn from_config(config: &RevitConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(&config.base_url())?.with_timeouts(
            Duration::from_secs(config.timeout_secs),
            Duration::from_secs(config.export_timeout_secs),
            Duration::from_secs(config.status_timeout_secs),
        ))
    }

    /// Overrides the three timeout classes.
    #[must_use]
    pub const fn with_timeouts(
        mut self,
        default_timeout: Duration,
        export_timeout: Duration,
        status_timeout: Duration,
    ) -> Self {
        self.default_timeout = default_timeout;
        self.export_timeout = export_timeout;
        self.status_timeout = status_timeout;
        self
    }

    /// Base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Bound for ordinary queries.
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Bound for export calls.
    #[must_use]
    pub const fn export_timeout(&self) -> Duration {
        self.export_timeout
    }

    /// Bound for the health probe.
    #[must_use]
    pub const fn status_timeout(&self) -> Duration {
        self.status_timeout
    }

    /// Full URL for a request. Segments are percent-encoded.
    #[must_use]
    pub fn url_for(&self, request: &RelayRequest) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(&request.segments);
        }
        url
    }

    /// Performs one JSON relay call.
    pub async fn call(&self, request: &RelayRequest) -> RelayReply {
        tracing::debug!(
            method = request.method.as_str(),
            path = %request.display_path(),
            timeout_secs = request.timeout.as_secs(),
            "Relay call"
        );

        let reply = match self.send(request).await {
            Err(message) => RelayReply::Failure(message),
            Ok((status, body)) if status == StatusCode::OK => match serde_json::from_str::<Value>(&body) {
                Ok(value) => RelayReply::Payload(value),
                Err(e) => RelayReply::Failure(format!("Error: invalid JSON in response: {e}")),
            },
            Ok((status, body)) => RelayReply::Failure(format!("Error: {} - {body}", status.as_u16())),
        };

        if let RelayReply::Failure(ref message) = reply {
            tracing::warn!(path = %request.display_path(), error = %message, "Relay call failed");
        }

        reply
    }

    /// Performs a relay call whose payload carries a base64 `image_data`
    /// field, and decodes it.
    pub async fn fetch_image(&self, request: &RelayRequest) -> ImageReply {
        let payload = match self.call(request).await {
            RelayReply::Payload(payload) => payload,
            RelayReply::Failure(message) => return ImageReply::Failure(message),
        };

        let Some(encoded) = payload.get("image_data").and_then(Value::as_str) else {
            return ImageReply::Failure("Error: response has no image_data".to_string());
        };

        match BASE64_STANDARD.decode(encoded) {
            Ok(data) => ImageReply::Image {
                data,
                mime_type: payload
                    .get("content_type")
                    .and_then(Value::as_str)
                    .unwrap_or("image/png")
                    .to_string(),
            },
            Err(e) => ImageReply::Failure(format!("Error: invalid image_data: {e}")),
        }
    }

    /// Sends the request and reads the whole body.
    async fn send(&self, request: &RelayRequest) -> Result<(StatusCode, String), String> {
        let client = reqwest::Client::builder()
            .timeout(request.timeout)
            .build()
            .map_err(|e| format!("Error: failed to build HTTP client: {e}"))?;

        let url = self.url_for(request);
        let mut builder = match request.method {
            Method::Get => client.get(url.clone()),
            Method::Post => client
                .post(url.clone())
                .json(request.body.as_ref().unwrap_or(&Value::Null)),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| describe_transport_error(&e, &url, request.timeout))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| format!("Error: failed to read response body: {e}"))?;

        Ok((status, body))
    }
}

fn describe_transport_error(error: &reqwest::Error, url: &Url, timeout: Duration) -> String {
    if error.is_timeout() {
        format!("Error: request to {url} timed out after {}s", timeout.as_secs())
    } else if error.is_connect() {
        format!("Error: could not connect to Revit at {url}: {error}")
    } else {
        format!("Error: {error}")
    }
}
