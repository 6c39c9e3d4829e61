//! Relay: one outbound call from the bridge to the host's route listener.
//!
//! A relay call never fails as control flow. Non-200 statuses, transport
//! faults and malformed bodies all come back as [`RelayReply::Failure`]
//! carrying a descriptive string, through the same channel as success.

mod client;

pub use client::RelayClient;

use std::time::Duration;

use serde_json::Value;

/// Default bound for ordinary queries.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Extended bound for PDF/image export, which blocks on host rendering.
pub const EXPORT_TIMEOUT: Duration = Duration::from_secs(60);

/// Bound for the health probe.
pub const STATUS_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP-like request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Query.
    Get,
    /// Command with a JSON body.
    Post,
}

impl Method {
    /// Upper-case method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// One outbound relay call.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayRequest {
    /// Method.
    pub method: Method,
    /// Path segments relative to the base URL. An empty last segment keeps
    /// the trailing slash.
    pub segments: Vec<String>,
    /// JSON body for POST.
    pub body: Option<Value>,
    /// Query parameters.
    pub query: Vec<(String, String)>,
    /// Bound on the whole call.
    pub timeout: Duration,
}

impl RelayRequest {
    /// A GET for a fixed endpoint such as `/list_sheets/`.
    #[must_use]
    pub fn get(endpoint: &str) -> Self {
        Self {
            method: Method::Get,
            segments: split_endpoint(endpoint),
            body: None,
            query: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// A POST with a JSON body.
    #[must_use]
    pub fn post(endpoint: &str, body: Value) -> Self {
        Self {
            method: Method::Post,
            body: Some(body),
            ..Self::get(endpoint)
        }
    }

    /// A GET for `/<route>/<entity>`. The entity is one path segment and is
    /// percent-encoded on the wire.
    #[must_use]
    pub fn get_entity(route: &str, entity: &str) -> Self {
        let mut request = Self::get(route);
        request.segments.retain(|s| !s.is_empty());
        request.segments.push(entity.to_string());
        request
    }

    /// Overrides the timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Path as shown in logs.
    #[must_use]
    pub fn display_path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

fn split_endpoint(endpoint: &str) -> Vec<String> {
    endpoint
        .strip_prefix('/')
        .unwrap_or(endpoint)
        .split('/')
        .map(str::to_string)
        .collect()
}

/// Result of a JSON relay call.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayReply {
    /// The decoded 200 body.
    Payload(Value),
    /// What went wrong, ready to show to a caller.
    Failure(String),
}

impl RelayReply {
    /// Whether this is a failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }
}

/// Result of an image relay call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageReply {
    /// Decoded image bytes.
    Image {
        /// Raw image bytes.
        data: Vec<u8>,
        /// MIME type reported by the host.
        mime_type: String,
    },
    /// What went wrong.
    Failure(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_keeps_trailing_slash_segment() {
        let request = RelayRequest::get("/list_sheets/");
        assert_eq!(request.segments, vec!["list_sheets", ""]);
        assert_eq!(request.display_path(), "/list_sheets/");
        assert_eq!(request.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn get_entity_appends_one_segment() {
        let request = RelayRequest::get_entity("/sheet_info/", "A/101");
        assert_eq!(request.segments, vec!["sheet_info", "A/101"]);
    }

    #[test]
    fn post_carries_body() {
        let request = RelayRequest::post("/export_sheets_pdf/", json!({"sheets": ["A101"]}))
            .with_timeout(EXPORT_TIMEOUT);
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.body, Some(json!({"sheets": ["A101"]})));
        assert_eq!(request.timeout, EXPORT_TIMEOUT);
    }
}
