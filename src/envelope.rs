//! Uniform response envelope and the normalizer that produces it.
//!
//! Every route terminates in exactly one [`ResponseEnvelope`]: an HTTP-like
//! status plus either a success payload or an error message. Success
//! payloads always carry `"status": "success"` so a client that only reads
//! the body can still tell the outcome.

use serde_json::{json, Map, Value};

use crate::error::BridgeError;

/// Name reported by the status route.
pub const API_NAME: &str = "revit_mcp";

/// Most candidates attached to a not-found envelope.
pub const MAX_CANDIDATES: usize = 20;

/// Body of an envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvelopeBody {
    /// Success payload.
    Payload(Map<String, Value>),
    /// Error message plus optional extra fields.
    Error {
        /// Error message.
        message: String,
        /// Additional fields serialised next to `error`.
        extra: Map<String, Value>,
    },
}

/// The `{status, payload | error}` shape every operation returns.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    status: u16,
    body: EnvelopeBody,
}

impl ResponseEnvelope {
    /// A 200 envelope; adds the `"status": "success"` marker.
    #[must_use]
    pub fn success(mut payload: Map<String, Value>) -> Self {
        payload.insert("status".to_string(), json!("success"));
        Self {
            status: 200,
            body: EnvelopeBody::Payload(payload),
        }
    }

    /// An error envelope with the given status.
    #[must_use]
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: EnvelopeBody::Error {
                message: message.into(),
                extra: Map::new(),
            },
        }
    }

    /// Adds a field to the payload or, for errors, next to the message.
    #[must_use]
    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        match &mut self.body {
            EnvelopeBody::Payload(payload) => {
                payload.insert(key.to_string(), value);
            }
            EnvelopeBody::Error { extra, .. } => {
                extra.insert(key.to_string(), value);
            }
        }
        self
    }

    /// Maps a bridge failure to its envelope.
    #[must_use]
    pub fn from_error(error: &BridgeError) -> Self {
        let envelope = Self::error(error.status(), error.to_string());
        match error {
            BridgeError::EntityNotFound { candidates, .. } if !candidates.is_empty() => {
                let preview: Vec<&String> = candidates.iter().take(MAX_CANDIDATES).collect();
                envelope.with_field("candidates", json!(preview))
            }
            BridgeError::ArtifactNotCreated { attempts } => {
                envelope.with_field("attempts", json!(attempts))
            }
            _ => envelope,
        }
    }

    /// HTTP-like status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Whether this is a success envelope.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.body, EnvelopeBody::Payload(_))
    }

    /// The body.
    #[must_use]
    pub const fn body(&self) -> &EnvelopeBody {
        &self.body
    }

    /// JSON body as sent on the wire.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match &self.body {
            EnvelopeBody::Payload(payload) => Value::Object(payload.clone()),
            EnvelopeBody::Error { message, extra } => {
                let mut obj = Map::new();
                obj.insert("error".to_string(), json!(message));
                for (k, v) in extra {
                    obj.insert(k.clone(), v.clone());
                }
                Value::Object(obj)
            }
        }
    }
}

impl From<BridgeError> for ResponseEnvelope {
    fn from(error: BridgeError) -> Self {
        Self::from_error(&error)
    }
}

/// Strips everything outside printable ASCII from every string in `value`,
/// keys included, and trims the result.
#[must_use]
pub fn sanitize(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize_text(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (sanitize_text(&k), sanitize(v)))
                .collect(),
        ),
        other => other,
    }
}

fn sanitize_text(text: &str) -> String {
    text.chars()
        .filter(|c| (' '..='~').contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}
