//! Route dispatcher: the host-side half of the relay protocol.
//!
//! A [`Dispatcher`] is built once from a fixed table of
//! `{method, path pattern, handler}` entries. For every request it looks up
//! the route, asks the [`SessionProvider`] for the open document, and hands
//! that document to the handler as a parameter. Whatever the handler
//! returns, success or [`BridgeError`], comes back as one
//! [`ResponseEnvelope`].
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | GET  | `/status/` | health probe |
//! | GET  | `/model_info/` | model summary |
//! | GET  | `/list_levels/` | levels by elevation |
//! | GET  | `/list_sheets/` | sheets by `(number, name)` |
//! | GET  | `/sheet_info/<sheet_number>` | sheet detail |
//! | POST | `/export_sheets_pdf/` | combined PDF |
//! | GET  | `/sheet_image/<sheet_number>` | PNG snapshot |

mod handlers;
pub mod http;

use std::sync::Arc;

use serde_json::Value;

use crate::envelope::ResponseEnvelope;
use crate::error::BridgeError;
use crate::export::{ExportSelector, SelectorSettings};
use crate::host::{Document, SessionProvider};
use crate::relay::Method;

/// Shared, probe-once state handed to every handler.
pub struct RouteContext {
    /// Export strategies resolved from the host's capabilities.
    pub export: ExportSelector,
}

/// One incoming request as a handler sees it.
#[derive(Debug, Clone, Default)]
pub struct RouteRequest {
    params: Vec<(String, String)>,
    body: Option<Value>,
}

impl RouteRequest {
    /// Creates a request with the given path parameters and body.
    #[must_use]
    pub const fn new(params: Vec<(String, String)>, body: Option<Value>) -> Self {
        Self { params, body }
    }

    /// A path parameter captured by `<name>` in the route pattern.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// The JSON body.
    #[must_use]
    pub const fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}

/// Handler signature. The open document, if any, is injected by the
/// dispatcher.
pub type Handler =
    fn(&RouteContext, Option<&dyn Document>, &RouteRequest) -> Result<ResponseEnvelope, BridgeError>;

/// One route table entry.
#[derive(Clone, Copy)]
pub struct Route {
    /// Method.
    pub method: Method,
    /// Path pattern; `<name>` captures one segment.
    pub pattern: &'static str,
    /// Handler.
    pub handler: Handler,
}

/// The host-side router.
pub struct Dispatcher {
    routes: Vec<Route>,
    context: RouteContext,
    session: Arc<dyn SessionProvider>,
}

impl Dispatcher {
    /// Builds the dispatcher with the standard route table.
    ///
    /// Export capabilities are probed from `session` here, once.
    #[must_use]
    pub fn new(session: Arc<dyn SessionProvider>, settings: &SelectorSettings) -> Self {
        let export = ExportSelector::from_capabilities(&session.export_capabilities(), settings);
        Self::with_selector(session, export)
    }

    /// Builds the dispatcher with an explicit export selector.
    #[must_use]
    pub fn with_selector(session: Arc<dyn SessionProvider>, export: ExportSelector) -> Self {
        let routes = handlers::route_table();
        tracing::info!(routes = routes.len(), "Routes registered");
        Self {
            routes,
            context: RouteContext { export },
            session,
        }
    }

    /// The route table.
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Dispatches one request. Never fails: every outcome is an envelope.
    #[must_use]
    pub fn dispatch(&self, method: Method, path: &str, body: Option<Value>) -> ResponseEnvelope {
        let mut path_matched = false;

        for route in &self.routes {
            let Some(params) = match_pattern(route.pattern, path) else {
                continue;
            };
            if route.method != method {
                path_matched = true;
                continue;
            }

            let document = self.session.active_document();
            let request = RouteRequest::new(params, body);

            return match (route.handler)(&self.context, document.as_deref(), &request) {
                Ok(envelope) => envelope,
                Err(error) => {
                    match &error {
                        BridgeError::InternalFailure(_) | BridgeError::ArtifactNotCreated { .. } => {
                            tracing::error!(path = %path, error = %error, "Route failed");
                        }
                        _ => tracing::debug!(path = %path, error = %error, "Route rejected request"),
                    }
                    ResponseEnvelope::from_error(&error)
                }
            };
        }

        if path_matched {
            ResponseEnvelope::error(
                405,
                format!("Method {} not allowed for {path}", method.as_str()),
            )
        } else {
            ResponseEnvelope::error(404, format!("No route for {path}"))
        }
    }
}

/// Matches `path` against `pattern`, returning captured parameters.
///
/// A trailing slash on either side is ignored. Captures never span a `/`.
fn match_pattern(pattern: &str, path: &str) -> Option<Vec<(String, String)>> {
    let pattern_segments: Vec<&str> = pattern.trim_matches('/').split('/').collect();
    let path_segments: Vec<&str> = path.trim_matches('/').split('/').collect();

    if pattern_segments.len() != path_segments.len() {
        return None;
    }

    let mut params = Vec::new();
    for (expected, actual) in pattern_segments.iter().zip(&path_segments) {
        if let Some(name) = expected.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
            if actual.is_empty() {
                return None;
            }
            params.push((name.to_string(), (*actual).to_string()));
        } else if expected != actual {
            return None;
        }
    }
    Some(params)
}
