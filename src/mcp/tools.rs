//! Tool table: one MCP tool per host capability, each a single relay call.

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::relay::{ImageReply, RelayClient, RelayReply, RelayRequest};

/// A tool definition for tools/list response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
}

/// Parameters for tools/call request.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    /// Name of the tool to call.
    pub name: String,
    /// Arguments for the tool.
    #[serde(default)]
    pub arguments: Value,
}

/// Content item in a tool call response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
    /// Base64 image content.
    Image {
        /// Base64-encoded image bytes.
        data: String,
        /// MIME type of the image.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde's skip_serializing_if passes &T
const fn is_false(b: &bool) -> bool {
    !*b
}

/// Result of a tool call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Content returned by the tool.
    pub content: Vec<ToolContent>,
    /// Whether the tool call resulted in an error.
    #[serde(skip_serializing_if = "is_false")]
    pub is_error: bool,
}

impl ToolCallResult {
    /// Creates a successful text result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Creates an error text result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }

    /// Creates an image result.
    #[must_use]
    pub fn image(data: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Image {
                data: BASE64_STANDARD.encode(data),
                mime_type: mime_type.into(),
            }],
            is_error: false,
        }
    }

    /// Pretty JSON payload as text.
    #[must_use]
    pub fn json(value: &Value) -> Self {
        match serde_json::to_string_pretty(value) {
            Ok(text) => Self::text(text),
            Err(e) => Self::error(format!("Error: failed to serialise payload: {e}")),
        }
    }
}

/// Returns the list of available tools.
#[must_use]
pub fn definitions() -> Vec<ToolDefinition> {
    let no_args = json!({ "type": "object", "properties": {} });
    let sheet_number = json!({
        "type": "object",
        "properties": {
            "sheet_number": {
                "type": "string",
                "description": "Sheet number as shown in Revit, e.g. \"A101\""
            }
        },
        "required": ["sheet_number"]
    });

    vec![
        ToolDefinition {
            name: "get_revit_status".to_string(),
            description: Some(
                "Check whether the Revit route listener is reachable and a document is open."
                    .to_string(),
            ),
            input_schema: no_args.clone(),
        },
        ToolDefinition {
            name: "get_revit_model_info".to_string(),
            description: Some(
                "Summarise the open model: project information, element counts by category, \
                 warnings, levels and a breakdown of views."
                    .to_string(),
            ),
            input_schema: no_args.clone(),
        },
        ToolDefinition {
            name: "list_levels".to_string(),
            description: Some(
                "List all levels with their elevations, ordered from lowest to highest."
                    .to_string(),
            ),
            input_schema: no_args.clone(),
        },
        ToolDefinition {
            name: "list_sheets".to_string(),
            description: Some(
                "List all sheets (number, name, id), ordered by sheet number then name."
                    .to_string(),
            ),
            input_schema: no_args,
        },
        ToolDefinition {
            name: "get_sheet_info".to_string(),
            description: Some(
                "Get one sheet's placed views, text notes and other elements. Unknown sheet \
                 numbers return a list of valid candidates."
                    .to_string(),
            ),
            input_schema: sheet_number.clone(),
        },
        ToolDefinition {
            name: "export_sheets_pdf".to_string(),
            description: Some(
                "Export one or more sheets to a single combined PDF, returned base64-encoded. \
                 Sheets may be given by sheet number or by element id."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "sheets": {
                        "type": "array",
                        "items": { "type": ["string", "integer"] },
                        "minItems": 1,
                        "description": "Sheet numbers (e.g. \"A101\") or element ids"
                    }
                },
                "required": ["sheets"]
            }),
        },
        ToolDefinition {
            name: "get_sheet_image".to_string(),
            description: Some("Render one sheet to a PNG image.".to_string()),
            input_schema: sheet_number,
        },
    ]
}

/// Timeouts used for each tool's relay call.
#[derive(Debug, Clone, Copy)]
enum TimeoutClass {
    Status,
    Default,
    Export,
}

fn timed(relay: &RelayClient, request: RelayRequest, class: TimeoutClass) -> RelayRequest {
    let timeout = match class {
        TimeoutClass::Status => relay.status_timeout(),
        TimeoutClass::Default => relay.default_timeout(),
        TimeoutClass::Export => relay.export_timeout(),
    };
    request.with_timeout(timeout)
}

/// Calls one tool. Relay failures come back as error results, never as
/// protocol errors.
pub async fn call_tool(relay: &RelayClient, name: &str, arguments: &Value) -> ToolCallResult {
    let request = match build_request(name, arguments) {
        Ok(Some((request, class))) => timed(relay, request, class),
        Ok(None) => return ToolCallResult::error(format!("Unknown tool: {name}")),
        Err(message) => return ToolCallResult::error(message),
    };

    tracing::debug!(tool = name, path = %request.display_path(), "Calling tool");

    if name == "get_sheet_image" {
        return match relay.fetch_image(&request).await {
            ImageReply::Image { data, mime_type } => ToolCallResult::image(&data, mime_type),
            ImageReply::Failure(message) => ToolCallResult::error(message),
        };
    }

    match relay.call(&request).await {
        RelayReply::Payload(payload) => ToolCallResult::json(&payload),
        RelayReply::Failure(message) => ToolCallResult::error(message),
    }
}

/// Maps a tool call to its relay request. `Ok(None)` for an unknown tool.
fn build_request(
    name: &str,
    arguments: &Value,
) -> Result<Option<(RelayRequest, TimeoutClass)>, String> {
    let built = match name {
        "get_revit_status" => (RelayRequest::get("/status/"), TimeoutClass::Status),
        "get_revit_model_info" => (RelayRequest::get("/model_info/"), TimeoutClass::Default),
        "list_levels" => (RelayRequest::get("/list_levels/"), TimeoutClass::Default),
        "list_sheets" => (RelayRequest::get("/list_sheets/"), TimeoutClass::Default),
        "get_sheet_info" => (
            RelayRequest::get_entity("/sheet_info/", &sheet_number_arg(arguments)?),
            TimeoutClass::Default,
        ),
        "get_sheet_image" => (
            RelayRequest::get_entity("/sheet_image/", &sheet_number_arg(arguments)?),
            TimeoutClass::Export,
        ),
        "export_sheets_pdf" => (
            RelayRequest::post("/export_sheets_pdf/", json!({ "sheets": sheets_arg(arguments)? })),
            TimeoutClass::Export,
        ),
        _ => return Ok(None),
    };
    Ok(Some(built))
}

fn sheet_number_arg(arguments: &Value) -> Result<String, String> {
    let value = arguments
        .get("sheet_number")
        .ok_or("Missing required parameter: sheet_number")?;

    let number = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) if n.is_i64() || n.is_u64() => n.to_string(),
        _ => return Err("sheet_number must be a string".to_string()),
    };

    if number.is_empty() {
        return Err("sheet_number must not be empty".to_string());
    }
    Ok(number)
}

fn sheets_arg(arguments: &Value) -> Result<Vec<Value>, String> {
    let sheets = arguments
        .get("sheets")
        .ok_or("Missing required parameter: sheets")?
        .as_array()
        .ok_or("sheets must be a list of sheet numbers or ids")?;

    if sheets.is_empty() {
        return Err("sheets must contain at least one sheet".to_string());
    }
    if let Some(bad) = sheets
        .iter()
        .find(|v| !(v.is_string() || v.is_i64() || v.is_u64()))
    {
        return Err(format!("Invalid sheet reference: {bad}"));
    }
    Ok(sheets.clone())
}
