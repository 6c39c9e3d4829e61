//! Route handlers. Each receives the open document, if any, as a parameter.

use serde_json::{json, Map, Value};

use super::{Route, RouteContext, RouteRequest};
use crate::envelope::{sanitize, ResponseEnvelope, API_NAME};
use crate::error::BridgeError;
use crate::export::ExportJob;
use crate::host::{
    view_breakdown, Category, Document, ProjectInfo, SheetElement, SheetRecord, WarningSummary,
};
use crate::lookup::{self, SheetRef};
use crate::relay::Method;

/// The fixed route table.
pub(super) fn route_table() -> Vec<Route> {
    vec![
        Route {
            method: Method::Get,
            pattern: "/status/",
            handler: status,
        },
        Route {
            method: Method::Get,
            pattern: "/model_info/",
            handler: model_info,
        },
        Route {
            method: Method::Get,
            pattern: "/list_levels/",
            handler: list_levels,
        },
        Route {
            method: Method::Get,
            pattern: "/list_sheets/",
            handler: list_sheets,
        },
        Route {
            method: Method::Get,
            pattern: "/sheet_info/<sheet_number>",
            handler: sheet_info,
        },
        Route {
            method: Method::Post,
            pattern: "/export_sheets_pdf/",
            handler: export_sheets_pdf,
        },
        Route {
            method: Method::Get,
            pattern: "/sheet_image/<sheet_number>",
            handler: sheet_image,
        },
    ]
}

fn require(doc: Option<&dyn Document>) -> Result<&dyn Document, BridgeError> {
    doc.ok_or(BridgeError::NoActiveSession)
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

// ============================================================================
// Status
// ============================================================================

/// Health probe. Never fails: every problem is reported as 503 unhealthy.
fn status(
    _ctx: &RouteContext,
    doc: Option<&dyn Document>,
    _req: &RouteRequest,
) -> Result<ResponseEnvelope, BridgeError> {
    let title = match doc.map(|d| d.title()) {
        None => Err(BridgeError::NoActiveSession.to_string()),
        Some(Err(e)) => Err(e.to_string()),
        Some(Ok(title)) => Ok(title),
    };

    let envelope = match title {
        Ok(title) => {
            let title = if title.trim().is_empty() {
                "Untitled".to_string()
            } else {
                title
            };
            ResponseEnvelope::success(object(sanitize(json!({
                "health": "healthy",
                "revit_available": true,
                "document_title": title,
                "api_name": API_NAME,
            }))))
        }
        Err(message) => {
            let message = match sanitize(Value::String(message)) {
                Value::String(s) => s,
                _ => String::new(),
            };
            ResponseEnvelope::error(503, message)
                .with_field("status", json!("unhealthy"))
                .with_field("revit_available", json!(false))
                .with_field("api_name", json!(API_NAME))
        }
    };
    Ok(envelope)
}

// ============================================================================
// Model summary
// ============================================================================

fn model_info(
    _ctx: &RouteContext,
    doc: Option<&dyn Document>,
    _req: &RouteRequest,
) -> Result<ResponseEnvelope, BridgeError> {
    let doc = require(doc)?;
    let title = doc
        .title()
        .map_err(|e| BridgeError::internal("Failed to retrieve model information", e))?;

    let project = doc.project_info().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Could not read project information");
        ProjectInfo {
            name: title.clone(),
            number: "Not Set".to_string(),
            client: "Not Set".to_string(),
        }
    });

    let mut by_category = Map::new();
    let mut total_elements = 0usize;
    for category in Category::ALL {
        let count = doc.element_count(category).unwrap_or_else(|e| {
            tracing::warn!(category = category.label(), error = %e, "Could not count elements");
            0
        });
        total_elements += count;
        by_category.insert(category.label().to_string(), json!(count));
    }

    let warnings = doc.warnings().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Could not read warnings");
        WarningSummary::default()
    });

    let levels: Vec<Value> = lookup::list_levels(doc)
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not list levels");
            Vec::new()
        })
        .into_iter()
        .map(|l| json!({"name": l.name, "elevation": (l.elevation * 100.0).round() / 100.0}))
        .collect();

    let views = doc.views().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Could not enumerate views");
        Vec::new()
    });
    let breakdown = view_breakdown(&views);
    let total_views: usize = breakdown.values().sum();

    let sheets_count = lookup::enumerate_sheets(doc).map_or_else(
        |e| {
            tracing::warn!(error = %e, "Could not enumerate sheets");
            0
        },
        |sheets| sheets.len(),
    );

    Ok(ResponseEnvelope::success(object(json!({
        "project_info": {
            "name": project.name,
            "number": project.number,
            "client": project.client,
            "file_name": title,
        },
        "element_summary": {
            "total_elements": total_elements,
            "by_category": by_category,
        },
        "model_health": {
            "total_warnings": warnings.total,
            "critical_warnings": warnings.critical,
        },
        "spatial_organization": {
            "levels": levels,
        },
        "documentation": {
            "total_views": total_views,
            "view_breakdown": breakdown,
            "sheets_count": sheets_count,
        },
    }))))
}

// ============================================================================
// Listings
// ============================================================================

fn list_levels(
    _ctx: &RouteContext,
    doc: Option<&dyn Document>,
    _req: &RouteRequest,
) -> Result<ResponseEnvelope, BridgeError> {
    let doc = require(doc)?;
    let levels =
        lookup::list_levels(doc).map_err(|e| BridgeError::internal("Failed to list levels", e))?;

    Ok(ResponseEnvelope::success(object(json!({
        "total_levels": levels.len(),
        "levels": levels,
    }))))
}

fn list_sheets(
    _ctx: &RouteContext,
    doc: Option<&dyn Document>,
    _req: &RouteRequest,
) -> Result<ResponseEnvelope, BridgeError> {
    let doc = require(doc)?;
    let sheets =
        lookup::list_sheets(doc).map_err(|e| BridgeError::internal("Failed to list sheets", e))?;

    Ok(ResponseEnvelope::success(object(json!({
        "total_sheets": sheets.len(),
        "sheets": sheets,
    }))))
}

/// Finds a sheet by exact number, or a 404 carrying candidate numbers.
fn sheet_by_number(doc: &dyn Document, number: &str) -> Result<SheetRecord, BridgeError> {
    let sheets = lookup::enumerate_sheets(doc)
        .map_err(|e| BridgeError::internal("Failed to enumerate sheets", e))?;

    lookup::find_by_number(&sheets, number)
        .cloned()
        .ok_or_else(|| BridgeError::EntityNotFound {
            message: format!("Sheet {number} not found"),
            candidates: lookup::candidate_preview(&sheets),
        })
}

fn sheet_number_param(req: &RouteRequest) -> Result<&str, BridgeError> {
    req.param("sheet_number")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| BridgeError::InvalidInput("sheet_number is required".to_string()))
}

fn sheet_info(
    _ctx: &RouteContext,
    doc: Option<&dyn Document>,
    req: &RouteRequest,
) -> Result<ResponseEnvelope, BridgeError> {
    let doc = require(doc)?;
    let number = sheet_number_param(req)?;
    let sheet = sheet_by_number(doc, number)?;
    tracing::info!(sheet_number = %sheet.number, "Getting sheet info");

    let views = doc.placed_views(sheet.id).unwrap_or_else(|e| {
        tracing::warn!(sheet_number = %sheet.number, error = %e, "Failed to collect views");
        Vec::new()
    });

    let mut text_notes = Vec::new();
    let mut elements = Vec::new();
    match doc.sheet_elements(sheet.id) {
        Ok(items) => {
            for element in items {
                match element {
                    SheetElement::TextNote { text, .. } => text_notes.push(text),
                    SheetElement::Viewport { .. } => {}
                    SheetElement::Other { id, name, category } => elements.push(json!({
                        "id": id,
                        "name": name,
                        "category": category.unwrap_or_else(|| "Unknown".to_string()),
                    })),
                }
            }
        }
        Err(e) => {
            tracing::warn!(sheet_number = %sheet.number, error = %e, "Failed to collect sheet elements");
        }
    }

    Ok(ResponseEnvelope::success(object(json!({
        "sheet_number": sheet.number,
        "sheet_name": sheet.name,
        "views": views,
        "text_notes": text_notes,
        "elements": elements,
    }))))
}

// ============================================================================
// Export
// ============================================================================

/// Reads `{"sheets": [...]}`. Anything else, or an empty list, is invalid.
fn requested_sheets(body: Option<&Value>) -> Result<&[Value], BridgeError> {
    let sheets = body
        .and_then(|b| b.get("sheets"))
        .and_then(Value::as_array)
        .ok_or_else(|| {
            BridgeError::InvalidInput("Request body must contain a 'sheets' list".to_string())
        })?;

    if sheets.is_empty() {
        return Err(BridgeError::InvalidInput("No sheets specified".to_string()));
    }
    Ok(sheets)
}

fn export_sheets_pdf(
    ctx: &RouteContext,
    doc: Option<&dyn Document>,
    req: &RouteRequest,
) -> Result<ResponseEnvelope, BridgeError> {
    let doc = require(doc)?;
    let requested = requested_sheets(req.body())?;

    let sheets = lookup::enumerate_sheets(doc)
        .map_err(|e| BridgeError::internal("Failed to enumerate sheets", e))?;

    let mut resolved: Vec<SheetRecord> = Vec::new();
    let mut not_found: Vec<String> = Vec::new();
    for value in requested {
        let hit = SheetRef::from_json(value)
            .as_ref()
            .and_then(|reference| lookup::resolve_sheet(&sheets, reference));
        match hit {
            Some(sheet) if resolved.iter().any(|s| s.id == sheet.id) => {}
            Some(sheet) => resolved.push(sheet.clone()),
            None => not_found.push(match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
        }
    }

    if resolved.is_empty() {
        return Err(BridgeError::EntityNotFound {
            message: format!("No matching sheets found: {}", not_found.join(", ")),
            candidates: lookup::candidate_preview(&sheets),
        });
    }
    if !not_found.is_empty() {
        tracing::warn!(sheets = ?not_found, "Some requested sheets were not found");
    }

    let sheet_numbers: Vec<String> = resolved.iter().map(|s| s.number.clone()).collect();
    tracing::info!(sheets = ?sheet_numbers, "Exporting sheets to PDF");

    let job = ExportJob::pdf(resolved);
    let success = ctx.export.run(doc, &job)?;

    let mut envelope = ResponseEnvelope::success(object(json!({
        "pdf_data": success.artifact.to_base64(),
        "sheets_exported": sheet_numbers.len(),
        "sheet_numbers": sheet_numbers,
        "file_size_bytes": success.artifact.byte_len(),
        "content_type": success.artifact.content_type(),
        "strategy": success.strategy,
        "attempts": success.attempts,
    })));
    if !not_found.is_empty() {
        envelope = envelope.with_field("sheets_not_found", json!(not_found));
    }
    Ok(envelope)
}

fn sheet_image(
    ctx: &RouteContext,
    doc: Option<&dyn Document>,
    req: &RouteRequest,
) -> Result<ResponseEnvelope, BridgeError> {
    let doc = require(doc)?;
    let number = sheet_number_param(req)?;
    let sheet = sheet_by_number(doc, number)?;
    tracing::info!(sheet_number = %sheet.number, "Exporting sheet image");

    let sheet_number = sheet.number.clone();
    let success = ctx.export.run(doc, &ExportJob::image(sheet))?;

    Ok(ResponseEnvelope::success(object(json!({
        "image_data": success.artifact.to_base64(),
        "content_type": success.artifact.content_type(),
        "sheet_number": sheet_number,
        "file_size_bytes": success.artifact.byte_len(),
        "export_success": true,
        "strategy": success.strategy,
    }))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{ExportCapabilities, ExportSelector, ScratchSpace, SelectorSettings};
    use crate::host::memory::MemoryDocument;

    fn context(root: &std::path::Path) -> RouteContext {
        let settings = SelectorSettings {
            scratch: ScratchSpace::new(root.to_path_buf()),
            ..SelectorSettings::default()
        };
        RouteContext {
            export: ExportSelector::from_capabilities(&ExportCapabilities::full(), &settings),
        }
    }

    fn sheet_request(number: &str) -> RouteRequest {
        RouteRequest::new(vec![("sheet_number".into(), number.into())], None)
    }

    #[test]
    fn status_without_document_is_unhealthy() {
        let dir = tempfile::tempdir().unwrap();
        let envelope = status(&context(dir.path()), None, &RouteRequest::default()).unwrap();
        let body = envelope.to_json();
        assert_eq!(envelope.status(), 503);
        assert_eq!(body["status"], "unhealthy");
        assert_eq!(body["revit_available"], false);
        assert_eq!(body["api_name"], "revit_mcp");
    }

    #[test]
    fn status_defaults_blank_title() {
        let dir = tempfile::tempdir().unwrap();
        let doc = MemoryDocument::new("   ");
        let envelope = status(&context(dir.path()), Some(&doc), &RouteRequest::default()).unwrap();
        assert_eq!(envelope.to_json()["document_title"], "Untitled");
        assert_eq!(envelope.to_json()["health"], "healthy");
    }

    #[test]
    fn sheet_info_filters_viewports_and_defaults_category() {
        let dir = tempfile::tempdir().unwrap();
        let doc = MemoryDocument::new("Model")
            .with_sheet("A101", "PLAN", 10)
            .with_sheet_element(10, SheetElement::Viewport { id: 11 })
            .with_sheet_element(
                10,
                SheetElement::Other {
                    id: 12,
                    name: "Title Block".into(),
                    category: None,
                },
            );
        let envelope =
            sheet_info(&context(dir.path()), Some(&doc), &sheet_request("A101")).unwrap();
        let body = envelope.to_json();
        assert_eq!(body["elements"].as_array().unwrap().len(), 1);
        assert_eq!(body["elements"][0]["category"], "Unknown");
        assert_eq!(body["text_notes"], json!([]));
    }

    #[test]
    fn requested_sheets_validation() {
        assert!(requested_sheets(None).is_err());
        assert!(requested_sheets(Some(&json!({"sheets": []}))).is_err());
        assert!(requested_sheets(Some(&json!({"sheets": "A101"}))).is_err());
        assert_eq!(requested_sheets(Some(&json!({"sheets": ["A101"]}))).unwrap().len(), 1);
    }

    #[test]
    fn model_info_counts_categories() {
        let dir = tempfile::tempdir().unwrap();
        let doc = MemoryDocument::new("Tower.rvt")
            .with_element_count(Category::Walls, 40)
            .with_element_count(Category::Doors, 12)
            .with_level("Level 1", 1, 0.0)
            .with_sheet("A101", "Plan", 5);
        let envelope =
            model_info(&context(dir.path()), Some(&doc), &RouteRequest::default()).unwrap();
        let body = envelope.to_json();
        assert_eq!(body["element_summary"]["total_elements"], 52);
        assert_eq!(body["element_summary"]["by_category"]["Walls"], 40);
        assert_eq!(body["element_summary"]["by_category"]["Roofs"], 0);
        assert_eq!(body["documentation"]["sheets_count"], 1);
        assert_eq!(body["project_info"]["file_name"], "Tower.rvt");
    }
}
