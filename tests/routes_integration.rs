//! Integration tests for the route dispatcher against an in-memory document.
//!
//! These tests drive every route through [`Dispatcher::dispatch`] and check
//! the envelope each one produces, including the export fallback sequence
//! and scratch-directory cleanup.

use std::path::Path;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use serde_json::{json, Value};
use tempfile::TempDir;

use revit_mcp_bridge::export::{
    ExportCapabilities, ScratchSpace, SelectorSettings, StrategyId,
};
use revit_mcp_bridge::host::memory::{ExportFault, MemoryDocument, StaticSession};
use revit_mcp_bridge::host::{Document, SheetElement};
use revit_mcp_bridge::relay::Method;
use revit_mcp_bridge::routes::Dispatcher;

/// The documented example project: three sheets, one with two views and a
/// keynote.
fn sample_document() -> MemoryDocument {
    MemoryDocument::new("Tower.rvt")
        .with_sheet("A102", "LEVEL 2 PLAN", 312_346)
        .with_sheet("A101", "LEVEL 1 PLAN", 312_345)
        .with_sheet("S201", "FOUNDATION PLAN", 400_001)
        .with_placed_view(312_345, 500_001, "Level 1", "FloorPlan")
        .with_placed_view(312_345, 500_002, "Section 1", "Section")
        .with_sheet_element(312_345, SheetElement::Viewport { id: 600_001 })
        .with_sheet_element(
            312_345,
            SheetElement::TextNote {
                id: 600_002,
                text: "KEYNOTE 5".to_string(),
            },
        )
        .with_level("Level 2", 20, 12.0)
        .with_level("Level 1", 10, 0.0)
}

struct Harness {
    dispatcher: Dispatcher,
    document: Arc<MemoryDocument>,
    scratch: TempDir,
}

impl Harness {
    fn new(document: MemoryDocument) -> Self {
        Self::with_capabilities(document, ExportCapabilities::full())
    }

    fn with_capabilities(document: MemoryDocument, capabilities: ExportCapabilities) -> Self {
        let scratch = tempfile::tempdir().expect("Failed to create scratch root");
        let document = Arc::new(document);
        let open: Arc<dyn Document> = document.clone();
        let session = StaticSession::with_document(open, capabilities);
        let settings = SelectorSettings {
            scratch: ScratchSpace::new(scratch.path().to_path_buf()),
            ..SelectorSettings::default()
        };
        Self {
            dispatcher: Dispatcher::new(Arc::new(session), &settings),
            document,
            scratch,
        }
    }

    fn get(&self, path: &str) -> (u16, Value) {
        let envelope = self.dispatcher.dispatch(Method::Get, path, None);
        (envelope.status(), envelope.to_json())
    }

    fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let envelope = self.dispatcher.dispatch(Method::Post, path, Some(body));
        (envelope.status(), envelope.to_json())
    }
}

fn scratch_is_empty(root: &Path) -> bool {
    std::fs::read_dir(root)
        .expect("Failed to read scratch root")
        .next()
        .is_none()
}

fn names(attempts: &Value) -> Vec<&str> {
    attempts
        .as_array()
        .expect("attempts must be a list")
        .iter()
        .filter_map(|a| a["strategy"].as_str())
        .collect()
}

// =============================================================================
// Status
// =============================================================================

#[test]
fn test_status_healthy() {
    let harness = Harness::new(sample_document());
    let (status, body) = harness.get("/status/");

    assert_eq!(status, 200);
    assert_eq!(body["status"], "success");
    assert_eq!(body["health"], "healthy");
    assert_eq!(body["revit_available"], true);
    assert_eq!(body["document_title"], "Tower.rvt");
    assert_eq!(body["api_name"], "revit_mcp");
}

#[test]
fn test_status_without_document_is_unhealthy() {
    let session = StaticSession::new(ExportCapabilities::full());
    let dispatcher = Dispatcher::new(Arc::new(session), &SelectorSettings::default());
    let envelope = dispatcher.dispatch(Method::Get, "/status/", None);
    let body = envelope.to_json();

    assert_eq!(envelope.status(), 503);
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["revit_available"], false);
    assert_eq!(body["error"], "No active Revit document");
}

#[test]
fn test_every_document_route_needs_a_document() {
    let session = StaticSession::new(ExportCapabilities::full());
    let dispatcher = Dispatcher::new(Arc::new(session), &SelectorSettings::default());

    for path in ["/model_info/", "/list_levels/", "/list_sheets/", "/sheet_info/A101", "/sheet_image/A101"] {
        let envelope = dispatcher.dispatch(Method::Get, path, None);
        assert_eq!(envelope.status(), 503, "{path}");
    }
    let envelope = dispatcher.dispatch(
        Method::Post,
        "/export_sheets_pdf/",
        Some(json!({"sheets": ["A101"]})),
    );
    assert_eq!(envelope.status(), 503);
}

// =============================================================================
// Listings
// =============================================================================

#[test]
fn test_list_sheets_sorted_and_stable() {
    let harness = Harness::new(sample_document());
    let (status, first) = harness.get("/list_sheets/");
    let (_, second) = harness.get("/list_sheets/");

    assert_eq!(status, 200);
    assert_eq!(first, second);
    assert_eq!(first["total_sheets"], 3);

    let numbers: Vec<&str> = first["sheets"]
        .as_array()
        .expect("sheets must be a list")
        .iter()
        .filter_map(|s| s["number"].as_str())
        .collect();
    assert_eq!(numbers, vec!["A101", "A102", "S201"]);
    assert_eq!(first["sheets"][0]["id"], 312_345);
}

#[test]
fn test_list_sheets_skips_unreadable_sheets() {
    let harness = Harness::new(sample_document().with_unreadable_sheet(999));
    let (status, body) = harness.get("/list_sheets/");

    assert_eq!(status, 200);
    assert_eq!(body["total_sheets"], 3);
}

#[test]
fn test_list_levels_by_elevation() {
    let harness = Harness::new(sample_document());
    let (status, body) = harness.get("/list_levels/");

    assert_eq!(status, 200);
    assert_eq!(body["total_levels"], 2);
    assert_eq!(body["levels"][0]["name"], "Level 1");
    assert_eq!(body["levels"][1]["name"], "Level 2");
}

#[test]
fn test_model_info_summary() {
    let harness = Harness::new(sample_document());
    let (status, body) = harness.get("/model_info/");

    assert_eq!(status, 200);
    assert_eq!(body["project_info"]["file_name"], "Tower.rvt");
    assert_eq!(body["documentation"]["sheets_count"], 3);
    assert_eq!(body["documentation"]["total_views"], 2);
    assert_eq!(body["spatial_organization"]["levels"][0]["name"], "Level 1");
}

// =============================================================================
// Sheet Detail
// =============================================================================

#[test]
fn test_sheet_info_example_sheet() {
    let harness = Harness::new(sample_document());
    let (status, body) = harness.get("/sheet_info/A101");

    assert_eq!(status, 200);
    assert_eq!(body["sheet_number"], "A101");
    assert_eq!(body["sheet_name"], "LEVEL 1 PLAN");
    assert_eq!(body["views"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["views"][0]["type"], "FloorPlan");
    assert_eq!(body["text_notes"], json!(["KEYNOTE 5"]));
    assert_eq!(body["elements"], json!([]));
}

#[test]
fn test_sheet_info_unknown_sheet_offers_candidates() {
    let harness = Harness::new(sample_document());
    let (status, body) = harness.get("/sheet_info/Z999");

    assert_eq!(status, 404);
    assert_eq!(body["error"], "Sheet Z999 not found");
    assert_eq!(body["candidates"], json!(["A101", "A102", "S201"]));
    assert!(body.get("views").is_none());
    assert!(body.get("elements").is_none());
}

#[test]
fn test_sheet_info_candidates_are_capped() {
    let mut document = MemoryDocument::new("Big.rvt");
    for i in 0..30 {
        document = document.with_sheet(&format!("X{i:03}"), "Sheet", 1000 + i);
    }
    let harness = Harness::new(document);
    let (status, body) = harness.get("/sheet_info/A101");

    assert_eq!(status, 404);
    assert_eq!(body["candidates"].as_array().map(Vec::len), Some(20));
}

#[test]
fn test_wrong_method_is_405() {
    let harness = Harness::new(sample_document());
    let (status, body) = harness.post("/sheet_info/A101", json!({}));

    assert_eq!(status, 405);
    assert!(body["error"].as_str().is_some());
}

// =============================================================================
// PDF Export
// =============================================================================

#[test]
fn test_export_pdf_single_sheet() {
    let harness = Harness::new(sample_document());
    let (status, body) = harness.post("/export_sheets_pdf/", json!({"sheets": ["A101"]}));

    assert_eq!(status, 200, "{body}");
    assert_eq!(body["sheets_exported"], 1);
    assert_eq!(body["sheet_numbers"], json!(["A101"]));
    assert_eq!(body["content_type"], "application/pdf");
    assert_eq!(body["strategy"], "pdf_export");

    let pdf = BASE64_STANDARD
        .decode(body["pdf_data"].as_str().expect("pdf_data must be a string"))
        .expect("pdf_data must be base64");
    assert!(pdf.starts_with(b"%PDF"));
    assert_eq!(body["file_size_bytes"], pdf.len());
    assert!(scratch_is_empty(harness.scratch.path()));
}

#[test]
fn test_export_pdf_accepts_ids_and_reports_misses() {
    let harness = Harness::new(sample_document());
    let (status, body) = harness.post(
        "/export_sheets_pdf/",
        json!({"sheets": [312_346, "A101", "Z999", "312345"]}),
    );

    assert_eq!(status, 200, "{body}");
    // "312345" resolves to A101 by id and is not exported twice.
    assert_eq!(body["sheet_numbers"], json!(["A102", "A101"]));
    assert_eq!(body["sheets_not_found"], json!(["Z999"]));
}

#[test]
fn test_export_pdf_empty_list_is_400_without_export() {
    let harness = Harness::new(sample_document());
    let (status, body) = harness.post("/export_sheets_pdf/", json!({"sheets": []}));

    assert_eq!(status, 400);
    assert_eq!(body["error"], "No sheets specified");
    assert!(harness.document.export_calls().is_empty());
}

#[test]
fn test_export_pdf_missing_list_is_400() {
    let harness = Harness::new(sample_document());
    let (status, _) = harness.post("/export_sheets_pdf/", json!({"sheet": "A101"}));

    assert_eq!(status, 400);
    assert!(harness.document.export_calls().is_empty());
}

#[test]
fn test_export_pdf_nothing_matches_is_404() {
    let harness = Harness::new(sample_document());
    let (status, body) = harness.post("/export_sheets_pdf/", json!({"sheets": ["Z1", "Z2"]}));

    assert_eq!(status, 404);
    assert_eq!(body["error"], "No matching sheets found: Z1, Z2");
    assert_eq!(body["candidates"], json!(["A101", "A102", "S201"]));
    assert!(harness.document.export_calls().is_empty());
}

#[test]
fn test_export_pdf_falls_back_to_print_manager() {
    let harness = Harness::new(
        sample_document().with_fault(StrategyId::PdfExport, ExportFault::Fail),
    );
    let (status, body) = harness.post("/export_sheets_pdf/", json!({"sheets": ["A101", "A102"]}));

    assert_eq!(status, 200, "{body}");
    assert_eq!(body["strategy"], "print_manager");
    assert_eq!(names(&body["attempts"]), vec!["pdf_export", "print_manager"]);
    assert_eq!(body["attempts"][0]["succeeded"], false);
    assert!(body["attempts"][0]["reason"].as_str().is_some());
    assert_eq!(body["attempts"][1]["succeeded"], true);
    assert_eq!(
        harness.document.export_calls(),
        vec![StrategyId::PdfExport, StrategyId::PrintManager]
    );
}

#[test]
fn test_export_pdf_skips_later_strategies_after_success() {
    let harness = Harness::new(sample_document());
    let (_, body) = harness.post("/export_sheets_pdf/", json!({"sheets": ["A101"]}));

    assert_eq!(body["attempts"][0]["attempted"], true);
    assert_eq!(body["attempts"][1]["strategy"], "print_manager");
    assert_eq!(body["attempts"][1]["attempted"], false);
    assert_eq!(harness.document.export_calls(), vec![StrategyId::PdfExport]);
}

#[test]
fn test_export_pdf_all_strategies_fail() {
    let harness = Harness::new(
        sample_document()
            .with_fault(StrategyId::PdfExport, ExportFault::WriteThenFail)
            .with_fault(StrategyId::PrintManager, ExportFault::NoOutput),
    );
    let (status, body) = harness.post("/export_sheets_pdf/", json!({"sheets": ["A101"]}));

    assert_eq!(status, 500);
    assert_eq!(body["error"], "Export artifact was not created");
    assert_eq!(names(&body["attempts"]), vec!["pdf_export", "print_manager"]);
    assert!(body.get("pdf_data").is_none());
    assert!(scratch_is_empty(harness.scratch.path()));
}

#[test]
fn test_export_pdf_respects_missing_entry_points() {
    let capabilities = ExportCapabilities {
        pdf_export: None,
        ..ExportCapabilities::full()
    };
    let harness = Harness::with_capabilities(sample_document(), capabilities);
    let (status, body) = harness.post("/export_sheets_pdf/", json!({"sheets": ["A101"]}));

    assert_eq!(status, 200, "{body}");
    assert_eq!(body["strategy"], "print_manager");
    assert_eq!(names(&body["attempts"]), vec!["print_manager"]);
}

// =============================================================================
// Sheet Image
// =============================================================================

#[test]
fn test_sheet_image_png() {
    let harness = Harness::new(sample_document());
    let (status, body) = harness.get("/sheet_image/A101");

    assert_eq!(status, 200, "{body}");
    assert_eq!(body["sheet_number"], "A101");
    assert_eq!(body["content_type"], "image/png");
    assert_eq!(body["export_success"], true);
    assert_eq!(body["strategy"], "image_export");

    let png = BASE64_STANDARD
        .decode(body["image_data"].as_str().expect("image_data must be a string"))
        .expect("image_data must be base64");
    assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
    assert!(scratch_is_empty(harness.scratch.path()));
}

#[test]
fn test_sheet_image_unknown_sheet() {
    let harness = Harness::new(sample_document());
    let (status, body) = harness.get("/sheet_image/Z999");

    assert_eq!(status, 404);
    assert!(body["candidates"].as_array().is_some());
    assert!(harness.document.export_calls().is_empty());
}

#[test]
fn test_sheet_image_failure_is_500() {
    let harness = Harness::new(
        sample_document().with_fault(StrategyId::ImageExport, ExportFault::NoOutput),
    );
    let (status, body) = harness.get("/sheet_image/A101");

    assert_eq!(status, 500);
    assert_eq!(names(&body["attempts"]), vec!["image_export"]);
    assert!(scratch_is_empty(harness.scratch.path()));
}
