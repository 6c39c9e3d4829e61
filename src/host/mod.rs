//! The consumed interface of the remote Revit application.
//!
//! The bridge never reimplements the host's document model or rendering
//! engine. It talks to them through two traits:
//!
//! - [`SessionProvider`] answers "is a document open, and which one" and
//!   describes what the running host revision can export.
//! - [`Document`] is one open document: enumeration queries plus the three
//!   export entry points observed across host revisions.
//!
//! [`memory::MemoryDocument`] is an in-memory implementation used for
//! snapshot hosting and tests.

pub mod memory;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::export::{ExportCapabilities, ImageExportOptions, PdfExportOptions, PrintSettings};

/// Integer element identifier as exposed by the host.
pub type ElementId = i64;

/// A failure reported by the host application.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct HostError {
    message: String,
}

impl HostError {
    /// Creates a host error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result alias for host calls.
pub type HostResult<T> = Result<T, HostError>;

/// Read-only snapshot of one sheet taken at query time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetRecord {
    /// User-facing sheet number, e.g. `A101`.
    pub number: String,
    /// Display name.
    pub name: String,
    /// Host element id.
    pub id: ElementId,
}

impl SheetRecord {
    /// Stable listing order: sheet number, then display name.
    #[must_use]
    pub fn sort_key(&self) -> (&str, &str) {
        (&self.number, &self.name)
    }
}

/// A building level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelRecord {
    /// Level name.
    pub name: String,
    /// Host element id.
    pub id: ElementId,
    /// Elevation in project units.
    pub elevation: f64,
}

/// A view, either placed on a sheet or enumerated from the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewRecord {
    /// Host element id.
    pub id: ElementId,
    /// View name.
    pub name: String,
    /// Host view type, e.g. `FloorPlan`, `Section`, `ThreeD`.
    #[serde(rename = "type")]
    pub view_type: String,
    /// Whether this is a view template rather than a real view.
    #[serde(default, skip_serializing)]
    pub is_template: bool,
}

/// An element owned directly by a sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SheetElement {
    /// Free-text annotation.
    TextNote {
        /// Host element id.
        id: ElementId,
        /// Note content.
        text: String,
    },
    /// Viewport placeholder. Duplicates the placed-views list.
    Viewport {
        /// Host element id.
        id: ElementId,
    },
    /// Anything else (title blocks, revision clouds, symbols, ...).
    Other {
        /// Host element id.
        id: ElementId,
        /// Element name.
        name: String,
        /// Category name, if the element has one.
        #[serde(default)]
        category: Option<String>,
    },
}

/// Project information block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    /// Project name.
    pub name: String,
    /// Project number.
    pub number: String,
    /// Client name.
    pub client: String,
}

/// Model element categories counted by the model summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Walls,
    Floors,
    Ceilings,
    Roofs,
    Doors,
    Windows,
    Stairs,
    Railings,
    Columns,
    #[serde(rename = "Structural_Framing")]
    StructuralFraming,
    Furniture,
    #[serde(rename = "Lighting_Fixtures")]
    LightingFixtures,
    #[serde(rename = "Plumbing_Fixtures")]
    PlumbingFixtures,
}

impl Category {
    /// Every counted category, in report order.
    pub const ALL: [Self; 13] = [
        Self::Walls,
        Self::Floors,
        Self::Ceilings,
        Self::Roofs,
        Self::Doors,
        Self::Windows,
        Self::Stairs,
        Self::Railings,
        Self::Columns,
        Self::StructuralFraming,
        Self::Furniture,
        Self::LightingFixtures,
        Self::PlumbingFixtures,
    ];

    /// Key used in the model summary payload.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Walls => "Walls",
            Self::Floors => "Floors",
            Self::Ceilings => "Ceilings",
            Self::Roofs => "Roofs",
            Self::Doors => "Doors",
            Self::Windows => "Windows",
            Self::Stairs => "Stairs",
            Self::Railings => "Railings",
            Self::Columns => "Columns",
            Self::StructuralFraming => "Structural_Framing",
            Self::Furniture => "Furniture",
            Self::LightingFixtures => "Lighting_Fixtures",
            Self::PlumbingFixtures => "Plumbing_Fixtures",
        }
    }
}

/// Review warnings attached to the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningSummary {
    /// All warnings.
    pub total: usize,
    /// Warnings with error severity.
    pub critical: usize,
}

/// One open document in the host application.
///
/// Enumeration methods return an outer `HostResult` for whole-query failure
/// and, where the host can fail per element, an inner `HostResult` per item so
/// callers can skip a malformed element without aborting the listing.
pub trait Document: Send + Sync {
    /// Document title.
    fn title(&self) -> HostResult<String>;

    /// Project information block.
    fn project_info(&self) -> HostResult<ProjectInfo>;

    /// All sheets in host enumeration order.
    fn sheets(&self) -> HostResult<Vec<HostResult<SheetRecord>>>;

    /// All levels in host enumeration order.
    fn levels(&self) -> HostResult<Vec<HostResult<LevelRecord>>>;

    /// All views, including templates.
    fn views(&self) -> HostResult<Vec<ViewRecord>>;

    /// Number of non-type elements in a category.
    fn element_count(&self, category: Category) -> HostResult<usize>;

    /// Review warnings.
    fn warnings(&self) -> HostResult<WarningSummary>;

    /// Views placed on a sheet, resolved from the sheet's placement list.
    fn placed_views(&self, sheet: ElementId) -> HostResult<Vec<ViewRecord>>;

    /// Elements owned directly by a sheet.
    fn sheet_elements(&self, sheet: ElementId) -> HostResult<Vec<SheetElement>>;

    /// Declarative PDF export into `folder`.
    ///
    /// The host names the output `<options.file_name>.pdf`.
    fn export_pdf(
        &self,
        folder: &Path,
        sheets: &[ElementId],
        options: &PdfExportOptions,
    ) -> HostResult<()>;

    /// Print-manager driven print to `settings.print_to_file_name`.
    fn print_to_file(&self, sheets: &[ElementId], settings: &PrintSettings) -> HostResult<()>;

    /// Raster image export.
    ///
    /// The host derives the output file name from `options.file_path_prefix`
    /// and may append view-specific suffixes.
    fn export_image(&self, options: &ImageExportOptions) -> HostResult<()>;
}

/// The host application's session: which document is open, and what the
/// running host revision can export.
pub trait SessionProvider: Send + Sync {
    /// The currently open document, if any.
    fn active_document(&self) -> Option<Arc<dyn Document>>;

    /// Export surface of the running host revision.
    ///
    /// Probed once when the route dispatcher is built.
    fn export_capabilities(&self) -> ExportCapabilities;
}

/// Counts of views by host view type, for the model summary.
#[must_use]
pub fn view_breakdown(views: &[ViewRecord]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for view in views.iter().filter(|v| !v.is_template) {
        *counts.entry(view.view_type.clone()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(id: ElementId, view_type: &str, is_template: bool) -> ViewRecord {
        ViewRecord {
            id,
            name: format!("View {id}"),
            view_type: view_type.to_string(),
            is_template,
        }
    }

    #[test]
    fn sheet_sort_key_orders_by_number_then_name() {
        let a = SheetRecord {
            number: "A101".into(),
            name: "B".into(),
            id: 1,
        };
        let b = SheetRecord {
            number: "A101".into(),
            name: "A".into(),
            id: 2,
        };
        assert!(b.sort_key() < a.sort_key());
    }

    #[test]
    fn view_breakdown_skips_templates() {
        let views = [
            view(1, "FloorPlan", false),
            view(2, "FloorPlan", false),
            view(3, "FloorPlan", true),
            view(4, "Section", false),
        ];
        let counts = view_breakdown(&views);
        assert_eq!(counts.get("FloorPlan"), Some(&2));
        assert_eq!(counts.get("Section"), Some(&1));
    }

    #[test]
    fn view_record_serialises_type_field() {
        let json = serde_json::to_value(view(7, "ThreeD", false)).unwrap();
        assert_eq!(json["type"], "ThreeD");
        assert!(json.get("is_template").is_none());
    }

    #[test]
    fn category_labels_match_serde_names() {
        for category in Category::ALL {
            let json = serde_json::to_value(category).unwrap();
            assert_eq!(json, category.label());
        }
    }
}
