//! In-memory host: a document snapshot plus a session that can open and
//! close it.
//!
//! Export calls write small placeholder artifacts (a minimal PDF, a 1x1 PNG)
//! the way the real host writes files, including its naming behaviour, so the
//! export strategies can be exercised end to end. Each export entry point can
//! be given an [`ExportFault`] to simulate host revisions where it misbehaves.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use serde::Deserialize;

use super::{
    Category, Document, ElementId, HostError, HostResult, LevelRecord, ProjectInfo,
    SessionProvider, SheetElement, SheetRecord, ViewRecord, WarningSummary,
};
use crate::error::ConfigError;
use crate::export::{
    ExportCapabilities, ImageExportOptions, PdfExportOptions, PrintSettings, StrategyId,
};

/// A valid 1x1 transparent PNG.
const PLACEHOLDER_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

/// One sheet in a snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotSheet {
    /// Sheet number.
    pub number: String,
    /// Display name.
    pub name: String,
    /// Host element id.
    pub id: ElementId,
    /// Views placed on the sheet.
    #[serde(default)]
    pub views: Vec<ViewRecord>,
    /// Elements owned by the sheet.
    #[serde(default)]
    pub elements: Vec<SheetElement>,
    /// Simulates a sheet whose properties cannot be read.
    #[serde(default)]
    pub unreadable: bool,
}

/// Serialisable document contents.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentSnapshot {
    /// Document title.
    pub title: String,
    /// Project information.
    #[serde(default)]
    pub project: ProjectInfo,
    /// Levels in enumeration order.
    #[serde(default)]
    pub levels: Vec<LevelRecord>,
    /// Sheets in enumeration order.
    #[serde(default)]
    pub sheets: Vec<SnapshotSheet>,
    /// Views not placed on any sheet.
    #[serde(default)]
    pub views: Vec<ViewRecord>,
    /// Element counts by category.
    #[serde(default)]
    pub element_counts: BTreeMap<Category, usize>,
    /// Review warnings.
    #[serde(default)]
    pub warnings: WarningSummary,
}

impl DocumentSnapshot {
    /// Loads a snapshot from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable or malformed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// How an export entry point misbehaves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFault {
    /// Works normally.
    #[default]
    None,
    /// The call fails before writing anything.
    Fail,
    /// The call writes its output and then fails.
    WriteThenFail,
    /// The call reports success but writes nothing.
    NoOutput,
}

/// An in-memory document.
#[derive(Debug, Default)]
pub struct MemoryDocument {
    snapshot: DocumentSnapshot,
    faults: HashMap<StrategyId, ExportFault>,
    export_calls: Mutex<Vec<StrategyId>>,
}

impl MemoryDocument {
    /// Creates an empty document with the given title.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self::from_snapshot(DocumentSnapshot {
            title: title.into(),
            ..DocumentSnapshot::default()
        })
    }

    /// Creates a document from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: DocumentSnapshot) -> Self {
        Self {
            snapshot,
            faults: HashMap::new(),
            export_calls: Mutex::new(Vec::new()),
        }
    }

    /// Adds a sheet.
    #[must_use]
    pub fn with_sheet(mut self, number: &str, name: &str, id: ElementId) -> Self {
        self.snapshot.sheets.push(SnapshotSheet {
            number: number.to_string(),
            name: name.to_string(),
            id,
            views: Vec::new(),
            elements: Vec::new(),
            unreadable: false,
        });
        self
    }

    /// Adds a sheet whose properties fail to read.
    #[must_use]
    pub fn with_unreadable_sheet(mut self, id: ElementId) -> Self {
        self.snapshot.sheets.push(SnapshotSheet {
            number: String::new(),
            name: String::new(),
            id,
            views: Vec::new(),
            elements: Vec::new(),
            unreadable: true,
        });
        self
    }

    /// Places a view on an existing sheet.
    #[must_use]
    pub fn with_placed_view(mut self, sheet: ElementId, id: ElementId, name: &str, view_type: &str) -> Self {
        if let Some(s) = self.snapshot.sheets.iter_mut().find(|s| s.id == sheet) {
            s.views.push(ViewRecord {
                id,
                name: name.to_string(),
                view_type: view_type.to_string(),
                is_template: false,
            });
        }
        self
    }

    /// Adds an element owned by an existing sheet.
    #[must_use]
    pub fn with_sheet_element(mut self, sheet: ElementId, element: SheetElement) -> Self {
        if let Some(s) = self.snapshot.sheets.iter_mut().find(|s| s.id == sheet) {
            s.elements.push(element);
        }
        self
    }

    /// Adds a level.
    #[must_use]
    pub fn with_level(mut self, name: &str, id: ElementId, elevation: f64) -> Self {
        self.snapshot.levels.push(LevelRecord {
            name: name.to_string(),
            id,
            elevation,
        });
        self
    }

    /// Adds an unplaced view.
    #[must_use]
    pub fn with_view(mut self, view: ViewRecord) -> Self {
        self.snapshot.views.push(view);
        self
    }

    /// Sets the element count for a category.
    #[must_use]
    pub fn with_element_count(mut self, category: Category, count: usize) -> Self {
        self.snapshot.element_counts.insert(category, count);
        self
    }

    /// Sets project information.
    #[must_use]
    pub fn with_project(mut self, project: ProjectInfo) -> Self {
        self.snapshot.project = project;
        self
    }

    /// Sets review warnings.
    #[must_use]
    pub const fn with_warnings(mut self, warnings: WarningSummary) -> Self {
        self.snapshot.warnings = warnings;
        self
    }

    /// Makes an export entry point misbehave.
    #[must_use]
    pub fn with_fault(mut self, strategy: StrategyId, fault: ExportFault) -> Self {
        self.faults.insert(strategy, fault);
        self
    }

    /// Export entry points called so far, in order.
    #[must_use]
    pub fn export_calls(&self) -> Vec<StrategyId> {
        self.export_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn sheet(&self, id: ElementId) -> HostResult<&SnapshotSheet> {
        self.snapshot
            .sheets
            .iter()
            .find(|s| s.id == id && !s.unreadable)
            .ok_or_else(|| HostError::new(format!("Element {id} is not a sheet")))
    }

    fn write_output(&self, entry: StrategyId, path: &Path, content: &[u8]) -> HostResult<()> {
        if let Ok(mut calls) = self.export_calls.lock() {
            calls.push(entry);
        }

        let write = || {
            fs::write(path, content)
                .map_err(|e| HostError::new(format!("Cannot write {}: {e}", path.display())))
        };

        match self.faults.get(&entry).copied().unwrap_or_default() {
            ExportFault::None => write(),
            ExportFault::Fail => Err(HostError::new(format!(
                "{} is not supported by this host",
                entry.name()
            ))),
            ExportFault::WriteThenFail => {
                write()?;
                Err(HostError::new(format!("{} failed after writing output", entry.name())))
            }
            ExportFault::NoOutput => Ok(()),
        }
    }

    fn render_pdf(&self, sheets: &[ElementId]) -> HostResult<Vec<u8>> {
        let mut pdf = String::from("%PDF-1.7\n");
        for id in sheets {
            let sheet = self.sheet(*id)?;
            pdf.push_str(&format!("% {} - {}\n", sheet.number, sheet.name));
        }
        pdf.push_str("%%EOF\n");
        Ok(pdf.into_bytes())
    }
}

impl Document for MemoryDocument {
    fn title(&self) -> HostResult<String> {
        Ok(self.snapshot.title.clone())
    }

    fn project_info(&self) -> HostResult<ProjectInfo> {
        Ok(self.snapshot.project.clone())
    }

    fn sheets(&self) -> HostResult<Vec<HostResult<SheetRecord>>> {
        Ok(self
            .snapshot
            .sheets
            .iter()
            .map(|s| {
                if s.unreadable {
                    Err(HostError::new(format!(
                        "Sheet {} has no readable SheetNumber",
                        s.id
                    )))
                } else {
                    Ok(SheetRecord {
                        number: s.number.clone(),
                        name: s.name.clone(),
                        id: s.id,
                    })
                }
            })
            .collect())
    }

    fn levels(&self) -> HostResult<Vec<HostResult<LevelRecord>>> {
        Ok(self.snapshot.levels.iter().cloned().map(Ok).collect())
    }

    fn views(&self) -> HostResult<Vec<ViewRecord>> {
        let mut views = self.snapshot.views.clone();
        for sheet in &self.snapshot.sheets {
            for view in &sheet.views {
                if !views.iter().any(|v| v.id == view.id) {
                    views.push(view.clone());
                }
            }
        }
        Ok(views)
    }

    fn element_count(&self, category: Category) -> HostResult<usize> {
        Ok(self
            .snapshot
            .element_counts
            .get(&category)
            .copied()
            .unwrap_or(0))
    }

    fn warnings(&self) -> HostResult<WarningSummary> {
        Ok(self.snapshot.warnings)
    }

    fn placed_views(&self, sheet: ElementId) -> HostResult<Vec<ViewRecord>> {
        Ok(self.sheet(sheet)?.views.clone())
    }

    fn sheet_elements(&self, sheet: ElementId) -> HostResult<Vec<SheetElement>> {
        Ok(self.sheet(sheet)?.elements.clone())
    }

    fn export_pdf(
        &self,
        folder: &Path,
        sheets: &[ElementId],
        options: &PdfExportOptions,
    ) -> HostResult<()> {
        let content = self.render_pdf(sheets)?;
        let path = folder.join(format!("{}.pdf", options.file_name));
        self.write_output(StrategyId::PdfExport, &path, &content)
    }

    fn print_to_file(&self, sheets: &[ElementId], settings: &PrintSettings) -> HostResult<()> {
        let content = self.render_pdf(sheets)?;
        self.write_output(StrategyId::PrintManager, &settings.print_to_file_name, &content)
    }

    fn export_image(&self, options: &ImageExportOptions) -> HostResult<()> {
        let &[id] = options.views.as_slice() else {
            return Err(HostError::new("Image export expects exactly one view"));
        };
        let sheet = self.sheet(id)?;

        // The host appends " - Sheet - <number> - <name>" to the prefix.
        let mut path = options.file_path_prefix.as_os_str().to_owned();
        path.push(format!(" - Sheet - {} - {}.png", sheet.number, sheet.name));

        self.write_output(StrategyId::ImageExport, Path::new(&path), PLACEHOLDER_PNG)
    }
}

/// A session whose document is opened and closed explicitly.
pub struct StaticSession {
    document: RwLock<Option<Arc<dyn Document>>>,
    capabilities: ExportCapabilities,
}

impl StaticSession {
    /// A session with no document open.
    #[must_use]
    pub fn new(capabilities: ExportCapabilities) -> Self {
        Self {
            document: RwLock::new(None),
            capabilities,
        }
    }

    /// A session with `document` already open.
    #[must_use]
    pub fn with_document(document: Arc<dyn Document>, capabilities: ExportCapabilities) -> Self {
        Self {
            document: RwLock::new(Some(document)),
            capabilities,
        }
    }

    /// Opens a document, replacing any open one.
    pub fn open(&self, document: Arc<dyn Document>) {
        if let Ok(mut slot) = self.document.write() {
            *slot = Some(document);
        }
    }

    /// Closes the open document.
    pub fn close(&self) {
        if let Ok(mut slot) = self.document.write() {
            *slot = None;
        }
    }
}

impl SessionProvider for StaticSession {
    fn active_document(&self) -> Option<Arc<dyn Document>> {
        self.document.read().ok().and_then(|slot| slot.clone())
    }

    fn export_capabilities(&self) -> ExportCapabilities {
        self.capabilities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreadable_sheet_is_an_item_error() {
        let doc = MemoryDocument::new("Model")
            .with_sheet("A101", "Plan", 1)
            .with_unreadable_sheet(2);
        let sheets = doc.sheets().unwrap();
        assert_eq!(sheets.len(), 2);
        assert!(sheets[0].is_ok());
        assert!(sheets[1].is_err());
    }

    #[test]
    fn image_export_appends_host_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let doc = MemoryDocument::new("Model").with_sheet("A101", "Plan", 1);
        let options = ImageExportOptions::configure(
            crate::export::ImageExportFields::all(),
            dir.path().join("sheet_A101"),
            vec![1],
            512,
        );
        doc.export_image(&options).unwrap();
        assert!(dir.path().join("sheet_A101 - Sheet - A101 - Plan.png").is_file());
        assert_eq!(doc.export_calls(), vec![StrategyId::ImageExport]);
    }

    #[test]
    fn write_then_fail_leaves_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let doc = MemoryDocument::new("Model")
            .with_sheet("A101", "Plan", 1)
            .with_fault(StrategyId::PdfExport, ExportFault::WriteThenFail);
        let options = PdfExportOptions {
            file_name: "out".into(),
            ..PdfExportOptions::default()
        };
        assert!(doc.export_pdf(dir.path(), &[1], &options).is_err());
        assert!(dir.path().join("out.pdf").is_file());
    }

    #[test]
    fn session_open_and_close() {
        let session = StaticSession::new(ExportCapabilities::full());
        assert!(session.active_document().is_none());

        session.open(Arc::new(MemoryDocument::new("Model")));
        assert_eq!(session.active_document().unwrap().title().unwrap(), "Model");

        session.close();
        assert!(session.active_document().is_none());
    }

    #[test]
    fn snapshot_parses_sheet_elements() {
        let json = r#"{
            "title": "Tower",
            "sheets": [{
                "number": "A101",
                "name": "LEVEL 1 PLAN",
                "id": 100,
                "views": [{"id": 5, "name": "Level 1", "type": "FloorPlan"}],
                "elements": [
                    {"kind": "text_note", "id": 9, "text": "KEYNOTE 5"},
                    {"kind": "viewport", "id": 10}
                ]
            }],
            "element_counts": {"Walls": 12, "Structural_Framing": 3}
        }"#;
        let snapshot: DocumentSnapshot = serde_json::from_str(json).unwrap();
        let doc = MemoryDocument::from_snapshot(snapshot);
        assert_eq!(doc.placed_views(100).unwrap().len(), 1);
        assert_eq!(doc.sheet_elements(100).unwrap().len(), 2);
        assert_eq!(doc.element_count(Category::StructuralFraming).unwrap(), 3);
        assert_eq!(doc.element_count(Category::Doors).unwrap(), 0);
    }
}
