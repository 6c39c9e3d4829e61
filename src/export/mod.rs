//! Export strategy selector.
//!
//! Produces one PDF or PNG artifact from the open document even though the
//! host's rendering API differs across revisions. The selector holds an
//! ordered list of [`ExportStrategy`] candidates, built once from the host's
//! [`ExportCapabilities`], and tries them in order until one produces a file.
//!
//! # Artifact lifecycle
//!
//! ```text
//!   scratch dir ──▶ attempt dir ──▶ host writes file ──▶ read into memory
//!        │                                                    │
//!        │                               delete file ◀────────┘
//!        ▼
//!   removed before the call returns (success or failure)
//! ```

mod capabilities;
mod scratch;
mod strategies;

pub use capabilities::{
    ExportCapabilities, FitDirection, ImageExportFields, ImageExportOptions, ImageFileType,
    ImageResolution, PdfExportFields, PdfExportOptions, PrintFields, PrintSettings,
};
pub use scratch::{newest_match, ScratchDir, ScratchSpace, SCRATCH_PREFIX};
pub use strategies::{ImageExportStrategy, PdfExportStrategy, PrintManagerStrategy};

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::host::{Document, ElementId, SheetRecord};

/// Kind of artifact an export produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Combined PDF of one or more sheets.
    Pdf,
    /// PNG snapshot of one sheet.
    Image,
}

impl ArtifactKind {
    /// MIME type of the artifact.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Image => "image/png",
        }
    }

    /// File extension the host writes.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Image => "png",
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Image => "image",
        }
    }
}

/// An exported file, read fully into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    content: Vec<u8>,
    kind: ArtifactKind,
}

impl ExportArtifact {
    /// Wraps artifact bytes.
    #[must_use]
    pub const fn new(content: Vec<u8>, kind: ArtifactKind) -> Self {
        Self { content, kind }
    }

    /// Raw bytes.
    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Declared content type.
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        self.kind.content_type()
    }

    /// Byte length.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.content.len()
    }

    /// Base64 (standard alphabet) encoding of the content.
    #[must_use]
    pub fn to_base64(&self) -> String {
        BASE64_STANDARD.encode(&self.content)
    }
}

/// Outcome of one strategy in the fallback sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportStrategyResult {
    /// Strategy name.
    pub strategy: &'static str,
    /// Whether the strategy ran. Strategies after the winning one do not.
    pub attempted: bool,
    /// Whether it produced the artifact.
    pub succeeded: bool,
    /// Why it failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ExportStrategyResult {
    fn succeeded(strategy: &'static str) -> Self {
        Self {
            strategy,
            attempted: true,
            succeeded: true,
            reason: None,
        }
    }

    fn failed(strategy: &'static str, reason: String) -> Self {
        Self {
            strategy,
            attempted: true,
            succeeded: false,
            reason: Some(reason),
        }
    }

    const fn skipped(strategy: &'static str) -> Self {
        Self {
            strategy,
            attempted: false,
            succeeded: false,
            reason: None,
        }
    }
}

/// Identifiers of the built-in strategies, as used in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyId {
    /// Declarative PDF export options.
    PdfExport,
    /// Print manager, combined print-to-file.
    PrintManager,
    /// Image export options with directory scan.
    ImageExport,
}

impl StrategyId {
    /// Configuration / report name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::PdfExport => "pdf_export",
            Self::PrintManager => "print_manager",
            Self::ImageExport => "image_export",
        }
    }

    /// Artifact kind the strategy produces.
    #[must_use]
    pub const fn kind(self) -> ArtifactKind {
        match self {
            Self::PdfExport | Self::PrintManager => ArtifactKind::Pdf,
            Self::ImageExport => ArtifactKind::Image,
        }
    }
}

/// One export request handed to the strategies.
#[derive(Debug, Clone)]
pub struct ExportJob {
    /// Kind of artifact wanted.
    pub kind: ArtifactKind,
    /// Sheets to export, in request order.
    pub sheets: Vec<SheetRecord>,
    /// Predictable file stem for the output.
    pub file_stem: String,
}

impl ExportJob {
    /// Combined PDF of the given sheets.
    #[must_use]
    pub fn pdf(sheets: Vec<SheetRecord>) -> Self {
        let file_stem = match sheets.as_slice() {
            [only] => format!("sheet_{}", file_safe(&only.number)),
            _ => "sheets_combined".to_string(),
        };
        Self {
            kind: ArtifactKind::Pdf,
            sheets,
            file_stem,
        }
    }

    /// PNG snapshot of one sheet.
    #[must_use]
    pub fn image(sheet: SheetRecord) -> Self {
        let file_stem = format!("sheet_{}", file_safe(&sheet.number));
        Self {
            kind: ArtifactKind::Image,
            sheets: vec![sheet],
            file_stem,
        }
    }

    /// Host ids of the sheets.
    #[must_use]
    pub fn sheet_ids(&self) -> Vec<ElementId> {
        self.sheets.iter().map(|s| s.id).collect()
    }
}

/// Replaces anything outside `[A-Za-z0-9_-]` with `_`.
fn file_safe(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// One concrete way of producing an artifact.
pub trait ExportStrategy: Send + Sync {
    /// Name used in logs and attempt reports.
    fn name(&self) -> &'static str;

    /// Artifact kind this strategy produces.
    fn kind(&self) -> ArtifactKind;

    /// Configures the options object, invokes the host export into `dir`,
    /// and probes for the output file.
    ///
    /// # Errors
    ///
    /// Returns the failure reason if the host call failed or no file was
    /// produced.
    fn produce(&self, doc: &dyn Document, job: &ExportJob, dir: &Path) -> Result<PathBuf, String>;
}

/// Settings for building a selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorSettings {
    /// Where scratch directories go.
    pub scratch: ScratchSpace,
    /// Order in which PDF strategies are tried.
    pub pdf_order: Vec<StrategyId>,
    /// Pixel size for image export.
    pub image_pixel_size: u32,
}

impl Default for SelectorSettings {
    fn default() -> Self {
        Self {
            scratch: ScratchSpace::system(),
            pdf_order: vec![StrategyId::PdfExport, StrategyId::PrintManager],
            image_pixel_size: 2048,
        }
    }
}

/// A successful export.
#[derive(Debug, Clone)]
pub struct ExportSuccess {
    /// The artifact.
    pub artifact: ExportArtifact,
    /// Name of the strategy that produced it.
    pub strategy: &'static str,
    /// Every strategy for this kind, in order, with its outcome.
    pub attempts: Vec<ExportStrategyResult>,
}

/// Ordered fallback over export strategies.
pub struct ExportSelector {
    strategies: Vec<Box<dyn ExportStrategy>>,
    scratch: ScratchSpace,
}

impl ExportSelector {
    /// Creates a selector from explicit strategies, tried in the given order.
    #[must_use]
    pub fn new(strategies: Vec<Box<dyn ExportStrategy>>, scratch: ScratchSpace) -> Self {
        Self {
            strategies,
            scratch,
        }
    }

    /// Builds the strategy list the host revision supports.
    ///
    /// Strategies whose entry point is missing from `capabilities` are not
    /// constructed.
    #[must_use]
    pub fn from_capabilities(
        capabilities: &ExportCapabilities,
        settings: &SelectorSettings,
    ) -> Self {
        let mut strategies: Vec<Box<dyn ExportStrategy>> = Vec::new();

        for id in &settings.pdf_order {
            match id {
                StrategyId::PdfExport => {
                    if let Some(fields) = capabilities.pdf_export {
                        strategies.push(Box::new(PdfExportStrategy::new(fields)));
                    }
                }
                StrategyId::PrintManager => {
                    if let Some(fields) = capabilities.print_manager {
                        strategies.push(Box::new(PrintManagerStrategy::new(fields)));
                    }
                }
                StrategyId::ImageExport => {}
            }
        }

        if let Some(fields) = capabilities.image_export {
            strategies.push(Box::new(ImageExportStrategy::new(
                fields,
                settings.image_pixel_size,
            )));
        }

        let selector = Self::new(strategies, settings.scratch.clone());
        tracing::info!(
            pdf = ?selector.strategy_names(ArtifactKind::Pdf),
            image = ?selector.strategy_names(ArtifactKind::Image),
            "Export strategies resolved"
        );
        selector
    }

    /// Names of the strategies for `kind`, in the order they are tried.
    #[must_use]
    pub fn strategy_names(&self, kind: ArtifactKind) -> Vec<&'static str> {
        self.strategies
            .iter()
            .filter(|s| s.kind() == kind)
            .map(|s| s.name())
            .collect()
    }

    /// Runs the fallback sequence for `job`. The first success wins.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ArtifactNotCreated`] with every attempt if no
    /// strategy produced a file, or [`BridgeError::InternalFailure`] if the
    /// scratch directory could not be created.
    pub fn run(&self, doc: &dyn Document, job: &ExportJob) -> Result<ExportSuccess, BridgeError> {
        let scratch = self
            .scratch
            .create(job.kind.label())
            .map_err(|e| BridgeError::internal("Failed to create export scratch directory", e))?;

        let candidates: Vec<&dyn ExportStrategy> = self
            .strategies
            .iter()
            .filter(|s| s.kind() == job.kind)
            .map(|s| &**s)
            .collect();

        if candidates.is_empty() {
            tracing::warn!(kind = ?job.kind, "No export strategy available on this host");
        }

        let mut attempts = Vec::with_capacity(candidates.len());
        let mut winner = None;

        for strategy in &candidates {
            if winner.is_some() {
                attempts.push(ExportStrategyResult::skipped(strategy.name()));
                continue;
            }

            match Self::attempt(*strategy, doc, job, &scratch) {
                Ok(artifact) => {
                    tracing::info!(
                        strategy = strategy.name(),
                        bytes = artifact.byte_len(),
                        "Export succeeded"
                    );
                    attempts.push(ExportStrategyResult::succeeded(strategy.name()));
                    winner = Some((artifact, strategy.name()));
                }
                Err(reason) => {
                    tracing::warn!(strategy = strategy.name(), reason = %reason, "Export strategy failed");
                    attempts.push(ExportStrategyResult::failed(strategy.name(), reason));
                }
            }
        }

        scratch.close();

        match winner {
            Some((artifact, strategy)) => Ok(ExportSuccess {
                artifact,
                strategy,
                attempts,
            }),
            None => Err(BridgeError::ArtifactNotCreated { attempts }),
        }
    }

    fn attempt(
        strategy: &dyn ExportStrategy,
        doc: &dyn Document,
        job: &ExportJob,
        scratch: &ScratchDir,
    ) -> Result<ExportArtifact, String> {
        let dir = scratch
            .attempt_dir(strategy.name())
            .map_err(|e| format!("could not create attempt directory: {e}"))?;
        let path = strategy.produce(doc, job, &dir)?;
        scratch
            .take_artifact(&path, job.kind)
            .map_err(|e| format!("could not read {}: {e}", path.display()))
    }
}
