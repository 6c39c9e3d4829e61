//! The three host export entry points, each behind [`ExportStrategy`].

use std::path::{Path, PathBuf};

use super::{
    newest_match, ArtifactKind, ExportJob, ExportStrategy, ImageExportFields, ImageExportOptions,
    PdfExportFields, PdfExportOptions, PrintFields, PrintSettings, StrategyId,
};
use crate::host::Document;

/// Declarative PDF export. The output name is fully determined by the
/// options object.
#[derive(Debug, Clone, Copy)]
pub struct PdfExportStrategy {
    fields: PdfExportFields,
}

impl PdfExportStrategy {
    /// Creates the strategy for a host exposing `fields`.
    #[must_use]
    pub const fn new(fields: PdfExportFields) -> Self {
        Self { fields }
    }
}

impl ExportStrategy for PdfExportStrategy {
    fn name(&self) -> &'static str {
        StrategyId::PdfExport.name()
    }

    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Pdf
    }

    fn produce(&self, doc: &dyn Document, job: &ExportJob, dir: &Path) -> Result<PathBuf, String> {
        let options = PdfExportOptions::configure(self.fields, job.file_stem.clone());

        doc.export_pdf(dir, &job.sheet_ids(), &options)
            .map_err(|e| format!("PDF export call failed: {e}"))?;

        expect_file(dir.join(format!("{}.pdf", job.file_stem)))
    }
}

/// Print manager driven print-to-file.
#[derive(Debug, Clone, Copy)]
pub struct PrintManagerStrategy {
    fields: PrintFields,
}

impl PrintManagerStrategy {
    /// Creates the strategy for a host exposing `fields`.
    #[must_use]
    pub const fn new(fields: PrintFields) -> Self {
        Self { fields }
    }
}

impl ExportStrategy for PrintManagerStrategy {
    fn name(&self) -> &'static str {
        StrategyId::PrintManager.name()
    }

    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Pdf
    }

    fn produce(&self, doc: &dyn Document, job: &ExportJob, dir: &Path) -> Result<PathBuf, String> {
        let target = dir.join(format!("{}.pdf", job.file_stem));
        let settings = PrintSettings::configure(self.fields, target.clone());

        doc.print_to_file(&job.sheet_ids(), &settings)
            .map_err(|e| format!("print call failed: {e}"))?;

        expect_file(target)
    }
}

/// Image export. The host appends its own suffix to the prefix, so the
/// output is found by scanning the attempt directory for the newest match.
#[derive(Debug, Clone, Copy)]
pub struct ImageExportStrategy {
    fields: ImageExportFields,
    pixel_size: u32,
}

impl ImageExportStrategy {
    /// Creates the strategy for a host exposing `fields`.
    #[must_use]
    pub const fn new(fields: ImageExportFields, pixel_size: u32) -> Self {
        Self { fields, pixel_size }
    }
}

impl ExportStrategy for ImageExportStrategy {
    fn name(&self) -> &'static str {
        StrategyId::ImageExport.name()
    }

    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Image
    }

    fn produce(&self, doc: &dyn Document, job: &ExportJob, dir: &Path) -> Result<PathBuf, String> {
        let options = ImageExportOptions::configure(
            self.fields,
            dir.join(&job.file_stem),
            job.sheet_ids(),
            self.pixel_size,
        );

        doc.export_image(&options)
            .map_err(|e| format!("image export call failed: {e}"))?;

        newest_match(dir, &job.file_stem, ArtifactKind::Image.extension()).ok_or_else(|| {
            format!(
                "no file matching {}*.{} was created",
                job.file_stem,
                ArtifactKind::Image.extension()
            )
        })
    }
}

fn expect_file(path: PathBuf) -> Result<PathBuf, String> {
    if path.is_file() {
        Ok(path)
    } else {
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Err(format!("expected output {name} was not created"))
    }
}
