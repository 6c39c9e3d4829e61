//! Export capability descriptor and the option objects built from it.
//!
//! Host revisions differ in which export entry points exist and which option
//! fields those entry points accept. The descriptor is resolved once from the
//! [`crate::host::SessionProvider`]; option objects are then built with only
//! the fields the descriptor lists, so nothing is attempted against a field
//! the host does not have.

use std::path::PathBuf;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::host::ElementId;

bitflags! {
    /// Optional fields of the declarative PDF export options object.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct PdfExportFields: u8 {
        /// Combine all sheets into one file.
        const COMBINE = 1;
        /// Hide crop region boundaries.
        const HIDE_CROP_BOUNDARIES = 1 << 1;
        /// Hide scope boxes.
        const HIDE_SCOPE_BOXES = 1 << 2;
        /// Hide reference planes.
        const HIDE_REFERENCE_PLANES = 1 << 3;
        /// Fixed zoom percentage.
        const ZOOM_PERCENTAGE = 1 << 4;
        /// Centre the sheet on the paper.
        const PAPER_PLACEMENT = 1 << 5;
    }
}

bitflags! {
    /// Optional fields of the print manager.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct PrintFields: u8 {
        /// Combine all sheets into one output file.
        const COMBINED_FILE = 1;
        /// Restrict printing to an explicit view set.
        const SELECTED_VIEWS = 1 << 1;
        /// Hide crop region boundaries.
        const HIDE_CROP_BOUNDARIES = 1 << 2;
    }
}

bitflags! {
    /// Optional fields of the image export options object.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ImageExportFields: u8 {
        /// Output pixel size along the fit direction.
        const PIXEL_SIZE = 1;
        /// Fit direction for the pixel size.
        const FIT_DIRECTION = 1 << 1;
        /// Raster resolution.
        const RESOLUTION = 1 << 2;
        /// Output file type.
        const FILE_TYPE = 1 << 3;
        /// Zoom-to-fit mode.
        const ZOOM_TO_FIT = 1 << 4;
    }
}

/// What the running host revision can export.
///
/// `None` means the entry point does not exist on this revision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportCapabilities {
    /// Declarative PDF export options object.
    #[serde(default)]
    pub pdf_export: Option<PdfExportFields>,
    /// Print manager with print-to-file.
    #[serde(default)]
    pub print_manager: Option<PrintFields>,
    /// Image export options object.
    #[serde(default)]
    pub image_export: Option<ImageExportFields>,
}

impl ExportCapabilities {
    /// A host exposing every entry point with every optional field.
    #[must_use]
    pub const fn full() -> Self {
        Self {
            pdf_export: Some(PdfExportFields::all()),
            print_manager: Some(PrintFields::all()),
            image_export: Some(ImageExportFields::all()),
        }
    }
}

/// Declarative PDF export options.
///
/// `None` fields are left at the host's default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PdfExportOptions {
    /// Output file stem; the host appends `.pdf`.
    pub file_name: String,
    /// Combine into one file.
    pub combine: Option<bool>,
    /// Hide crop region boundaries.
    pub hide_crop_boundaries: Option<bool>,
    /// Hide scope boxes.
    pub hide_scope_boxes: Option<bool>,
    /// Hide reference planes.
    pub hide_reference_planes: Option<bool>,
    /// Zoom percentage.
    pub zoom_percentage: Option<u16>,
    /// Centre on paper.
    pub paper_placement_center: Option<bool>,
}

impl PdfExportOptions {
    /// Builds options for a combined export, setting only supported fields.
    #[must_use]
    pub fn configure(fields: PdfExportFields, file_name: impl Into<String>) -> Self {
        let flag = |f: PdfExportFields| fields.contains(f).then_some(true);
        Self {
            file_name: file_name.into(),
            combine: flag(PdfExportFields::COMBINE),
            hide_crop_boundaries: flag(PdfExportFields::HIDE_CROP_BOUNDARIES),
            hide_scope_boxes: flag(PdfExportFields::HIDE_SCOPE_BOXES),
            hide_reference_planes: flag(PdfExportFields::HIDE_REFERENCE_PLANES),
            zoom_percentage: fields.contains(PdfExportFields::ZOOM_PERCENTAGE).then_some(100),
            paper_placement_center: flag(PdfExportFields::PAPER_PLACEMENT),
        }
    }
}

/// Print manager settings for print-to-file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrintSettings {
    /// Full output path.
    pub print_to_file_name: PathBuf,
    /// Combine into one file.
    pub combined_file: Option<bool>,
    /// Print only the given view set.
    pub selected_views: Option<bool>,
    /// Hide crop region boundaries.
    pub hide_crop_boundaries: Option<bool>,
}

impl PrintSettings {
    /// Builds combined print-to-file settings, setting only supported fields.
    #[must_use]
    pub fn configure(fields: PrintFields, print_to_file_name: PathBuf) -> Self {
        let flag = |f: PrintFields| fields.contains(f).then_some(true);
        Self {
            print_to_file_name,
            combined_file: flag(PrintFields::COMBINED_FILE),
            selected_views: flag(PrintFields::SELECTED_VIEWS),
            hide_crop_boundaries: flag(PrintFields::HIDE_CROP_BOUNDARIES),
        }
    }
}

/// Fit direction for raster export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitDirection {
    /// Pixel size applies to the width.
    Horizontal,
    /// Pixel size applies to the height.
    Vertical,
}

/// Raster resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageResolution {
    Dpi72,
    Dpi150,
    Dpi300,
    Dpi600,
}

/// Raster file type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFileType {
    Png,
}

/// Image export options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageExportOptions {
    /// Output path prefix; the host may append view-specific suffixes.
    pub file_path_prefix: PathBuf,
    /// Views (sheets) to export.
    pub views: Vec<ElementId>,
    /// Pixel size along the fit direction.
    pub pixel_size: Option<u32>,
    /// Fit direction.
    pub fit_direction: Option<FitDirection>,
    /// Raster resolution.
    pub resolution: Option<ImageResolution>,
    /// Output file type.
    pub file_type: Option<ImageFileType>,
    /// Zoom to fit.
    pub zoom_to_fit: Option<bool>,
}

impl ImageExportOptions {
    /// Builds PNG export options for the given views, setting only supported
    /// fields.
    #[must_use]
    pub fn configure(
        fields: ImageExportFields,
        file_path_prefix: PathBuf,
        views: Vec<ElementId>,
        pixel_size: u32,
    ) -> Self {
        Self {
            file_path_prefix,
            views,
            pixel_size: fields
                .contains(ImageExportFields::PIXEL_SIZE)
                .then_some(pixel_size),
            fit_direction: fields
                .contains(ImageExportFields::FIT_DIRECTION)
                .then_some(FitDirection::Horizontal),
            resolution: fields
                .contains(ImageExportFields::RESOLUTION)
                .then_some(ImageResolution::Dpi150),
            file_type: fields
                .contains(ImageExportFields::FILE_TYPE)
                .then_some(ImageFileType::Png),
            zoom_to_fit: fields
                .contains(ImageExportFields::ZOOM_TO_FIT)
                .then_some(true),
        }
    }
}
