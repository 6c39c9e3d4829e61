//! Entity lookup resolvers shared by the routes.
//!
//! Nothing here caches: every call re-reads the document, which may have
//! changed since the last invocation.

use serde_json::Value;

use crate::envelope::MAX_CANDIDATES;
use crate::host::{Document, ElementId, HostError, LevelRecord, SheetRecord};

/// Sheets in host enumeration order. Sheets that fail to read are logged and
/// skipped.
///
/// # Errors
///
/// Returns an error if the host cannot enumerate sheets at all.
pub fn enumerate_sheets(doc: &dyn Document) -> Result<Vec<SheetRecord>, HostError> {
    Ok(doc
        .sheets()?
        .into_iter()
        .filter_map(|item| match item {
            Ok(sheet) => Some(sheet),
            Err(e) => {
                tracing::warn!(error = %e, "Could not process sheet");
                None
            }
        })
        .collect())
}

/// Sheets in stable `(number, name)` order.
///
/// # Errors
///
/// Returns an error if the host cannot enumerate sheets at all.
pub fn list_sheets(doc: &dyn Document) -> Result<Vec<SheetRecord>, HostError> {
    let mut sheets = enumerate_sheets(doc)?;
    sort_sheets(&mut sheets);
    Ok(sheets)
}

/// Sorts by `(number, name)`, breaking full ties by id so the order never
/// depends on enumeration order.
pub fn sort_sheets(sheets: &mut [SheetRecord]) {
    sheets.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()).then(a.id.cmp(&b.id)));
}

/// Levels ordered by elevation, then name. Levels that fail to read are
/// logged and skipped.
///
/// # Errors
///
/// Returns an error if the host cannot enumerate levels at all.
pub fn list_levels(doc: &dyn Document) -> Result<Vec<LevelRecord>, HostError> {
    let mut levels: Vec<LevelRecord> = doc
        .levels()?
        .into_iter()
        .filter_map(|item| match item {
            Ok(level) => Some(level),
            Err(e) => {
                tracing::warn!(error = %e, "Could not process level");
                None
            }
        })
        .collect();
    levels.sort_by(|a, b| {
        a.elevation
            .total_cmp(&b.elevation)
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(levels)
}

/// First sheet whose number matches exactly. Duplicates are a data-quality
/// condition in the document; the first in enumeration order wins.
#[must_use]
pub fn find_by_number<'a>(sheets: &'a [SheetRecord], number: &str) -> Option<&'a SheetRecord> {
    sheets.iter().find(|s| s.number == number)
}

/// Sheet with the given element id.
#[must_use]
pub fn find_by_id(sheets: &[SheetRecord], id: ElementId) -> Option<&SheetRecord> {
    sheets.iter().find(|s| s.id == id)
}

/// A caller-supplied reference to a sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetRef {
    /// Element id.
    Id(ElementId),
    /// Sheet number, or an all-digit string that may also be an id.
    Text(String),
}

impl SheetRef {
    /// Reads a reference from a JSON number or string.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Id),
            Value::String(s) if !s.trim().is_empty() => Some(Self::Text(s.trim().to_string())),
            _ => None,
        }
    }
}

impl std::fmt::Display for SheetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Resolves a reference against `sheets`.
///
/// All-digit strings are tried as element ids first and then as sheet
/// numbers. A sheet literally numbered with digits that collide with another
/// sheet's id therefore resolves to the id match.
#[must_use]
pub fn resolve_sheet<'a>(sheets: &'a [SheetRecord], reference: &SheetRef) -> Option<&'a SheetRecord> {
    match reference {
        SheetRef::Id(id) => find_by_id(sheets, *id),
        SheetRef::Text(text) => {
            let as_id = if text.bytes().all(|b| b.is_ascii_digit()) {
                text.parse::<ElementId>()
                    .ok()
                    .and_then(|id| find_by_id(sheets, id))
            } else {
                None
            };
            as_id.or_else(|| find_by_number(sheets, text))
        }
    }
}

/// Sheet numbers offered back to a caller after a lookup miss.
#[must_use]
pub fn candidate_preview(sheets: &[SheetRecord]) -> Vec<String> {
    let mut sorted = sheets.to_vec();
    sort_sheets(&mut sorted);
    sorted
        .into_iter()
        .take(MAX_CANDIDATES)
        .map(|s| s.number)
        .collect()
}
