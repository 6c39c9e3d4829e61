//! Scratch directories for export artifacts.
//!
//! Each export call gets one directory under the scratch root, and each
//! strategy attempt gets its own subdirectory inside it, so a half-written
//! file from a failed attempt can never be picked up by the next one. The
//! directory is removed before the call returns.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tempfile::TempDir;

use super::{ArtifactKind, ExportArtifact};

/// Prefix shared by every scratch directory this process creates.
pub const SCRATCH_PREFIX: &str = "revit_mcp_export_";

/// Where scratch directories are created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchSpace {
    root: PathBuf,
}

impl ScratchSpace {
    /// Scratch space under an explicit root.
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Scratch space under the system temporary directory.
    #[must_use]
    pub fn system() -> Self {
        Self::new(std::env::temp_dir())
    }

    /// The scratch root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates a fresh scratch directory for one export call.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn create(&self, label: &str) -> io::Result<ScratchDir> {
        let stamp = chrono::Local::now().format("%Y%m%d%H%M%S");
        let dir = tempfile::Builder::new()
            .prefix(&format!("{SCRATCH_PREFIX}{label}_{stamp}_"))
            .tempdir_in(&self.root)?;
        Ok(ScratchDir { dir })
    }
}

impl Default for ScratchSpace {
    fn default() -> Self {
        Self::system()
    }
}

/// One export call's scratch directory.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Path of the scratch directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Creates the subdirectory for one strategy attempt.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn attempt_dir(&self, strategy: &str) -> io::Result<PathBuf> {
        let path = self.dir.path().join(strategy);
        fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Reads an artifact fully into memory, then deletes its file.
    ///
    /// Deletion is attempted whether or not the read succeeded. A deletion
    /// failure is logged; the directory removal in [`Self::close`] is the
    /// backstop.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn take_artifact(&self, path: &Path, kind: ArtifactKind) -> io::Result<ExportArtifact> {
        let content = fs::read(path);

        if let Err(e) = fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to delete export artifact");
        }

        Ok(ExportArtifact::new(content?, kind))
    }

    /// Removes the scratch directory and everything left in it.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove export scratch directory");
        }
    }
}

/// Finds the most recently created file in `dir` named `<prefix>*.<extension>`.
///
/// Used when the host decides the final file name itself.
#[must_use]
pub fn newest_match(dir: &Path, prefix: &str, extension: &str) -> Option<PathBuf> {
    let pattern = format!(
        "{}/{}*.{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        glob::Pattern::escape(prefix),
        glob::Pattern::escape(extension)
    );

    let entries = match glob::glob(&pattern) {
        Ok(paths) => paths,
        Err(e) => {
            tracing::warn!(pattern = %pattern, error = %e, "Invalid artifact scan pattern");
            return None;
        }
    };

    entries
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .filter_map(|p| created_at(&p).map(|t| (t, p)))
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, p)| p)
}

fn created_at(path: &Path) -> Option<SystemTime> {
    let metadata = fs::metadata(path).ok()?;
    metadata.created().or_else(|_| metadata.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_dir_is_removed_on_close() {
        let root = tempfile::tempdir().unwrap();
        let space = ScratchSpace::new(root.path().to_path_buf());

        let scratch = space.create("pdf").unwrap();
        let attempt = scratch.attempt_dir("pdf_export").unwrap();
        fs::write(attempt.join("leftover.pdf"), b"%PDF").unwrap();
        assert!(scratch
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(SCRATCH_PREFIX));

        scratch.close();
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn take_artifact_reads_then_deletes() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchSpace::new(root.path().to_path_buf())
            .create("img")
            .unwrap();
        let file = scratch.path().join("sheet.png");
        fs::write(&file, b"\x89PNG data").unwrap();

        let artifact = scratch.take_artifact(&file, ArtifactKind::Image).unwrap();
        assert_eq!(artifact.content(), b"\x89PNG data");
        assert_eq!(artifact.content_type(), "image/png");
        assert!(!file.exists());
    }

    #[test]
    fn take_artifact_missing_file_is_error() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchSpace::new(root.path().to_path_buf())
            .create("img")
            .unwrap();
        let result = scratch.take_artifact(&scratch.path().join("absent.png"), ArtifactKind::Image);
        assert!(result.is_err());
    }

    #[test]
    fn newest_match_picks_matching_files_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("other - Sheet - A101.png"), b"x").unwrap();
        fs::write(dir.path().join("sheet_A101 - notes.txt"), b"x").unwrap();
        assert!(newest_match(dir.path(), "sheet_A101", "png").is_none());

        let expected = dir.path().join("sheet_A101 - Sheet - A101 - Plan.png");
        fs::write(&expected, b"x").unwrap();
        assert_eq!(newest_match(dir.path(), "sheet_A101", "png"), Some(expected));
    }

    #[test]
    fn newest_match_handles_glob_metacharacters() {
        let dir = tempfile::tempdir().unwrap();
        let expected = dir.path().join("sheet_[A]101.png");
        fs::write(&expected, b"x").unwrap();
        assert_eq!(newest_match(dir.path(), "sheet_[A]101", "png"), Some(expected));
    }
}
