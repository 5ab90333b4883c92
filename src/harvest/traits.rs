//! Core traits and error types for the provenance harvest.
//!
//! This module defines the seams the pipeline stages are built on:
//! - Recipe dialects via [`RecipeFormat`]
//! - Standardized error handling for each stage

use std::path::{Path, PathBuf};
use thiserror::Error;

// ============================================================================
// Recipe Format Trait
// ============================================================================

/// Abstraction over a build-recipe dialect (BitBake today).
///
/// The locator and extractor never hard-code file extensions or variable
/// names; they ask the format. Each format provides:
/// - Recognized recipe file extensions
/// - Naming conventions (VCS suffixes, the directory-generic file name)
/// - The three declaration markers that carry source provenance
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so one instance can be shared by
/// concurrently processed packages.
pub trait RecipeFormat: Send + Sync {
    /// Returns the unique identifier for this format, used in logging.
    fn name(&self) -> &str;

    /// Recognized recipe file extensions, without the leading dot.
    fn extensions(&self) -> &[&'static str];

    /// Suffixes appended to recipe names to mark the fetcher in use
    /// (e.g. `foo_git.bb`). Checked in order; only the first match is stripped.
    fn vcs_suffixes(&self) -> &[&'static str];

    /// Recipe name meaning "applies to the package owning this directory".
    fn generic_token(&self) -> &str;

    /// Variable carrying the source location.
    fn uri_marker(&self) -> &str;

    /// Variable carrying the pinned revision.
    fn revision_marker(&self) -> &str;

    /// Variable carrying the source branch.
    fn branch_marker(&self) -> &str;

    /// Substrings that flag a URI line as version-controlled.
    fn vcs_indicators(&self) -> &[&'static str];

    /// Detects whether a path looks like a recipe of this format.
    ///
    /// Default implementation checks the extension only.
    fn can_handle(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions().contains(&ext))
            .unwrap_or(false)
    }

    /// Returns the file name with a recognized extension removed.
    fn recipe_stem<'a>(&self, file_name: &'a str) -> &'a str {
        self.extensions()
            .iter()
            .find_map(|ext| {
                file_name
                    .strip_suffix(ext)
                    .and_then(|rest| rest.strip_suffix('.'))
            })
            .unwrap_or(file_name)
    }

    /// Strips the first matching VCS suffix, if any.
    fn strip_vcs_suffix<'a>(&self, name: &'a str) -> Option<&'a str> {
        self.vcs_suffixes()
            .iter()
            .find_map(|suffix| name.strip_suffix(suffix))
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while reading the build manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Manifest file could not be read
    #[error("Failed to read manifest '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur during declaration extraction.
///
/// Only the primary recipe produces errors; sibling files that cannot be read
/// are logged and skipped.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// Primary recipe file could not be read
    #[error("Failed to read recipe '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// Tests
// ============================================================================
