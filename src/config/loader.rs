//! Cloud-config loader
//!
//! Prepares the document a run executes against: the source is normalized,
//! copied into a transient working directory, optionally merged with an
//! override, and finally parsed.

use super::format::{self, replace_atomically};
use super::merge::{merge_override, parse_override};
use super::validate::{ValidationReport, validate_source};
use super::Document;
use crate::{CloudApplyError, RunConfiguration};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::fs;
use tracing::{debug, info, warn};

const WORKING_FILE: &str = "cloud-config.yaml";

/// Transient copy of the config the pipeline executes against
///
/// The directory is removed when the value is dropped, on success and on
/// every error path alike.
#[derive(Debug)]
pub struct WorkingCopy {
    dir: TempDir,
    path: PathBuf,
}

impl WorkingCopy {
    /// Copy `source` into a fresh working directory
    pub async fn create(source: &Path) -> Result<Self, CloudApplyError> {
        let dir = tempfile::Builder::new()
            .prefix("cloud-config-apply.")
            .tempdir()?;
        let path = dir.path().join(WORKING_FILE);
        fs::copy(source, &path).await?;
        debug!("Working copy at {}", path.display());
        Ok(Self { dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scratch directory; phases stage file content here
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Merge an override into the working copy
    ///
    /// The merged document is written to a sibling temporary file, reparsed and
    /// validated, and only then renamed over the working copy. On any failure
    /// the working copy is left as it was.
    pub async fn apply_override(&self, spec: &str) -> Result<Document, CloudApplyError> {
        let overlay = parse_override(spec)?;
        if overlay.is_empty() {
            warn!("Override '{}' contained no usable entries", spec);
        }

        let base = read_document(&self.path).await?;
        let merged = merge_override(&base, &overlay);
        let rendered = merged.to_yaml()?;

        let reparsed = Document::from_yaml(&rendered).map_err(|e| {
            CloudApplyError::OverrideSyntax(format!("merged document does not reparse: {e}"))
        })?;
        if reparsed != merged {
            return Err(CloudApplyError::OverrideSyntax(
                "merged document does not round-trip".to_string(),
            ));
        }

        replace_atomically(&self.path, rendered.as_bytes())?;
        info!("Applied override with {} top-level entries", overlay.len());
        Ok(merged)
    }

    /// Clean up now, logging instead of failing
    pub fn close(self) {
        let dir = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!("Could not remove working directory {}: {}", dir.display(), e);
        }
    }
}

/// Read and parse a block-form file; a parse failure is a validation error
pub async fn read_document(path: &Path) -> Result<Document, CloudApplyError> {
    let text = read_config(path).await?;
    Document::from_yaml(&text)
        .map_err(|e| CloudApplyError::Validation(format!("{}: {e}", path.display())))
}

/// Read a config file, distinguishing a missing file from other I/O errors
pub async fn read_config(path: &Path) -> Result<String, CloudApplyError> {
    match fs::read_to_string(path).await {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(CloudApplyError::MissingConfig(path.to_path_buf()))
        }
        Err(e) => Err(CloudApplyError::Io(e)),
    }
}

/// Normalize, merge and validate entirely in memory
///
/// Used by `validate`, which must not rewrite the source.
pub async fn load_for_validation(
    path: &Path,
    override_spec: Option<&str>,
    config: &RunConfiguration,
) -> Result<(Document, ValidationReport), CloudApplyError> {
    let text = read_config(path).await?;
    let normalized = format::normalize_text(&text, path)?;

    let text = match override_spec {
        Some(spec) => {
            let base = Document::from_yaml(&normalized)
                .map_err(|e| CloudApplyError::Validation(format!("{}: {e}", path.display())))?;
            merge_override(&base, &parse_override(spec)?).to_yaml()?
        }
        None => normalized,
    };

    validate_source(&text, config)
}
