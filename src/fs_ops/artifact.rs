//! Optional derived-artifact hook for the mover (thumbnails, previews, ...).
//!
//! A generator runs after a copy has been verified. Its outcome never fails the
//! move; a produced artifact is tracked in the ledger so rollback can remove it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result of one generator call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedArtifact {
    pub success: bool,
    pub path: Option<PathBuf>,
    pub error: Option<String>,
}

impl GeneratedArtifact {
    pub fn produced(path: impl Into<PathBuf>) -> Self {
        GeneratedArtifact {
            success: true,
            path: Some(path.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        GeneratedArtifact {
            success: false,
            path: None,
            error: Some(error.into()),
        }
    }
}

pub trait ArtifactGenerator: Send + Sync {
    /// Whether `source` should get an artifact at all.
    fn is_eligible(&self, _source: &Path) -> bool {
        true
    }

    /// Produce an artifact for the file now living at `destination` on `disk`.
    fn generate(&self, disk: &str, destination: &Path) -> GeneratedArtifact;
}

/// Restricts an inner generator to files with one of the given extensions
/// (case-insensitive, without the leading dot).
pub struct ExtensionFilter {
    extensions: Vec<String>,
    inner: Arc<dyn ArtifactGenerator>,
}

impl ExtensionFilter {
    pub fn new<I, S>(inner: Arc<dyn ArtifactGenerator>, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ExtensionFilter {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            inner,
        }
    }
}

impl ArtifactGenerator for ExtensionFilter {
    fn is_eligible(&self, source: &Path) -> bool {
        let Some(ext) = source.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        let ext = ext.to_ascii_lowercase();
        self.extensions.iter().any(|e| *e == ext) && self.inner.is_eligible(source)
    }

    fn generate(&self, disk: &str, destination: &Path) -> GeneratedArtifact {
        self.inner.generate(disk, destination)
    }
}
