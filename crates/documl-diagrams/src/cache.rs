//! Unchanged-content cache for diagram source.
//!
//! The cache artifact is a single opaque text file holding the
//! concatenation of every diagram source processed in the previous run.
//! A fragment whose source occurs as a contiguous substring of that blob is
//! assumed already rendered on disk and is skipped.
//!
//! Containment is a deliberate approximation: it needs no hashing
//! infrastructure, at the cost of a possible false-positive skip when one
//! fragment's source is a substring of another fragment's previous source.

use std::fs;
use std::path::PathBuf;

/// Previous-run source blob, loaded once at manager construction.
#[derive(Debug)]
pub struct SourceCache {
    path: PathBuf,
    previous: String,
}

impl SourceCache {
    /// Load the cache artifact at `path`.
    ///
    /// A missing or unreadable artifact yields an empty blob, which means
    /// every fragment is treated as changed. Absence is not an error.
    #[must_use]
    pub fn load(path: PathBuf) -> Self {
        let previous = match fs::read_to_string(&path) {
            Ok(content) => {
                tracing::debug!(
                    "loaded diagram cache {} ({} bytes)",
                    path.display(),
                    content.len()
                );
                content
            }
            Err(_) => {
                tracing::debug!(
                    "no diagram cache at {}, all diagrams will be rendered",
                    path.display()
                );
                String::new()
            }
        };
        Self { path, previous }
    }

    /// Whether `source` occurs verbatim anywhere in the previous-run blob.
    #[must_use]
    pub fn contains(&self, source: &str) -> bool {
        self.previous.contains(source)
    }

    /// Write `blob` to the artifact location, replacing any prior content.
    ///
    /// A write failure only degrades the next run's hit rate, so it is
    /// logged as a warning and never propagated.
    pub fn persist(&self, blob: &str) {
        if let Err(e) = fs::write(&self.path, blob) {
            tracing::warn!("failed to write diagram cache {}: {e}", self.path.display());
        }
    }
}
