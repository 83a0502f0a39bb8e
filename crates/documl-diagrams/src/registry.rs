//! Per-format accumulation of diagram fragments by output key.
//!
//! A [`FormatRegistry`] maps a logical output key (typically a source
//! document or page name) to the content accumulated for that key. Each
//! [`OutputFormat`](crate::OutputFormat) owns its own registry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Content accumulated for one output key.
#[derive(Debug)]
pub struct KeyEntry {
    /// Image basenames requested under this key, in submission order.
    /// Duplicates are allowed.
    output_names: Vec<String>,
    /// Concatenated source of every non-skipped fragment, in submission order.
    source: String,
    /// Directory the rendered images are written into. Bound by the first
    /// fragment for the key and never re-validated.
    out_dir: PathBuf,
}

impl KeyEntry {
    fn new(out_dir: PathBuf) -> Self {
        Self {
            output_names: Vec::new(),
            source: String::new(),
            out_dir,
        }
    }

    /// Image basenames requested under this key.
    #[must_use]
    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    /// Accumulated diagram source for this key.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Output directory bound to this key.
    #[must_use]
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Whether this entry has any source to render.
    ///
    /// Entries created only by empty-source fragments need no renderer
    /// invocation.
    #[must_use]
    pub fn has_source(&self) -> bool {
        !self.source.is_empty()
    }
}

/// Mapping from output key to accumulated content for a single format.
///
/// Keys iterate in sorted order so dispatch is deterministic.
#[derive(Debug, Default)]
pub struct FormatRegistry {
    entries: BTreeMap<String, KeyEntry>,
}

impl FormatRegistry {
    /// Record one fragment under `key`.
    ///
    /// Creates the entry (binding `out_dir`) on first use; later fragments
    /// for the same key keep the original directory binding.
    pub fn record(&mut self, key: &str, output_name: &str, out_dir: &Path, source: &str) {
        let entry = self
            .entries
            .entry(key.to_owned())
            .or_insert_with(|| KeyEntry::new(out_dir.to_path_buf()));
        entry.output_names.push(output_name.to_owned());
        entry.source.push_str(source);
    }

    /// Look up the entry for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&KeyEntry> {
        self.entries.get(key)
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &KeyEntry)> {
        self.entries.iter()
    }

    /// Number of keys in this registry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether this registry has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
