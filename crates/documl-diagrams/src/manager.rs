//! Run-scoped diagram manager.
//!
//! [`DiagramManager`] is the single source of truth for one documentation
//! run: the collaborator submits diagram fragments as it discovers them,
//! and after all documents have been processed a single [`dispatch`]
//! invocation renders every batch and persists the cache blob for the next
//! run.
//!
//! The manager is an explicitly owned value with the lifetime of one run.
//! `submit` does no I/O; producers submitting from multiple threads can
//! share the manager behind a `Mutex`.
//!
//! [`dispatch`]: DiagramManager::dispatch

use std::collections::HashMap;
use std::path::Path;

use documl_config::Config;

use crate::cache::SourceCache;
use crate::consts::CACHE_FILENAME;
use crate::format::OutputFormat;
use crate::plantuml::{self, RenderError, RenderTask};
use crate::registry::FormatRegistry;

/// Outcome of a dispatch run.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Number of renderer invocations attempted (one per non-empty batch).
    pub invocations: usize,
    /// Number of batches rendered successfully.
    pub rendered: usize,
    /// Batches that failed. Already logged; exposed for callers that want
    /// to surface a summary.
    pub errors: Vec<RenderError>,
}

/// Accumulates diagram fragments for one documentation run and dispatches
/// them in per-key batches.
pub struct DiagramManager {
    config: Config,
    registries: HashMap<OutputFormat, FormatRegistry>,
    cache: SourceCache,
    /// Concatenation of every fragment source submitted this run, across
    /// all formats and regardless of the skip decision. Becomes the next
    /// run's comparison blob.
    current: String,
    expected_images: Vec<String>,
}

impl DiagramManager {
    /// Create a manager for one run, loading the previous run's cache blob
    /// from the configured output directory.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let cache = SourceCache::load(config.output.dir.join(CACHE_FILENAME));
        Self {
            config,
            registries: HashMap::new(),
            cache,
            current: String::new(),
            expected_images: Vec::new(),
        }
    }

    /// Submit one diagram fragment.
    ///
    /// The fragment source always extends the current-run blob. When the
    /// non-empty source already occurs in the previous run's blob the
    /// fragment is skipped: its image is assumed present on disk from the
    /// prior run and no per-key state is touched. Otherwise the fragment
    /// is queued under `(format, key)` for batched rendering.
    pub fn submit(
        &mut self,
        format: OutputFormat,
        key: &str,
        output_name: &str,
        out_dir: &Path,
        source: &str,
    ) {
        self.current.push_str(source);

        if !source.is_empty() && self.cache.contains(source) {
            tracing::debug!("diagram '{output_name}' under '{key}' unchanged, skipping");
            return;
        }

        self.registries
            .entry(format)
            .or_default()
            .record(key, output_name, out_dir, source);
    }

    /// Record a final image filename for the generated index artifact.
    ///
    /// Side-channel for callers that already know an image's name,
    /// independent of the submit/dispatch pipeline.
    pub fn register_expected_image(&mut self, name: impl Into<String>) {
        self.expected_images.push(name.into());
    }

    /// Register the image a rendered batch output will produce.
    ///
    /// Strips any path prefix from `base_name` and appends the format's
    /// extension, then records the result for the index artifact.
    pub fn register_output(&mut self, base_name: &str, format: OutputFormat) {
        let base = base_name.rsplit('/').next().unwrap_or(base_name);
        self.register_expected_image(format!("{base}.{}", format.extension()));
    }

    /// Image filenames registered for the index artifact, in registration
    /// order.
    #[must_use]
    pub fn expected_images(&self) -> &[String] {
        &self.expected_images
    }

    /// Registry for one format, if any fragment was queued under it.
    #[must_use]
    pub fn registry(&self, format: OutputFormat) -> Option<&FormatRegistry> {
        self.registries.get(&format)
    }

    /// Render every queued batch and persist the cache blob.
    ///
    /// Invoked once, after all fragments for the run have been submitted.
    /// When nothing was submitted this is a no-op: no process is spawned
    /// and the cache artifact is left untouched. Otherwise the blob is
    /// persisted after every batch has completed, success or failure.
    pub fn dispatch(&mut self) -> DispatchReport {
        if self.current.is_empty() {
            tracing::debug!("no diagrams submitted, nothing to render");
            return DispatchReport::default();
        }

        let tasks = self.collect_tasks();
        let invocations = tasks.len();
        let result = plantuml::render_all(&tasks, &self.config);
        for error in &result.errors {
            tracing::error!("{error}");
        }

        self.cache.persist(&self.current);

        DispatchReport {
            invocations,
            rendered: result.rendered.len(),
            errors: result.errors,
        }
    }

    /// Build one render task per non-empty `(format, key)` entry, in
    /// format then key order.
    fn collect_tasks(&self) -> Vec<RenderTask> {
        let mut tasks = Vec::new();
        for format in OutputFormat::ALL {
            let Some(registry) = self.registries.get(&format) else {
                continue;
            };
            for (key, entry) in registry.iter() {
                // Fully cache-hit keys have no accumulated source
                if !entry.has_source() {
                    continue;
                }
                tasks.push(RenderTask {
                    format,
                    key: key.clone(),
                    source: entry.source().to_owned(),
                    out_dir: entry.out_dir().to_path_buf(),
                    output_names: entry.output_names().to_vec(),
                });
            }
        }
        tasks
    }
}
