//! Batched `PlantUML` rendering with an unchanged-content cache for documl.
//!
//! While a documentation set is processed, an upstream collaborator submits
//! diagram source fragments to a [`DiagramManager`]. Fragments are grouped
//! by a logical output key so that one renderer process invocation covers
//! every fragment sharing the key, and fragments whose source is unchanged
//! since the previous run are skipped entirely.
//!
//! # Architecture
//!
//! - [`format`]: the closed set of output image formats
//! - [`registry`]: per-format accumulation of fragments by output key
//! - [`cache`]: the previous-run source blob driving the skip decision
//! - [`plantuml`]: per-key batch dispatch to the external renderer,
//!   including the optional EPS to PDF post-pass
//! - [`manager`]: run-scoped orchestration tying the above together
//!
//! # Example
//!
//! ```ignore
//! use documl_config::Config;
//! use documl_diagrams::{DiagramManager, OutputFormat};
//!
//! let config = Config::discover(std::path::Path::new("."))?;
//! let out_dir = config.output.dir.clone();
//! let mut manager = DiagramManager::new(config);
//!
//! // Once per diagram fragment discovered during document processing:
//! manager.submit(
//!     OutputFormat::Vector,
//!     "page1",
//!     "inline_diagram_1",
//!     &out_dir,
//!     "@startuml\nA -> B\n@enduml",
//! );
//!
//! // Once, after all documents have been processed:
//! let report = manager.dispatch();
//! ```

mod cache;
mod consts;
mod format;
mod manager;
mod plantuml;
mod registry;

pub use cache::SourceCache;
pub use format::OutputFormat;
pub use manager::{DiagramManager, DispatchReport};
pub use plantuml::{
    PartialRenderResult, RenderError, RenderErrorKind, RenderTask, RenderedBatch,
    combined_source_path, render_all,
};
pub use registry::{FormatRegistry, KeyEntry};
