//! Internal constants for batch rendering.

/// Filename of the batch cache artifact inside the output directory.
///
/// The file holds the concatenation of every diagram source processed in
/// the previous run and is compared against verbatim.
pub const CACHE_FILENAME: &str = "documl_diagram_cache.puml";

/// Filename prefix for per-key combined source files.
pub const COMBINED_SOURCE_PREFIX: &str = "combined_";
