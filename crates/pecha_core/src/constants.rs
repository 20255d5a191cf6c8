//! Shared constants used across pecha crates.

/// Characters of context added on each side of a patch edit.
pub const PATCH_MARGIN: usize = 4;

/// Longest pattern the bitap matcher handles in one pass.
pub const MATCH_MAX_BITS: usize = 32;

/// Extension of persisted layer files.
pub const LAYER_EXTENSION: &str = "layer";
/// Extension of layer dependency files.
pub const DEPS_EXTENSION: &str = "deps";
/// Extension of base texts, input documents and rendered views.
pub const TEXT_EXTENSION: &str = "txt";

/// Layer diverted into footnotes unless configured otherwise.
pub const DEFAULT_FOOTNOTE_LAYER: &str = "correction";

/// Default directory names, relative to the configured root.
pub const DEFAULT_BASES_DIR: &str = "plaintext";
/// Default layer directory.
pub const DEFAULT_LAYERS_DIR: &str = "admin/layers";
/// Default directory holding annotated input documents.
pub const DEFAULT_INPUT_DIR: &str = "user/edited";
/// Default directory receiving rendered views.
pub const DEFAULT_OUTPUT_DIR: &str = "user/output";
