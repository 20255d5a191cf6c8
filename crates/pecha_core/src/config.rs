//! Configuration loading from environment variables.

use crate::constants::{
    DEFAULT_BASES_DIR, DEFAULT_FOOTNOTE_LAYER, DEFAULT_INPUT_DIR, DEFAULT_LAYERS_DIR,
    DEFAULT_OUTPUT_DIR,
};
use crate::error::PechaError;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory layout and rendering options for one processing session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Base texts, one `<document>.txt` per document.
    pub bases_dir: PathBuf,
    /// Layer root, one sub-directory per document.
    pub layers_dir: PathBuf,
    /// Annotated source documents used to bootstrap new documents.
    pub input_dir: PathBuf,
    /// Rendered views and mistake reports.
    pub output_dir: PathBuf,
    /// Layer rendered as footnotes instead of inline edits, if any.
    pub footnote_layer: Option<String>,
}

/// Parse a boolean-like environment flag value.
///
/// # Supported Values
/// - Truthy: `1`, `true`, `yes`, `on`
/// - Falsy: `0`, `false`, `no`, `off`, empty string
///
/// Matching is case-insensitive and ignores surrounding whitespace.
///
/// # Returns
/// `Some(bool)` when the value is recognized, otherwise `None`.
pub fn parse_env_flag(value: &str) -> Option<bool> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn nonempty(value: Option<String>) -> Option<String> {
    value.and_then(|raw| {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

impl Config {
    /// Default layout under `root`.
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            bases_dir: root.join(DEFAULT_BASES_DIR),
            layers_dir: root.join(DEFAULT_LAYERS_DIR),
            input_dir: root.join(DEFAULT_INPUT_DIR),
            output_dir: root.join(DEFAULT_OUTPUT_DIR),
            footnote_layer: Some(DEFAULT_FOOTNOTE_LAYER.to_string()),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// # Returns
    /// A populated [`Config`] with defaults applied when env vars are missing.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Relative directory overrides resolve against `PECHA_ROOT`; a leading
    /// `~/` expands to the home directory.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let home = nonempty(lookup("HOME")).or_else(|| nonempty(lookup("USERPROFILE")));
        let expand = |raw: String| -> PathBuf {
            match (raw.strip_prefix("~/"), home.as_deref()) {
                (Some(rest), Some(home)) => Path::new(home).join(rest),
                _ => PathBuf::from(raw),
            }
        };

        let root = nonempty(lookup("PECHA_ROOT"))
            .map(&expand)
            .unwrap_or_else(|| PathBuf::from("."));
        let dir = |key: &str, default: &str| -> PathBuf {
            match nonempty(lookup(key)).map(&expand) {
                Some(path) if path.is_absolute() => path,
                Some(path) => root.join(path),
                None => root.join(default),
            }
        };

        let notes_enabled = lookup("PECHA_CORRECTIONS_AS_NOTES")
            .and_then(|value| parse_env_flag(&value))
            .unwrap_or(true);
        let footnote_layer = notes_enabled.then(|| {
            nonempty(lookup("PECHA_NOTES_LAYER"))
                .unwrap_or_else(|| DEFAULT_FOOTNOTE_LAYER.to_string())
        });

        Self {
            bases_dir: dir("PECHA_BASES_DIR", DEFAULT_BASES_DIR),
            layers_dir: dir("PECHA_LAYERS_DIR", DEFAULT_LAYERS_DIR),
            input_dir: dir("PECHA_INPUT_DIR", DEFAULT_INPUT_DIR),
            output_dir: dir("PECHA_OUTPUT_DIR", DEFAULT_OUTPUT_DIR),
            footnote_layer,
        }
    }

    /// Create every configured directory.
    ///
    /// # Errors
    /// Returns [`PechaError::Io`] for the first directory that cannot be created.
    pub fn ensure_dirs(&self) -> Result<(), PechaError> {
        for dir in [
            &self.bases_dir,
            &self.layers_dir,
            &self.input_dir,
            &self.output_dir,
        ] {
            fs::create_dir_all(dir).map_err(|err| PechaError::io(dir, err))?;
        }
        Ok(())
    }
}
