//! Persisted layers: one encoded patch edit per line, plus optional dependencies.
//!
//! Layout under the layer root: `<document>/<name>.layer` and
//! `<document>/<name>.deps`.

use crate::constants::{DEPS_EXTENSION, LAYER_EXTENSION};
use crate::error::PechaError;
use crate::fs_util::{read_text, write_atomic};
use crate::patch::{encode, parse_list, PatchEdit};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

/// Raw persisted form of one layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredLayer {
    /// Newline-joined encoded edits.
    pub edits: String,
    /// Newline-joined dependency names, when a `.deps` file exists.
    pub deps: Option<String>,
}

impl StoredLayer {
    /// Decode the stored edits.
    ///
    /// # Errors
    /// Returns [`PechaError::Decode`] for a malformed line.
    pub fn parse(&self) -> Result<Vec<PatchEdit>, PechaError> {
        parse_list(&self.edits)
    }

    /// Dependency names, blank lines skipped. Informational only.
    pub fn dependencies(&self) -> Vec<&str> {
        self.deps
            .as_deref()
            .map(|deps| {
                deps.lines()
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Reject names that would not stay inside their parent directory.
fn check_name(name: &str) -> Result<(), PechaError> {
    let escapes = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(|c: char| c == '/' || c == '\\' || c == '\0');
    if escapes {
        return Err(PechaError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Filesystem store rooted at the configured layer directory.
#[derive(Debug, Clone)]
pub struct LayerStore {
    root: PathBuf,
}

impl LayerStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding every layer of `document`.
    pub fn document_dir(&self, document: &str) -> PathBuf {
        self.root.join(document)
    }

    pub fn has_document(&self, document: &str) -> bool {
        self.document_dir(document).is_dir()
    }

    /// Create the layer directory for `document` if needed.
    ///
    /// # Errors
    /// Returns [`PechaError::InvalidName`] for a name that is not a single
    /// path component and [`PechaError::Io`] when the directory cannot be
    /// created.
    pub fn create_document(&self, document: &str) -> Result<PathBuf, PechaError> {
        check_name(document)?;
        let dir = self.document_dir(document);
        fs::create_dir_all(&dir).map_err(|err| PechaError::io(&dir, err))?;
        Ok(dir)
    }

    fn layer_path(
        &self,
        document: &str,
        name: &str,
        extension: &str,
    ) -> Result<PathBuf, PechaError> {
        check_name(document)?;
        check_name(name)?;
        Ok(self
            .document_dir(document)
            .join(format!("{}.{}", name, extension)))
    }

    /// Persist `edits` as layer `name` of `document`, replacing any previous
    /// version. Non-empty `deps` are written to the sibling `.deps` file;
    /// empty `deps` remove a stale one.
    ///
    /// # Errors
    /// Returns [`PechaError::InvalidName`] when `document` or `name` is not a
    /// single path component and [`PechaError::Io`] when a file cannot be
    /// written.
    pub fn write(
        &self,
        document: &str,
        name: &str,
        edits: &[PatchEdit],
        deps: &[String],
    ) -> Result<(), PechaError> {
        let encoded: Vec<String> = edits.iter().map(encode).collect();
        write_atomic(
            &self.layer_path(document, name, LAYER_EXTENSION)?,
            &encoded.join("\n"),
        )?;

        let deps_path = self.layer_path(document, name, DEPS_EXTENSION)?;
        if deps.is_empty() {
            if deps_path.exists() {
                fs::remove_file(&deps_path).map_err(|err| PechaError::io(&deps_path, err))?;
            }
        } else {
            write_atomic(&deps_path, &deps.join("\n"))?;
        }

        tracing::debug!(
            document,
            layer = name,
            edits = edits.len(),
            "Wrote layer"
        );
        Ok(())
    }

    /// Read the persisted form of one layer.
    ///
    /// # Errors
    /// Returns [`PechaError::LayerNotFound`] when no `.layer` file exists.
    pub fn read(&self, document: &str, name: &str) -> Result<StoredLayer, PechaError> {
        let layer_path = self.layer_path(document, name, LAYER_EXTENSION)?;
        if !layer_path.is_file() {
            return Err(PechaError::LayerNotFound {
                document: document.to_string(),
                layer: name.to_string(),
            });
        }
        let deps_path = self.layer_path(document, name, DEPS_EXTENSION)?;
        let deps = if deps_path.is_file() {
            Some(read_text(&deps_path)?)
        } else {
            None
        };
        Ok(StoredLayer {
            edits: read_text(&layer_path)?,
            deps,
        })
    }

    /// Sorted names of the layers stored for `document`.
    ///
    /// # Errors
    /// Returns [`PechaError::InvalidName`] for a document name that is not a
    /// single path component, and [`PechaError::MissingLayerDir`] when the
    /// document has no layer directory.
    pub fn list(&self, document: &str) -> Result<Vec<String>, PechaError> {
        check_name(document)?;
        let dir = self.document_dir(document);
        if !dir.is_dir() {
            return Err(PechaError::MissingLayerDir(document.to_string()));
        }
        let entries = fs::read_dir(&dir).map_err(|err| PechaError::io(&dir, err))?;

        let mut names = Vec::new();
        for entry in entries {
            let path = entry.map_err(|err| PechaError::io(&dir, err))?.path();
            let is_layer = path
                .extension()
                .map(|ext| ext == LAYER_EXTENSION)
                .unwrap_or(false);
            if !is_layer || !path.is_file() {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Read every layer of `document`.
    ///
    /// # Errors
    /// Propagates [`LayerStore::list`] and [`LayerStore::read`] failures.
    pub fn load_all(&self, document: &str) -> Result<BTreeMap<String, StoredLayer>, PechaError> {
        self.list(document)?
            .into_iter()
            .map(|name| {
                let layer = self.read(document, &name)?;
                Ok((name, layer))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{filter, Category};
    use crate::markup::normalize;
    use crate::patch::{PatchEngine, TextPatcher};
    use tempfile::TempDir;

    fn setup_store() -> (LayerStore, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir");
        let store = LayerStore::new(temp_dir.path().join("layers"));
        store.create_document("doc").expect("create document");
        (store, temp_dir)
    }

    #[test]
    fn written_layer_reads_back_byte_exact() {
        let (store, _temp) = setup_store();
        let base = "The cat sat.\nThe dog ran.";
        let raw = TextPatcher::new().make(base, "The {+added }cat sat.\nThe dog {-quickly }ran.");
        let edits = normalize(filter(raw, Category::Brace).edits).expect("normalize");
        assert_eq!(edits.len(), 2);

        store.write("doc", "italics", &edits, &[]).expect("write");
        let stored = store.read("doc", "italics").expect("read");
        assert_eq!(stored.parse().expect("parse"), edits);
        assert_eq!(stored.edits.lines().count(), 2);
        assert!(stored.deps.is_none());
    }

    #[test]
    fn deps_are_written_and_cleared() {
        let (store, _temp) = setup_store();
        let deps = vec!["title1".to_string(), "quotes".to_string()];
        store.write("doc", "notes", &[], &deps).expect("write");
        let stored = store.read("doc", "notes").expect("read");
        assert_eq!(stored.dependencies(), vec!["title1", "quotes"]);
        assert_eq!(stored.edits, "");

        store.write("doc", "notes", &[], &[]).expect("rewrite");
        assert!(store.read("doc", "notes").expect("read").deps.is_none());
    }

    #[test]
    fn list_returns_sorted_layer_names_only() {
        let (store, _temp) = setup_store();
        store.write("doc", "tsawa", &[], &[]).expect("write");
        store
            .write("doc", "quotes", &[], &["tsawa".to_string()])
            .expect("write");
        assert_eq!(store.list("doc").expect("list"), vec!["quotes", "tsawa"]);
        assert_eq!(store.load_all("doc").expect("load").len(), 2);
    }

    #[test]
    fn reading_missing_layer_or_document_fails() {
        let (store, _temp) = setup_store();
        assert!(matches!(
            store.read("doc", "absent"),
            Err(PechaError::LayerNotFound { .. })
        ));
        assert!(matches!(
            store.list("other"),
            Err(PechaError::MissingLayerDir(_))
        ));
    }

    #[test]
    fn names_outside_the_document_directory_are_rejected() {
        let (store, temp) = setup_store();
        for name in ["../escape", "nested/layer", "..", "", "win\\dows"] {
            assert!(
                matches!(
                    store.write("doc", name, &[], &[]),
                    Err(PechaError::InvalidName(_))
                ),
                "name: {:?}",
                name
            );
        }
        assert!(matches!(
            store.read("../doc", "layer"),
            Err(PechaError::InvalidName(_))
        ));
        assert!(matches!(
            store.create_document("a/b"),
            Err(PechaError::InvalidName(_))
        ));
        assert!(matches!(
            store.list(".."),
            Err(PechaError::InvalidName(_))
        ));
        assert!(!temp.path().join("layers").join("escape.layer").exists());
    }

    #[test]
    fn bom_prefixed_layer_file_is_accepted() {
        let (store, _temp) = setup_store();
        let edits = TextPatcher::new().make("abc def ghi", "abc DEF ghi");
        let body: Vec<String> = edits.iter().map(encode).collect();
        fs::write(
            store.document_dir("doc").join("upper.layer"),
            format!("\u{feff}{}", body.join("\n")),
        )
        .expect("write");
        assert_eq!(store.read("doc", "upper").expect("read").parse().expect("parse"), edits);
    }
}
