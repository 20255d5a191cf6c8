//! Document processing session: bootstrapping, layer creation and view output.

use crate::bootstrap::split_markup;
use crate::config::Config;
use crate::constants::TEXT_EXTENSION;
use crate::document::Document;
use crate::error::PechaError;
use crate::filter::{filter, Category, ExtractionLoss};
use crate::fs_util::{read_text, write_atomic};
use crate::markup::normalize;
use crate::patch::{ApplyMode, PatchEngine, TextPatcher};
use crate::store::LayerStore;
use crate::view::{View, ViewComposer};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

/// Purpose of a rendered view; selects the relocation tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Export,
    Edit,
}

impl ViewKind {
    pub fn apply_mode(self) -> ApplyMode {
        match self {
            Self::Export => ApplyMode::Export,
            Self::Edit => ApplyMode::Edit,
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Export => "export",
            Self::Edit => "edit",
        })
    }
}

impl FromStr for ViewKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "export" => Ok(Self::Export),
            "edit" => Ok(Self::Edit),
            other => Err(format!("unknown view kind '{}' (expected export or edit)", other)),
        }
    }
}

/// Outcome of writing one layer.
#[derive(Debug, Clone, Default)]
pub struct LayerReport {
    /// Edits persisted for the layer.
    pub edits: usize,
    /// Matched diffs dropped because nothing could be extracted from them.
    pub losses: Vec<ExtractionLoss>,
}

/// Files produced by [`Session::write_view`].
#[derive(Debug, Clone)]
pub struct ViewFiles {
    pub view: PathBuf,
    pub mistakes: Option<PathBuf>,
    pub failures: usize,
}

/// One document-processing session over an explicit [`Config`].
#[derive(Debug)]
pub struct Session<E = TextPatcher> {
    config: Config,
    store: LayerStore,
    composer: ViewComposer<E>,
}

impl Session<TextPatcher> {
    /// Create a session with the built-in patch engine.
    ///
    /// # Errors
    /// Returns [`PechaError::Io`] when the directory scaffolding cannot be created.
    pub fn new(config: Config) -> Result<Self, PechaError> {
        Self::with_engine(config, TextPatcher::new())
    }
}

impl<E: PatchEngine> Session<E> {
    /// Create a session using `engine` for diffing and applying.
    ///
    /// # Errors
    /// Returns [`PechaError::Io`] when the directory scaffolding cannot be created.
    pub fn with_engine(config: Config, engine: E) -> Result<Self, PechaError> {
        config.ensure_dirs()?;
        Ok(Self {
            store: LayerStore::new(&config.layers_dir),
            composer: ViewComposer::new(engine),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &LayerStore {
        &self.store
    }

    fn base_path(&self, name: &str) -> PathBuf {
        self.config
            .bases_dir
            .join(format!("{}.{}", name, TEXT_EXTENSION))
    }

    /// Load a document's base text and every stored layer.
    ///
    /// # Errors
    /// Returns [`PechaError::MissingBase`] or [`PechaError::MissingLayerDir`]
    /// when the document is incomplete, and I/O errors from reading.
    pub fn open(&self, name: &str) -> Result<Document, PechaError> {
        let base_path = self.base_path(name);
        if !base_path.is_file() {
            return Err(PechaError::MissingBase(name.to_string()));
        }
        if !self.store.has_document(name) {
            return Err(PechaError::MissingLayerDir(name.to_string()));
        }
        Ok(Document {
            name: name.to_string(),
            base: read_text(&base_path)?,
            layers: self.store.load_all(name)?,
        })
    }

    /// Bootstrap a document from an annotated `.txt` file in the input directory.
    ///
    /// Writes the base text, creates the layer directory and stores one layer
    /// per annotation kind.
    ///
    /// # Errors
    /// Returns [`PechaError::MissingInput`] when the file is absent or not a
    /// `.txt` file, [`PechaError::Markup`] for malformed tags, and storage errors.
    pub fn create_document(&self, input_file: &str) -> Result<Document, PechaError> {
        let input = self.config.input_dir.join(input_file);
        let is_text = input
            .extension()
            .map(|ext| ext == TEXT_EXTENSION)
            .unwrap_or(false);
        if !is_text || !input.is_file() {
            return Err(PechaError::MissingInput(input));
        }
        let name = input
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| PechaError::MissingInput(input.clone()))?
            .to_string();

        let split = split_markup(&read_text(&input)?)?;
        write_atomic(&self.base_path(&name), &split.base)?;
        self.store.create_document(&name)?;
        tracing::info!(document = %name, "Created document from {}", input.display());

        let mut document = self.open(&name)?;
        for (kind, annotated) in split.annotations.iter() {
            self.create_layer(&mut document, annotated, kind.name(), &[], false)?;
        }
        Ok(document)
    }

    /// Diff `modified` against the document's base and store the result as
    /// layer `name`.
    ///
    /// With `clean`, the raw edits are reduced to inline `{…}` markup and the
    /// markup is rewritten into plain edits; otherwise they are stored as-is.
    ///
    /// # Errors
    /// Returns a [`PechaError::InLayer`] for malformed markup and storage errors.
    pub fn create_layer(
        &self,
        document: &mut Document,
        modified: &str,
        name: &str,
        deps: &[String],
        clean: bool,
    ) -> Result<LayerReport, PechaError> {
        let raw = self.composer.engine().make(&document.base, modified);
        let (edits, losses) = if clean {
            let report = filter(raw, Category::Brace);
            let edits =
                normalize(report.edits).map_err(|err| err.in_layer(&document.name, name))?;
            (edits, report.losses)
        } else {
            (raw, Vec::new())
        };

        self.store.write(&document.name, name, &edits, deps)?;
        document
            .layers
            .insert(name.to_string(), self.store.read(&document.name, name)?);

        if !losses.is_empty() {
            tracing::warn!(
                document = %document.name,
                layer = name,
                lost = losses.len(),
                "Layer written with dropped annotations"
            );
        }
        Ok(LayerReport {
            edits: edits.len(),
            losses,
        })
    }

    /// Compose `layers` over the document's base text.
    ///
    /// # Errors
    /// See [`ViewComposer::compose`].
    pub fn render<N: AsRef<str>>(
        &self,
        document: &Document,
        layers: &[N],
        kind: ViewKind,
    ) -> Result<View, PechaError> {
        self.composer.compose(
            &document.base,
            document,
            layers,
            kind.apply_mode(),
            self.config.footnote_layer.as_deref(),
        )
    }

    /// Render `layers` and write `<doc>_export_<l1>+<l2>….txt` to the output
    /// directory, plus `…_mistakes.txt` when edits failed to apply.
    ///
    /// # Errors
    /// Rendering errors from [`Session::render`] and I/O errors from writing.
    pub fn write_view<N: AsRef<str>>(
        &self,
        document: &Document,
        layers: &[N],
        kind: ViewKind,
    ) -> Result<ViewFiles, PechaError> {
        let view = self.render(document, layers, kind)?;
        let joined: Vec<&str> = layers.iter().map(AsRef::as_ref).collect();
        let stem = format!("{}_export_{}", document.name, joined.join("+"));

        let view_path = self
            .config
            .output_dir
            .join(format!("{}.{}", stem, TEXT_EXTENSION));
        write_atomic(&view_path, &view.text)?;

        let mistakes_path = self
            .config
            .output_dir
            .join(format!("{}_mistakes.{}", stem, TEXT_EXTENSION));
        let mistakes = if view.ledger.is_empty() {
            if mistakes_path.exists() {
                fs::remove_file(&mistakes_path)
                    .map_err(|err| PechaError::io(&mistakes_path, err))?;
            }
            None
        } else {
            write_atomic(&mistakes_path, &view.ledger.to_pretty_json()?)?;
            Some(mistakes_path)
        };

        tracing::info!(
            document = %document.name,
            kind = %kind,
            failures = view.ledger.len(),
            "Wrote view to {}",
            view_path.display()
        );
        Ok(ViewFiles {
            view: view_path,
            mistakes,
            failures: view.ledger.len(),
        })
    }
}
