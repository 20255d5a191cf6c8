//! Core library for layered text annotation (patches, markup, layers, views).

/// Splitting annotated source documents into a base text and annotation layers.
pub mod bootstrap;
/// Configuration loading and defaults.
pub mod config;
/// Shared constants.
pub mod constants;
/// Documents and the layer lookup seam used by the composer.
pub mod document;
/// Application error types.
pub mod error;
/// Category-based reduction of raw patch lists.
pub mod filter;
/// Rewriting inline `{…}` markup into plain edits.
pub mod markup;
/// Positional diff/patch primitive.
pub mod patch;
/// Document processing session.
pub mod session;
/// On-disk layer storage.
pub mod store;
/// View composition, footnotes and the failure ledger.
pub mod view;
/// Splitting an edit's diffs into before/marker/after zones.
pub mod zones;

mod fs_util;

pub use config::Config;
pub use document::{Document, LayerSource};
pub use error::PechaError;
pub use filter::{filter, Category, ExtractionLoss, FilterReport};
pub use markup::normalize;
pub use patch::{ApplyMode, Diff, Operation, PatchEdit, PatchEngine, TextPatcher};
pub use session::{LayerReport, Session, ViewFiles, ViewKind};
pub use store::{LayerStore, StoredLayer};
pub use view::{FailureLedger, View, ViewComposer};
