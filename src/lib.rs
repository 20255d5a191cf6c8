//! Root crate facade for the `pecha` command-line tool.

/// Per-document writer lock held while layers are written.
pub mod lock;

pub use pecha_core::{
    bootstrap, config, constants, document, error, filter, markup, patch, session, store, view,
    zones, Category, Config, Document, FailureLedger, LayerStore, PechaError, Session, View,
    ViewKind,
};
