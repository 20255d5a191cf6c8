//! In-memory state of one document: base text and its persisted layers.

use crate::store::StoredLayer;
use std::collections::BTreeMap;

/// Named access to the stored layers of one document.
pub trait LayerSource {
    /// Document name used in error and log context.
    fn document_name(&self) -> &str;

    /// Stored form of layer `name`, if present.
    fn layer(&self, name: &str) -> Option<&StoredLayer>;
}

/// A loaded document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub name: String,
    pub base: String,
    pub layers: BTreeMap<String, StoredLayer>,
}

impl Document {
    pub fn new(name: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: base.into(),
            layers: BTreeMap::new(),
        }
    }

    /// Add or replace a layer's stored form.
    pub fn with_layer(mut self, name: impl Into<String>, layer: StoredLayer) -> Self {
        self.layers.insert(name.into(), layer);
        self
    }

    /// Names of the loaded layers, sorted.
    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(String::as_str)
    }
}

impl LayerSource for Document {
    fn document_name(&self) -> &str {
        &self.name
    }

    fn layer(&self, name: &str) -> Option<&StoredLayer> {
        self.layers.get(name)
    }
}
