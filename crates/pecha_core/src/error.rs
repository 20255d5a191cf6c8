//! Error types for layer creation, storage and view composition.
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the layered-text core.
#[derive(Error, Debug)]
pub enum PechaError {
    #[error("base text missing for document '{0}'")]
    MissingBase(String),

    #[error("layer directory missing for document '{0}'")]
    MissingLayerDir(String),

    #[error("layer '{layer}' not found for document '{document}'")]
    LayerNotFound { document: String, layer: String },

    #[error("invalid name '{0}': must be a single path component")]
    InvalidName(String),

    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    #[error("unknown patch category '{0}'")]
    UnknownCategory(String),

    #[error("malformed edit #{ordinal}: {reason}")]
    Shape { ordinal: usize, reason: String },

    #[error("unrecognized operator '{marker}' in edit #{ordinal}")]
    UnknownOperator { ordinal: usize, marker: char },

    #[error("cannot decode patch line {line}: {reason}")]
    Decode { line: usize, reason: String },

    #[error("malformed markup: {0}")]
    Markup(String),

    #[error("Locked: {0}")]
    Locked(String),

    #[error("document '{document}', layer '{layer}': {source}")]
    InLayer {
        document: String,
        layer: String,
        #[source]
        source: Box<PechaError>,
    },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PechaError {
    /// Attach the document and layer that were being processed.
    ///
    /// # Returns
    /// The error wrapped in [`PechaError::InLayer`], unless it already carries
    /// layer context.
    pub fn in_layer(self, document: &str, layer: &str) -> Self {
        match self {
            already @ Self::InLayer { .. } => already,
            other => Self::InLayer {
                document: document.to_string(),
                layer: layer.to_string(),
                source: Box::new(other),
            },
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PechaError;

    #[test]
    fn in_layer_reports_document_layer_and_ordinal() {
        let err = PechaError::UnknownOperator {
            ordinal: 3,
            marker: '*',
        }
        .in_layer("TSD-KG-02", "correction");
        assert_eq!(
            err.to_string(),
            "document 'TSD-KG-02', layer 'correction': unrecognized operator '*' in edit #3"
        );
    }

    #[test]
    fn in_layer_does_not_nest_context_twice() {
        let err = PechaError::Shape {
            ordinal: 1,
            reason: "empty".to_string(),
        }
        .in_layer("a", "b")
        .in_layer("c", "d");
        assert!(err.to_string().starts_with("document 'a', layer 'b'"));
    }
}
