//! Separation of an annotated source document into base text and per-kind layers.
//!
//! Tags look like `{++**++}`: two intent characters, a payload naming the
//! annotation, two intent characters. The base text is the document with every
//! tag removed; each annotation kind gets a copy of the base with only its own
//! tags put back, ready to be diffed into a layer.

use crate::error::PechaError;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

fn tag_regex() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| {
        Regex::new(r"(?s)\{([+\-~]{2}.+?)[+\-~]{2}\}").expect("valid markup tag regex")
    })
}

/// Closed set of annotation kinds recognised in source markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnnotationKind {
    Title1,
    Title2,
    Sapche,
    Tsawa,
    Quotes,
    Yigchung,
}

impl AnnotationKind {
    /// Every kind, in layer-creation order.
    pub const ALL: [AnnotationKind; 6] = [
        Self::Title1,
        Self::Title2,
        Self::Sapche,
        Self::Tsawa,
        Self::Quotes,
        Self::Yigchung,
    ];

    /// Layer name used for this kind.
    pub fn name(self) -> &'static str {
        match self {
            Self::Title1 => "title1",
            Self::Title2 => "title2",
            Self::Sapche => "sapche",
            Self::Tsawa => "tsawa",
            Self::Quotes => "quotes",
            Self::Yigchung => "yigchung",
        }
    }

    /// Kind named by a tag payload, if any.
    pub fn from_payload(payload: &str) -> Option<Self> {
        match payload {
            "*" => Some(Self::Yigchung),
            "**" => Some(Self::Tsawa),
            "~~" => Some(Self::Quotes),
            "###" => Some(Self::Sapche),
            "##" => Some(Self::Title2),
            "#" => Some(Self::Title1),
            other if other.starts_with('=') => Some(Self::Title1),
            _ => None,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-kind annotated text, indexed by [`AnnotationKind`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotations {
    texts: [String; 6],
}

impl Annotations {
    fn push_all(&mut self, text: &str) {
        for annotated in &mut self.texts {
            annotated.push_str(text);
        }
    }

    fn push(&mut self, kind: AnnotationKind, text: &str) {
        self.texts[kind.index()].push_str(text);
    }

    /// Annotated text for one kind.
    pub fn get(&self, kind: AnnotationKind) -> &str {
        &self.texts[kind.index()]
    }

    /// `(kind, annotated text)` pairs in [`AnnotationKind::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (AnnotationKind, &str)> + '_ {
        AnnotationKind::ALL
            .into_iter()
            .map(move |kind| (kind, self.get(kind)))
    }
}

/// Base text plus one annotated copy per kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupSplit {
    pub base: String,
    pub annotations: Annotations,
}

/// Split tagged `source` into its base text and per-kind annotated texts.
///
/// Tags whose payload names no known kind are dropped with a warning.
///
/// # Errors
/// Returns [`PechaError::Markup`] for a tag that does not open with `++`.
pub fn split_markup(source: &str) -> Result<MarkupSplit, PechaError> {
    let mut base = String::with_capacity(source.len());
    let mut annotations = Annotations::default();
    let mut last = 0;

    for captures in tag_regex().captures_iter(source) {
        let (Some(whole), Some(inner)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let text = &source[last..whole.start()];
        base.push_str(text);
        annotations.push_all(text);
        last = whole.end();

        let Some(payload) = inner.as_str().strip_prefix("++") else {
            return Err(PechaError::Markup(format!(
                "tag {:?} at byte {} must open with '++'",
                whole.as_str(),
                whole.start()
            )));
        };
        match AnnotationKind::from_payload(payload) {
            Some(kind) => annotations.push(kind, payload),
            None => tracing::warn!(
                "Dropping tag {:?} at byte {}: unknown annotation",
                whole.as_str(),
                whole.start()
            ),
        }
    }

    let tail = &source[last..];
    base.push_str(tail);
    annotations.push_all(tail);

    Ok(MarkupSplit { base, annotations })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_removed_from_base_and_routed_by_kind() {
        let source = "{++#++}Title{++#++}\nroot {++**++}verse{++**++} and {++*++}note{++*++}.";
        let split = split_markup(source).expect("split");
        assert_eq!(split.base, "Title\nroot verse and note.");
        assert_eq!(split.annotations.get(AnnotationKind::Title1), "#Title#\nroot verse and note.");
        assert_eq!(split.annotations.get(AnnotationKind::Tsawa), "Title\nroot **verse** and note.");
        assert_eq!(
            split.annotations.get(AnnotationKind::Yigchung),
            "Title\nroot verse and *note*."
        );
        assert_eq!(split.annotations.get(AnnotationKind::Quotes), split.base);
    }

    #[test]
    fn equals_payload_counts_as_title() {
        let split = split_markup("a{++=x++}b").expect("split");
        assert_eq!(split.base, "ab");
        assert_eq!(split.annotations.get(AnnotationKind::Title1), "a=xb");
    }

    #[test]
    fn unknown_payload_is_dropped_everywhere() {
        let split = split_markup("a{++?++}b").expect("split");
        assert_eq!(split.base, "ab");
        assert!(split.annotations.iter().all(|(_, text)| text == "ab"));
    }

    #[test]
    fn non_insert_opener_is_rejected() {
        assert!(matches!(
            split_markup("a{--*--}b"),
            Err(PechaError::Markup(_))
        ));
    }

    #[test]
    fn iteration_follows_kind_order() {
        let split = split_markup("plain").expect("split");
        let kinds: Vec<AnnotationKind> = split.annotations.iter().map(|(kind, _)| kind).collect();
        assert_eq!(kinds, AnnotationKind::ALL.to_vec());
    }
}
