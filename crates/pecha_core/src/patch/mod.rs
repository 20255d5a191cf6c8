//! Positional diff/patch primitive: edit types, construction, relocation and text form.
//!
//! Offsets and lengths are counted in Unicode scalar values, not bytes.

mod apply;
mod make;
mod text;

pub use apply::Tolerance;
pub use make::diff_chars;
pub use text::{decode, encode, parse_list};

use std::fmt;

/// Tag of a single diff fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Equal,
    Insert,
    Delete,
}

impl Operation {
    pub(crate) fn sigil(self) -> char {
        match self {
            Self::Equal => '=',
            Self::Insert => '+',
            Self::Delete => '-',
        }
    }

    pub(crate) fn from_sigil(sigil: char) -> Option<Self> {
        match sigil {
            '=' => Some(Self::Equal),
            '+' => Some(Self::Insert),
            '-' => Some(Self::Delete),
            _ => None,
        }
    }
}

/// A tagged text fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diff {
    pub op: Operation,
    pub text: String,
}

impl Diff {
    pub fn new(op: Operation, text: impl Into<String>) -> Self {
        Self {
            op,
            text: text.into(),
        }
    }

    pub fn equal(text: impl Into<String>) -> Self {
        Self::new(Operation::Equal, text)
    }

    pub fn insert(text: impl Into<String>) -> Self {
        Self::new(Operation::Insert, text)
    }

    pub fn delete(text: impl Into<String>) -> Self {
        Self::new(Operation::Delete, text)
    }

    pub fn is_equal(&self) -> bool {
        self.op == Operation::Equal
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// One relocatable unit of change: a diff sequence plus its position in the
/// source (`start1`/`length1`) and target (`start2`/`length2`) texts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchEdit {
    pub diffs: Vec<Diff>,
    pub start1: usize,
    pub start2: usize,
    pub length1: usize,
    pub length2: usize,
}

impl PatchEdit {
    /// Build an edit at the given offsets with lengths derived from `diffs`.
    pub fn new(diffs: Vec<Diff>, start1: usize, start2: usize) -> Self {
        let mut edit = Self {
            diffs,
            start1,
            start2,
            length1: 0,
            length2: 0,
        };
        edit.recompute_lengths();
        edit
    }

    /// Text the edit expects to find (EQUAL and DELETE fragments).
    pub fn source_text(&self) -> String {
        self.diffs
            .iter()
            .filter(|diff| diff.op != Operation::Insert)
            .map(|diff| diff.text.as_str())
            .collect()
    }

    /// Text the edit leaves behind (EQUAL and INSERT fragments).
    pub fn target_text(&self) -> String {
        self.diffs
            .iter()
            .filter(|diff| diff.op != Operation::Delete)
            .map(|diff| diff.text.as_str())
            .collect()
    }

    /// Re-derive `length1`/`length2` after the diff list was rewritten.
    pub fn recompute_lengths(&mut self) {
        self.length1 = self.source_text().chars().count();
        self.length2 = self.target_text().chars().count();
    }

    /// `true` when at least one fragment is not an EQUAL anchor.
    pub fn has_changes(&self) -> bool {
        self.diffs.iter().any(|diff| !diff.is_equal())
    }
}

impl fmt::Display for PatchEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "@@ -{},{} +{},{} @@",
            self.start1, self.length1, self.start2, self.length2
        )?;
        for diff in &self.diffs {
            write!(f, " {}{:?}", diff.op.sigil(), diff.text)?;
        }
        Ok(())
    }
}

/// Relocation tolerance requested from the patch engine.
///
/// The composer forwards this untouched; only the engine interprets it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApplyMode {
    #[default]
    Export,
    Edit,
}

/// Diff/patch collaborator used for layer creation and view composition.
pub trait PatchEngine {
    /// Produce a patch list transforming `original` into `modified`.
    fn make(&self, original: &str, modified: &str) -> Vec<PatchEdit>;

    /// Apply `edits` to `text`, returning the new text and one success flag
    /// per edit in input order. Unlocatable edits are reported, never raised.
    fn apply(&self, edits: &[PatchEdit], text: &str, mode: ApplyMode) -> (String, Vec<bool>);
}

/// Context-anchored patch engine with bitap relocation.
#[derive(Debug, Clone)]
pub struct TextPatcher {
    margin: usize,
}

impl Default for TextPatcher {
    fn default() -> Self {
        Self {
            margin: crate::constants::PATCH_MARGIN,
        }
    }
}

impl TextPatcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PatchEngine for TextPatcher {
    fn make(&self, original: &str, modified: &str) -> Vec<PatchEdit> {
        let mut diffs = diff_chars(original, modified);
        if diffs.len() > 2 {
            make::cleanup_semantic(&mut diffs);
        }
        make::make_patches(original, &diffs, self.margin)
    }

    fn apply(&self, edits: &[PatchEdit], text: &str, mode: ApplyMode) -> (String, Vec<bool>) {
        apply::apply_patches(edits, text, Tolerance::for_mode(mode))
    }
}
