//! Selection of the patch edits that belong to one annotation category.

use crate::error::PechaError;
use crate::patch::{Diff, Operation, PatchEdit};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

fn bracket_regex() -> &'static Regex {
    static BRACKET: OnceLock<Regex> = OnceLock::new();
    BRACKET.get_or_init(|| Regex::new(r"\\\[.*?\\\]").expect("valid bracket regex"))
}

/// Annotation category a raw patch list can be reduced to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Escaped `\[…\]` page markers.
    Bracket,
    /// Inline `{…}` edit markup.
    Brace,
}

impl Category {
    /// Persisted/CLI name of the category.
    pub fn name(self) -> &'static str {
        match self {
            Self::Bracket => "dergepage",
            Self::Brace => "cm",
        }
    }

    fn matches(self, diff: &Diff) -> bool {
        if diff.op != Operation::Insert {
            return false;
        }
        match self {
            Self::Bracket => diff.text.contains('[') && diff.text.contains(']'),
            Self::Brace => diff.text.contains('{') || diff.text.contains('}'),
        }
    }

    fn extract(self, text: &str) -> Option<String> {
        match self {
            Self::Bracket => bracket_regex().find(text).map(|m| m.as_str().to_string()),
            Self::Brace => Some(text.to_string()),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = PechaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "dergepage" | "bracket" => Ok(Self::Bracket),
            "cm" | "brace" => Ok(Self::Brace),
            other => Err(PechaError::UnknownCategory(other.to_string())),
        }
    }
}

/// A diff that matched a category but yielded no extractable text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionLoss {
    /// 1-based position of the edit in the raw list.
    pub edit: usize,
    /// 1-based position of the diff inside that edit.
    pub operation: usize,
    pub text: String,
}

/// Edits kept by [`filter`] plus any content the extractor could not keep.
#[derive(Debug, Clone, Default)]
pub struct FilterReport {
    pub edits: Vec<PatchEdit>,
    pub losses: Vec<ExtractionLoss>,
}

/// Reduce `raw` to the edits relevant to `category`.
///
/// EQUAL diffs are kept as anchors, matching diffs are replaced by an INSERT
/// of their extracted text, other diffs are dropped. Edits left without any
/// extracted diff are discarded.
///
/// # Returns
/// The surviving edits in their original order, with lengths recomputed, and
/// one [`ExtractionLoss`] per matching diff whose extraction came up empty.
pub fn filter(raw: Vec<PatchEdit>, category: Category) -> FilterReport {
    let mut report = FilterReport::default();

    for (edit_index, mut edit) in raw.into_iter().enumerate() {
        let mut keep = false;
        let mut diffs = Vec::with_capacity(edit.diffs.len());

        for (op_index, diff) in std::mem::take(&mut edit.diffs).into_iter().enumerate() {
            if category.matches(&diff) {
                match category.extract(&diff.text).filter(|text| !text.is_empty()) {
                    Some(text) => {
                        diffs.push(Diff::insert(text));
                        keep = true;
                    }
                    None => {
                        tracing::warn!(
                            category = %category,
                            edit = edit_index + 1,
                            operation = op_index + 1,
                            "Dropping matched diff with no extractable text: {:?}",
                            diff.text
                        );
                        report.losses.push(ExtractionLoss {
                            edit: edit_index + 1,
                            operation: op_index + 1,
                            text: diff.text,
                        });
                    }
                }
            } else if diff.is_equal() {
                diffs.push(diff);
            }
        }

        if keep {
            edit.diffs = diffs;
            edit.recompute_lengths();
            report.edits.push(edit);
        }
    }

    report
}
