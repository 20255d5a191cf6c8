//! Rewriting of inline `{+…}`, `{-…}` and `{~old>new}` markup into plain diffs.

use crate::error::PechaError;
use crate::patch::{Diff, PatchEdit};
use crate::zones::{split_markup, Zones};

const MARKUP_CHARS: [char; 5] = ['{', '}', '~', '+', '-'];

/// Intent carried by the character right after `{`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Insert,
    Delete,
    Replace,
}

impl Intent {
    fn from_marker(marker: char) -> Option<Self> {
        match marker {
            '+' => Some(Self::Insert),
            '-' => Some(Self::Delete),
            '~' => Some(Self::Replace),
            _ => None,
        }
    }
}

/// Replace the markup run of every edit with the diffs it describes.
///
/// Edits without markup pass through untouched and no edit changes position.
///
/// # Errors
/// Returns [`PechaError::UnknownOperator`] for an intent marker other than
/// `+`, `-` or `~`, and [`PechaError::Shape`] when a replacement lacks its
/// `>` separator. Both carry the 1-based ordinal of the edit.
pub fn normalize(edits: Vec<PatchEdit>) -> Result<Vec<PatchEdit>, PechaError> {
    edits
        .into_iter()
        .enumerate()
        .map(|(index, edit)| normalize_edit(edit, index + 1))
        .collect()
}

fn normalize_edit(mut edit: PatchEdit, ordinal: usize) -> Result<PatchEdit, PechaError> {
    match split_markup(std::mem::take(&mut edit.diffs)) {
        Zones::Unmarked(diffs) => edit.diffs = diffs,
        Zones::Marked {
            mut before,
            marker,
            after,
        } => {
            before.extend(interpret(&marker, ordinal)?);
            before.extend(after);
            edit.diffs = before;
            edit.recompute_lengths();
        }
    }
    Ok(edit)
}

fn interpret(marker: &[Diff], ordinal: usize) -> Result<Vec<Diff>, PechaError> {
    let raw: String = marker.iter().map(|diff| diff.text.as_str()).collect();
    let shape = |reason: &str| PechaError::Shape {
        ordinal,
        reason: format!("{} in markup {:?}", reason, raw),
    };

    let marker_char = raw
        .chars()
        .nth(1)
        .ok_or_else(|| shape("missing intent marker"))?;
    let intent = Intent::from_marker(marker_char).ok_or(PechaError::UnknownOperator {
        ordinal,
        marker: marker_char,
    })?;

    // The intent marker sits right after the opening `{`, at position 1.
    let body: String = raw
        .chars()
        .enumerate()
        .filter(|(index, c)| *index != 1 && !MARKUP_CHARS.contains(c))
        .map(|(_, c)| c)
        .collect();

    match intent {
        Intent::Insert => Ok(vec![Diff::insert(body)]),
        Intent::Delete => Ok(vec![Diff::delete(body)]),
        Intent::Replace => {
            let (old, new) = body
                .split_once('>')
                .ok_or_else(|| shape("missing '>' separator"))?;
            Ok(vec![Diff::delete(old), Diff::insert(new)])
        }
    }
}
