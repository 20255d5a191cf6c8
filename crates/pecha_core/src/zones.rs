//! Before/marker/after splitting of a diff sequence.
//!
//! Markup normalization and footnote extraction both isolate one bracketed run
//! of diffs inside an edit; they differ only in what opens and closes the run.

use crate::patch::Diff;

/// Result of splitting a diff sequence around its marker run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Zones {
    /// No diff opened a marker run.
    Unmarked(Vec<Diff>),
    Marked {
        before: Vec<Diff>,
        marker: Vec<Diff>,
        after: Vec<Diff>,
    },
}

impl Zones {
    /// Concatenate the zones back into one sequence.
    pub fn into_diffs(self) -> Vec<Diff> {
        match self {
            Self::Unmarked(diffs) => diffs,
            Self::Marked {
                mut before,
                marker,
                after,
            } => {
                before.extend(marker);
                before.extend(after);
                before
            }
        }
    }
}

/// Split `diffs` into before/marker/after zones.
///
/// The first diff satisfying `opens` starts the marker zone (inclusive). While
/// in the marker zone, the first diff for which `closes(diff, next)` holds is
/// the last marker diff; everything after it lands in the after zone. A diff
/// may both open and close the zone.
pub fn split_zones<O, C>(diffs: Vec<Diff>, opens: O, closes: C) -> Zones
where
    O: Fn(&Diff) -> bool,
    C: Fn(&Diff, Option<&Diff>) -> bool,
{
    #[derive(PartialEq)]
    enum State {
        Before,
        Marker,
        After,
    }

    let mut state = State::Before;
    let mut before = Vec::new();
    let mut marker = Vec::new();
    let mut after = Vec::new();

    let mut iter = diffs.into_iter().peekable();
    while let Some(diff) = iter.next() {
        if state == State::Before && opens(&diff) {
            state = State::Marker;
        }
        match state {
            State::Before => before.push(diff),
            State::After => after.push(diff),
            State::Marker => {
                let closing = closes(&diff, iter.peek());
                marker.push(diff);
                if closing {
                    state = State::After;
                }
            }
        }
    }

    if marker.is_empty() {
        Zones::Unmarked(before)
    } else {
        Zones::Marked {
            before,
            marker,
            after,
        }
    }
}

/// Zones delimited by inline `{` … `}` markup.
pub fn split_markup(diffs: Vec<Diff>) -> Zones {
    split_zones(
        diffs,
        |diff| diff.text.contains('{'),
        |diff, _| diff.text.contains('}'),
    )
}

/// Zones around the first run of non-EQUAL diffs.
pub fn split_changes(diffs: Vec<Diff>) -> Zones {
    split_zones(
        diffs,
        |diff| !diff.is_equal(),
        |_, next| next.map_or(true, Diff::is_equal),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markup_zone_spans_open_to_close() {
        let diffs = vec![
            Diff::equal("fix "),
            Diff::insert("{~"),
            Diff::equal("teh"),
            Diff::insert(">the}"),
            Diff::equal(" cat"),
        ];
        let zones = split_markup(diffs.clone());
        assert_eq!(
            zones,
            Zones::Marked {
                before: vec![Diff::equal("fix ")],
                marker: vec![Diff::insert("{~"), Diff::equal("teh"), Diff::insert(">the}")],
                after: vec![Diff::equal(" cat")],
            }
        );
        assert_eq!(zones.into_diffs(), diffs);
    }

    #[test]
    fn single_diff_can_open_and_close() {
        let zones = split_markup(vec![
            Diff::equal("a"),
            Diff::insert("{+b}"),
            Diff::equal("{c}"),
        ]);
        match zones {
            Zones::Marked { marker, after, .. } => {
                assert_eq!(marker, vec![Diff::insert("{+b}")]);
                assert_eq!(after, vec![Diff::equal("{c}")]);
            }
            other => panic!("expected marked zones, got {:?}", other),
        }
    }

    #[test]
    fn no_opening_leaves_sequence_unmarked() {
        let diffs = vec![Diff::equal("a"), Diff::insert("b")];
        assert_eq!(split_markup(diffs.clone()), Zones::Unmarked(diffs));
    }

    #[test]
    fn change_zone_stops_before_next_equal() {
        let zones = split_changes(vec![
            Diff::equal("x "),
            Diff::delete("teh"),
            Diff::insert("the"),
            Diff::equal(" y"),
        ]);
        assert_eq!(
            zones,
            Zones::Marked {
                before: vec![Diff::equal("x ")],
                marker: vec![Diff::delete("teh"), Diff::insert("the")],
                after: vec![Diff::equal(" y")],
            }
        );
    }

    #[test]
    fn change_zone_runs_to_end_without_trailing_context() {
        let zones = split_changes(vec![Diff::equal("x"), Diff::insert("y")]);
        assert_eq!(
            zones,
            Zones::Marked {
                before: vec![Diff::equal("x")],
                marker: vec![Diff::insert("y")],
                after: vec![],
            }
        );
    }
}
