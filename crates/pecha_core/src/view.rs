//! Composition of an ordered list of layers over a base text.
//!
//! Layers are applied strictly in order, each against the text produced by
//! the previous one. Edits that cannot be relocated are recorded in the
//! [`FailureLedger`] and never stop the render.

use crate::document::LayerSource;
use crate::error::PechaError;
use crate::patch::{ApplyMode, Diff, Operation, PatchEdit, PatchEngine, TextPatcher};
use crate::zones::{split_changes, Zones};
use serde::Serialize;
use std::collections::BTreeMap;

/// Edits that failed to relocate: layer name → 1-based ordinal → rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FailureLedger(BTreeMap<String, BTreeMap<usize, String>>);

impl FailureLedger {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Record a failed edit of `layer`.
    pub fn record(&mut self, layer: &str, ordinal: usize, rendering: String) {
        self.0
            .entry(layer.to_string())
            .or_default()
            .insert(ordinal, rendering);
    }

    /// Failures recorded for `layer`.
    pub fn get(&self, layer: &str) -> Option<&BTreeMap<usize, String>> {
        self.0.get(layer)
    }

    /// Total number of failed edits across all layers.
    pub fn len(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }

    /// Pretty JSON rendering used for the mistakes file.
    ///
    /// # Errors
    /// Returns [`PechaError::Serialization`] if encoding fails.
    pub fn to_pretty_json(&self) -> Result<String, PechaError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Rendered view: final text and the edits that could not be applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct View {
    pub text: String,
    pub ledger: FailureLedger,
}

/// Footnote lines gathered while diverting a layer.
#[derive(Debug, Default)]
struct Footnotes {
    next: usize,
    lines: Vec<String>,
}

impl Footnotes {
    fn push(&mut self, body: &str) -> usize {
        self.next += 1;
        self.lines.push(format!("[^{}]: {}", self.next, body));
        self.next
    }
}

/// Applies layers to base texts through a [`PatchEngine`].
#[derive(Debug, Clone, Default)]
pub struct ViewComposer<E = TextPatcher> {
    engine: E,
}

impl<E: PatchEngine> ViewComposer<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Apply `layers`, in order, to `base`.
    ///
    /// When `divert` names one of the layers, that layer's edits are also
    /// turned into numbered footnotes appended after the text.
    ///
    /// # Arguments
    /// - `base`: Base text; never modified.
    /// - `source`: Where the stored layers are looked up.
    /// - `layers`: Layer names in application order.
    /// - `mode`: Forwarded unchanged to the patch engine.
    /// - `divert`: Layer whose edits become footnotes.
    ///
    /// # Returns
    /// The composed [`View`]. Relocation failures are in its ledger.
    ///
    /// # Errors
    /// Returns [`PechaError::LayerNotFound`] before anything is applied when a
    /// name is unknown, and a [`PechaError::InLayer`] wrapping decode or
    /// footnote shape failures.
    pub fn compose<S, N>(
        &self,
        base: &str,
        source: &S,
        layers: &[N],
        mode: ApplyMode,
        divert: Option<&str>,
    ) -> Result<View, PechaError>
    where
        S: LayerSource + ?Sized,
        N: AsRef<str>,
    {
        let document = source.document_name();
        let mut stored = Vec::with_capacity(layers.len());
        for name in layers {
            let name = name.as_ref();
            let layer = source.layer(name).ok_or_else(|| PechaError::LayerNotFound {
                document: document.to_string(),
                layer: name.to_string(),
            })?;
            stored.push((name, layer));
        }

        let mut current = base.to_string();
        let mut ledger = FailureLedger::default();
        let mut footnotes = Footnotes::default();

        for (name, layer) in stored {
            let mut edits = layer
                .parse()
                .map_err(|err| err.in_layer(document, name))?;
            if divert == Some(name) {
                divert_footnotes(&mut edits, &mut footnotes)
                    .map_err(|err| err.in_layer(document, name))?;
            }

            let (next, flags) = self.engine.apply(&edits, &current, mode);
            current = next;

            let mut failed = 0usize;
            for (index, (edit, applied)) in edits.iter().zip(flags).enumerate() {
                if !applied {
                    failed += 1;
                    ledger.record(name, index + 1, edit.to_string());
                }
            }
            if failed > 0 {
                tracing::warn!(
                    document,
                    layer = name,
                    failed,
                    total = edits.len(),
                    "Some edits could not be relocated"
                );
            } else {
                tracing::debug!(document, layer = name, total = edits.len(), "Applied layer");
            }
        }

        if !footnotes.lines.is_empty() {
            current.push_str("\n\n");
            current.push_str(&footnotes.lines.join("\n"));
        }
        Ok(View {
            text: current,
            ledger,
        })
    }
}

/// Turn each edit into a footnote and put its `[^n]` marker at the edit site.
fn divert_footnotes(edits: &mut [PatchEdit], footnotes: &mut Footnotes) -> Result<(), PechaError> {
    for (index, edit) in edits.iter_mut().enumerate() {
        let (body, at) = footnote_body(&edit.diffs, index + 1)?;
        if body.is_empty() {
            continue;
        }
        let number = footnotes.push(&body);
        edit.diffs.insert(at, Diff::insert(format!("[^{}]", number)));
        edit.recompute_lengths();
    }
    Ok(())
}

/// Footnote text of one edit and the index right after its change run.
///
/// A diverted edit holds 3 or 4 diffs: one leading context EQUAL, the change
/// run, and at most one trailing context EQUAL.
fn footnote_body(diffs: &[Diff], ordinal: usize) -> Result<(String, usize), PechaError> {
    let shape = |reason: String| PechaError::Shape { ordinal, reason };

    if !(3..=4).contains(&diffs.len()) {
        return Err(shape(format!(
            "expected 3 or 4 diffs in a footnote edit, found {}",
            diffs.len()
        )));
    }
    let Zones::Marked {
        before,
        marker,
        after,
    } = split_changes(diffs.to_vec())
    else {
        return Err(shape("edit holds no change".to_string()));
    };
    if before.len() != 1 || after.len() > 1 {
        return Err(shape(format!(
            "expected one change wrapped in context, found {} diffs",
            diffs.len()
        )));
    }
    // Changes whose texts are all empty carry nothing to annotate; they get
    // no number and no marker.
    if marker.iter().all(|diff| diff.text.is_empty()) {
        return Ok((String::new(), before.len() + marker.len()));
    }

    let body = match marker.as_slice() {
        [Diff {
            op: Operation::Delete,
            text: old,
        }, Diff {
            op: Operation::Insert,
            text: new,
        }] => format!("{}>>{}", old, new),
        [Diff {
            op: Operation::Insert,
            text,
        }] => format!("+{}", text),
        [Diff {
            op: Operation::Delete,
            text,
        }] => format!("-{}", text),
        other => {
            let ops: Vec<Operation> = other.iter().map(|diff| diff.op).collect();
            return Err(shape(format!("unsupported change pattern {:?}", ops)));
        }
    };
    Ok((body, before.len() + marker.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::patch::encode;
    use crate::store::StoredLayer;

    fn stored(edits: &[PatchEdit]) -> StoredLayer {
        let lines: Vec<String> = edits.iter().map(encode).collect();
        StoredLayer {
            edits: lines.join("\n"),
            deps: None,
        }
    }

    fn edit(diffs: Vec<Diff>, start: usize) -> PatchEdit {
        PatchEdit::new(diffs, start, start)
    }

    fn composer() -> ViewComposer {
        ViewComposer::new(TextPatcher::new())
    }

    #[test]
    fn empty_layer_list_returns_base_unchanged() {
        let doc = Document::new("doc", "The cat sat.");
        let view = composer()
            .compose(&doc.base, &doc, &[] as &[&str], ApplyMode::Export, None)
            .expect("compose");
        assert_eq!(view.text, "The cat sat.");
        assert!(view.ledger.is_empty());
    }

    #[test]
    fn layers_apply_in_order_on_running_text() {
        let added = edit(
            vec![
                Diff::equal("The "),
                Diff::insert("added "),
                Diff::equal("cat sat."),
            ],
            0,
        );
        let bold = edit(
            vec![
                Diff::equal("The "),
                Diff::insert("**"),
                Diff::equal("added cat"),
                Diff::insert("**"),
                Diff::equal(" sat."),
            ],
            0,
        );
        let doc = Document::new("doc", "The cat sat.")
            .with_layer("added", stored(&[added]))
            .with_layer("bold", stored(&[bold]));
        let view = composer()
            .compose(&doc.base, &doc, &["added", "bold"], ApplyMode::Export, None)
            .expect("compose");
        assert_eq!(view.text, "The **added cat** sat.");
        assert!(view.ledger.get("added").is_none());
        assert!(view.ledger.get("bold").is_none());
        assert_eq!(doc.base, "The cat sat.");
    }

    #[test]
    fn unlocatable_edit_is_recorded_and_rest_still_applies() {
        let good = edit(
            vec![Diff::equal("The "), Diff::insert("big "), Diff::equal("cat sat.")],
            0,
        );
        let lost = edit(
            vec![
                Diff::equal("0123"),
                Diff::delete("4567"),
                Diff::equal("89"),
            ],
            20,
        );
        let doc =
            Document::new("doc", "The cat sat.").with_layer("mixed", stored(&[lost.clone(), good]));
        let view = composer()
            .compose(&doc.base, &doc, &["mixed"], ApplyMode::Export, None)
            .expect("compose");
        assert_eq!(view.text, "The big cat sat.");
        let failures = view.ledger.get("mixed").expect("failures for layer");
        assert_eq!(failures.len(), 1);
        assert_eq!(failures.get(&1), Some(&lost.to_string()));
        assert_eq!(view.ledger.len(), 1);
    }

    #[test]
    fn diverted_correction_becomes_footnote() {
        let fix = edit(
            vec![
                Diff::equal("fix "),
                Diff::delete("teh"),
                Diff::insert("the"),
                Diff::equal(" cat"),
            ],
            0,
        );
        let doc = Document::new("doc", "fix teh cat").with_layer("correction", stored(&[fix]));
        let view = composer()
            .compose(
                &doc.base,
                &doc,
                &["correction"],
                ApplyMode::Export,
                Some("correction"),
            )
            .expect("compose");
        assert_eq!(view.text, "fix the[^1] cat\n\n[^1]: teh>>the");
        assert!(view.ledger.is_empty());
    }

    #[test]
    fn footnote_numbers_skip_empty_bodies() {
        let insert = edit(
            vec![Diff::equal("aaaa "), Diff::insert("x"), Diff::equal(" bbbb")],
            0,
        );
        let empty = edit(
            vec![Diff::equal("bbbb "), Diff::insert(""), Diff::equal(" cccc")],
            6,
        );
        let delete = edit(
            vec![Diff::equal("cccc "), Diff::delete("y"), Diff::equal(" dddd")],
            13,
        );
        let mut edits = vec![insert, empty, delete];
        let mut footnotes = Footnotes::default();
        divert_footnotes(&mut edits, &mut footnotes).expect("divert");
        assert_eq!(footnotes.lines, vec!["[^1]: +x", "[^2]: -y"]);
        assert_eq!(edits[0].diffs[2], Diff::insert("[^1]"));
        assert_eq!(edits[1].diffs.len(), 3);
        assert_eq!(edits[2].diffs[2], Diff::insert("[^2]"));
        assert_eq!(edits[2].diffs[3], Diff::equal(" dddd"));
    }

    #[test]
    fn footnote_without_trailing_context_appends_marker() {
        let mut edits = vec![edit(
            vec![Diff::equal("end "), Diff::delete("?"), Diff::insert("!")],
            0,
        )];
        let mut footnotes = Footnotes::default();
        divert_footnotes(&mut edits, &mut footnotes).expect("divert");
        assert_eq!(edits[0].diffs.last(), Some(&Diff::insert("[^1]")));
        assert_eq!(footnotes.lines, vec!["[^1]: ?>>!"]);
    }

    #[test]
    fn footnote_edits_need_three_or_four_diffs_with_leading_context() {
        let bare_insert = edit(vec![Diff::insert("x")], 0);
        let unwrapped_insert = edit(vec![Diff::equal("ab"), Diff::insert("x")], 0);
        let bare_replace = edit(vec![Diff::delete("a"), Diff::insert("b")], 0);
        let no_leading_context = edit(
            vec![Diff::delete("a"), Diff::insert("b"), Diff::equal("b")],
            0,
        );
        for bad in [bare_insert, unwrapped_insert, bare_replace, no_leading_context] {
            let doc = Document::new("doc", "ab").with_layer("correction", stored(&[bad.clone()]));
            let result = composer().compose(
                &doc.base,
                &doc,
                &["correction"],
                ApplyMode::Export,
                Some("correction"),
            );
            assert!(
                matches!(
                    result,
                    Err(PechaError::InLayer { ref source, .. })
                        if matches!(**source, PechaError::Shape { ordinal: 1, .. })
                ),
                "edit {} was accepted: {:?}",
                bad,
                result
            );
        }
    }

    #[test]
    fn footnote_shape_violation_is_fatal_with_layer_context() {
        let two_changes = edit(
            vec![
                Diff::equal("a"),
                Diff::insert("b"),
                Diff::equal("c"),
                Diff::insert("d"),
                Diff::equal("e"),
            ],
            0,
        );
        let doc = Document::new("doc", "ace").with_layer("correction", stored(&[two_changes]));
        let err = composer()
            .compose(&doc.base, &doc, &["correction"], ApplyMode::Edit, Some("correction"))
            .expect_err("shape failure");
        assert_eq!(
            err.to_string(),
            "document 'doc', layer 'correction': malformed edit #1: \
             expected 3 or 4 diffs in a footnote edit, found 5"
        );
    }

    #[test]
    fn unknown_layer_fails_before_composition() {
        let doc = Document::new("doc", "text");
        assert!(matches!(
            composer().compose(&doc.base, &doc, &["missing"], ApplyMode::Export, None),
            Err(PechaError::LayerNotFound { .. })
        ));
    }

    #[test]
    fn ledger_serializes_as_nested_json_object() {
        let mut ledger = FailureLedger::default();
        ledger.record("quotes", 2, "@@ -0,1 +0,2 @@".to_string());
        let json = ledger.to_pretty_json().expect("json");
        let value: serde_json::Value = serde_json::from_str(&json).expect("parse");
        assert_eq!(value["quotes"]["2"], "@@ -0,1 +0,2 @@");
    }
}
