//! Patch construction from a character diff.

use super::{Diff, Operation, PatchEdit};
use crate::constants::MATCH_MAX_BITS;
use similar::{Algorithm, ChangeTag, TextDiff};

/// Compute a character-level diff, merging adjacent fragments with the same tag.
///
/// # Returns
/// Diff fragments whose EQUAL/DELETE text concatenates to `original` and whose
/// EQUAL/INSERT text concatenates to `modified`.
pub fn diff_chars(original: &str, modified: &str) -> Vec<Diff> {
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_chars(original, modified);

    let mut diffs: Vec<Diff> = Vec::new();
    for change in diff.iter_all_changes() {
        let op = match change.tag() {
            ChangeTag::Equal => Operation::Equal,
            ChangeTag::Insert => Operation::Insert,
            ChangeTag::Delete => Operation::Delete,
        };
        match diffs.last_mut() {
            Some(last) if last.op == op => last.text.push_str(change.value()),
            _ => diffs.push(Diff::new(op, change.value())),
        }
    }
    diffs
}

/// Fold short equalities that sit between larger edits into those edits.
///
/// An equality no longer than the edits on both of its sides becomes a
/// delete/insert pair; the result is then merged so each edit run is one
/// DELETE followed by one INSERT.
pub(crate) fn cleanup_semantic(diffs: &mut Vec<Diff>) {
    let mut changed = false;
    let mut equalities: Vec<usize> = Vec::new();
    let mut last_equality: Option<usize> = None;
    let mut pointer: isize = 0;
    let (mut inserted1, mut deleted1, mut inserted2, mut deleted2) = (0, 0, 0, 0);

    while (pointer as usize) < diffs.len() {
        let at = pointer as usize;
        if diffs[at].is_equal() {
            equalities.push(at);
            inserted1 = std::mem::take(&mut inserted2);
            deleted1 = std::mem::take(&mut deleted2);
            last_equality = Some(diffs[at].char_len());
        } else {
            if diffs[at].op == Operation::Insert {
                inserted2 += diffs[at].char_len();
            } else {
                deleted2 += diffs[at].char_len();
            }
            let foldable = matches!(last_equality, Some(len)
                if len > 0 && len <= inserted1.max(deleted1) && len <= inserted2.max(deleted2));
            if let (true, Some(&equality)) = (foldable, equalities.last()) {
                let text = diffs[equality].text.clone();
                diffs.insert(equality, Diff::delete(text));
                diffs[equality + 1].op = Operation::Insert;
                equalities.pop();
                equalities.pop();
                pointer = equalities.last().map_or(-1, |&index| index as isize);
                (inserted1, deleted1, inserted2, deleted2) = (0, 0, 0, 0);
                last_equality = None;
                changed = true;
            }
        }
        pointer += 1;
    }

    if changed {
        cleanup_merge(diffs);
    }
}

fn cleanup_merge(diffs: &mut Vec<Diff>) {
    let mut merged: Vec<Diff> = Vec::with_capacity(diffs.len());
    let mut deleted = String::new();
    let mut inserted = String::new();

    for diff in diffs.drain(..).chain(std::iter::once(Diff::equal(""))) {
        match diff.op {
            Operation::Insert => inserted.push_str(&diff.text),
            Operation::Delete => deleted.push_str(&diff.text),
            Operation::Equal => {
                let mut equal = diff.text;
                if !deleted.is_empty() && !inserted.is_empty() {
                    let prefix = common_prefix(&deleted, &inserted);
                    push_equal(&mut merged, &deleted[..prefix]);
                    deleted.drain(..prefix);
                    inserted.drain(..prefix);

                    let suffix = common_suffix(&deleted, &inserted);
                    equal.insert_str(0, &inserted[inserted.len() - suffix..]);
                    deleted.truncate(deleted.len() - suffix);
                    inserted.truncate(inserted.len() - suffix);
                }
                if !deleted.is_empty() {
                    merged.push(Diff::delete(std::mem::take(&mut deleted)));
                }
                if !inserted.is_empty() {
                    merged.push(Diff::insert(std::mem::take(&mut inserted)));
                }
                push_equal(&mut merged, &equal);
            }
        }
    }
    *diffs = merged;
}

fn push_equal(diffs: &mut Vec<Diff>, text: &str) {
    if text.is_empty() {
        return;
    }
    match diffs.last_mut() {
        Some(last) if last.is_equal() => last.text.push_str(text),
        _ => diffs.push(Diff::equal(text)),
    }
}

/// Byte length of the common prefix, on a char boundary.
fn common_prefix(a: &str, b: &str) -> usize {
    a.chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| x.len_utf8())
        .sum()
}

/// Byte length of the common suffix, on a char boundary.
fn common_suffix(a: &str, b: &str) -> usize {
    a.chars()
        .rev()
        .zip(b.chars().rev())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| x.len_utf8())
        .sum()
}

/// Group `diffs` into context-anchored patch edits.
///
/// Equal runs of at least `2 * margin` characters split edits; each edit is
/// then padded with enough surrounding text to make its anchor unique.
pub(crate) fn make_patches(original: &str, diffs: &[Diff], margin: usize) -> Vec<PatchEdit> {
    let mut patches = Vec::new();
    if diffs.iter().all(Diff::is_equal) {
        return patches;
    }

    let mut patch = PatchEdit::default();
    let mut count1 = 0usize;
    let mut count2 = 0usize;
    let mut prepatch: Vec<char> = original.chars().collect();
    let mut postpatch = prepatch.clone();

    for (index, diff) in diffs.iter().enumerate() {
        let len = diff.char_len();
        if patch.diffs.is_empty() && diff.op != Operation::Equal {
            patch.start1 = count1;
            patch.start2 = count2;
        }

        match diff.op {
            Operation::Insert => {
                patch.diffs.push(diff.clone());
                patch.length2 += len;
                postpatch.splice(count2..count2, diff.text.chars());
            }
            Operation::Delete => {
                patch.diffs.push(diff.clone());
                patch.length1 += len;
                postpatch.drain(count2..count2 + len);
            }
            Operation::Equal => {
                if len <= 2 * margin && !patch.diffs.is_empty() && index + 1 != diffs.len() {
                    patch.diffs.push(diff.clone());
                    patch.length1 += len;
                    patch.length2 += len;
                }
                if len >= 2 * margin && !patch.diffs.is_empty() {
                    add_context(&mut patch, &prepatch, margin);
                    patches.push(std::mem::take(&mut patch));
                    prepatch = postpatch.clone();
                    count1 = count2;
                }
            }
        }

        if diff.op != Operation::Insert {
            count1 += len;
        }
        if diff.op != Operation::Delete {
            count2 += len;
        }
    }

    if !patch.diffs.is_empty() {
        add_context(&mut patch, &prepatch, margin);
        patches.push(patch);
    }
    patches
}

fn add_context(patch: &mut PatchEdit, text: &[char], margin: usize) {
    if text.is_empty() {
        return;
    }
    let start = patch.start2.min(text.len());
    let end = (patch.start2 + patch.length1).min(text.len());

    let mut padding = 0;
    let mut pattern = &text[start..end];
    while !occurs_once(text, pattern)
        && pattern.len() < MATCH_MAX_BITS.saturating_sub(2 * margin)
    {
        padding += margin;
        pattern = &text[start.saturating_sub(padding)..(end + padding).min(text.len())];
    }
    padding += margin;

    let prefix: String = text[start.saturating_sub(padding)..start].iter().collect();
    let suffix: String = text[end..(end + padding).min(text.len())].iter().collect();
    let prefix_len = prefix.chars().count();
    let suffix_len = suffix.chars().count();

    if !prefix.is_empty() {
        patch.diffs.insert(0, Diff::equal(prefix));
    }
    if !suffix.is_empty() {
        patch.diffs.push(Diff::equal(suffix));
    }
    patch.start1 -= prefix_len.min(patch.start1);
    patch.start2 -= prefix_len.min(patch.start2);
    patch.length1 += prefix_len + suffix_len;
    patch.length2 += prefix_len + suffix_len;
}

fn occurs_once(text: &[char], pattern: &[char]) -> bool {
    if pattern.is_empty() {
        return text.is_empty();
    }
    text.windows(pattern.len())
        .filter(|window| *window == pattern)
        .take(2)
        .count()
        == 1
}
