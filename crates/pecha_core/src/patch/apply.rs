//! Fuzzy patch relocation and application.

use super::{diff_chars, ApplyMode, Diff, Operation, PatchEdit};
use crate::constants::MATCH_MAX_BITS;
use std::collections::HashMap;

/// Match tolerance used when relocating an edit's anchor text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    /// Highest accepted match score (0.0 exact, 1.0 anything).
    pub threshold: f64,
    /// Distance from the expected location at which proximity costs a full point.
    pub distance: usize,
    /// Largest accepted edit distance between expected and found text, per character.
    pub delete_threshold: f64,
}

impl Tolerance {
    /// Tolerance for an apply mode.
    ///
    /// # Returns
    /// Looser settings for [`ApplyMode::Export`], tighter ones for
    /// [`ApplyMode::Edit`].
    pub fn for_mode(mode: ApplyMode) -> Self {
        match mode {
            ApplyMode::Export => Self {
                threshold: 0.5,
                distance: 1000,
                delete_threshold: 0.5,
            },
            ApplyMode::Edit => Self {
                threshold: 0.3,
                distance: 500,
                delete_threshold: 0.5,
            },
        }
    }
}

pub(crate) fn apply_patches(
    edits: &[PatchEdit],
    text: &str,
    tolerance: Tolerance,
) -> (String, Vec<bool>) {
    let mut chars: Vec<char> = text.chars().collect();
    let mut results = Vec::with_capacity(edits.len());
    let mut delta: isize = 0;

    for edit in edits {
        let expected = (edit.start2 as isize + delta).max(0) as usize;
        let source: Vec<char> = edit.source_text().chars().collect();

        let Some((start, end)) = locate(&chars, &source, expected, tolerance) else {
            results.push(false);
            delta -= edit.length2 as isize - edit.length1 as isize;
            continue;
        };
        delta = start as isize - expected as isize;

        let found = &chars[start..end.min(chars.len())];
        if found == source.as_slice() {
            let target: Vec<char> = edit.target_text().chars().collect();
            chars.splice(start..start + source.len(), target);
            results.push(true);
            continue;
        }

        let source_text: String = source.iter().collect();
        let found_text: String = found.iter().collect();
        let drift = diff_chars(&source_text, &found_text);
        if source.is_empty()
            || levenshtein(&drift) as f64 / source.len() as f64 > tolerance.delete_threshold
        {
            results.push(false);
            continue;
        }

        let mut index1 = 0usize;
        for diff in &edit.diffs {
            let len = diff.char_len();
            match diff.op {
                Operation::Insert => {
                    let at = (start + x_index(&drift, index1)).min(chars.len());
                    chars.splice(at..at, diff.text.chars());
                }
                Operation::Delete => {
                    let to = (start + x_index(&drift, index1 + len)).min(chars.len());
                    let from = (start + x_index(&drift, index1)).min(to);
                    chars.drain(from..to);
                }
                Operation::Equal => {}
            }
            if diff.op != Operation::Delete {
                index1 += len;
            }
        }
        results.push(true);
    }

    (chars.into_iter().collect(), results)
}

/// Find the span of `source` inside `text` near `expected`.
fn locate(
    text: &[char],
    source: &[char],
    expected: usize,
    tolerance: Tolerance,
) -> Option<(usize, usize)> {
    if source.len() <= MATCH_MAX_BITS {
        let start = match_main(text, source, expected, tolerance)?;
        return Some((start, start + source.len()));
    }

    let head = &source[..MATCH_MAX_BITS];
    let tail = &source[source.len() - MATCH_MAX_BITS..];
    let start = match_main(text, head, expected, tolerance)?;
    let end = match_main(
        text,
        tail,
        expected + source.len() - MATCH_MAX_BITS,
        tolerance,
    )?;
    (start < end).then_some((start, end + MATCH_MAX_BITS))
}

fn match_main(text: &[char], pattern: &[char], loc: usize, tolerance: Tolerance) -> Option<usize> {
    let loc = loc.min(text.len());
    if text == pattern {
        return Some(0);
    }
    if text.is_empty() {
        return None;
    }
    if text.get(loc..loc + pattern.len()) == Some(pattern) {
        return Some(loc);
    }
    match_bitap(text, pattern, loc, tolerance)
}

fn match_bitap(text: &[char], pattern: &[char], loc: usize, tolerance: Tolerance) -> Option<usize> {
    if pattern.is_empty() || pattern.len() > MATCH_MAX_BITS {
        return None;
    }
    let alphabet = alphabet(pattern);
    let score = |errors: usize, x: usize| -> f64 {
        let accuracy = errors as f64 / pattern.len() as f64;
        let proximity = loc.abs_diff(x);
        if tolerance.distance == 0 {
            return if proximity == 0 { accuracy } else { 1.0 };
        }
        accuracy + proximity as f64 / tolerance.distance as f64
    };

    let mut threshold = tolerance.threshold;
    if let Some(found) = find_from(text, pattern, loc) {
        threshold = threshold.min(score(0, found));
        if let Some(found) = rfind_until(text, pattern, loc + pattern.len()) {
            threshold = threshold.min(score(0, found));
        }
    }

    let match_mask = 1u64 << (pattern.len() - 1);
    let mut best_loc = None;
    let mut bin_max = pattern.len() + text.len();
    let mut last_rd: Vec<u64> = Vec::new();

    for d in 0..pattern.len() {
        // Widest window still able to beat the current threshold.
        let mut bin_min = 0;
        let mut bin_mid = bin_max;
        while bin_min < bin_mid {
            if score(d, loc + bin_mid) <= threshold {
                bin_min = bin_mid;
            } else {
                bin_max = bin_mid;
            }
            bin_mid = (bin_max - bin_min) / 2 + bin_min;
        }
        bin_max = bin_mid;

        let mut start = (loc as isize - bin_mid as isize + 1).max(1) as usize;
        let finish = (loc + bin_mid).min(text.len()) + pattern.len();
        let mut rd = vec![0u64; finish + 2];
        rd[finish + 1] = (1u64 << d) - 1;

        let mut j = finish;
        while j >= start {
            let char_match = text
                .get(j - 1)
                .and_then(|c| alphabet.get(c).copied())
                .unwrap_or(0);
            rd[j] = if d == 0 {
                ((rd[j + 1] << 1) | 1) & char_match
            } else {
                (((rd[j + 1] << 1) | 1) & char_match)
                    | (((last_rd[j + 1] | last_rd[j]) << 1) | 1)
                    | last_rd[j + 1]
            };
            if rd[j] & match_mask != 0 {
                let candidate = score(d, j - 1);
                if candidate <= threshold {
                    threshold = candidate;
                    best_loc = Some(j - 1);
                    if j - 1 > loc {
                        start = (2 * loc as isize - (j - 1) as isize).max(1) as usize;
                    } else {
                        break;
                    }
                }
            }
            j -= 1;
        }

        if score(d + 1, loc) > threshold {
            break;
        }
        last_rd = rd;
    }
    best_loc
}

fn alphabet(pattern: &[char]) -> HashMap<char, u64> {
    let mut masks = HashMap::new();
    for (i, c) in pattern.iter().enumerate() {
        *masks.entry(*c).or_insert(0) |= 1u64 << (pattern.len() - i - 1);
    }
    masks
}

fn find_from(text: &[char], pattern: &[char], from: usize) -> Option<usize> {
    if from > text.len() || pattern.len() > text.len() - from {
        return None;
    }
    text[from..]
        .windows(pattern.len())
        .position(|window| window == pattern)
        .map(|offset| from + offset)
}

fn rfind_until(text: &[char], pattern: &[char], last_start: usize) -> Option<usize> {
    if pattern.len() > text.len() {
        return None;
    }
    let limit = last_start.min(text.len() - pattern.len());
    (0..=limit)
        .rev()
        .find(|&at| &text[at..at + pattern.len()] == pattern)
}

/// Map a location in the first text of `diffs` to the second text.
fn x_index(diffs: &[Diff], loc: usize) -> usize {
    let mut chars1 = 0;
    let mut chars2 = 0;
    let mut last_chars1 = 0;
    let mut last_chars2 = 0;
    for diff in diffs {
        let len = diff.char_len();
        if diff.op != Operation::Insert {
            chars1 += len;
        }
        if diff.op != Operation::Delete {
            chars2 += len;
        }
        if chars1 > loc {
            if diff.op == Operation::Delete {
                return last_chars2;
            }
            break;
        }
        last_chars1 = chars1;
        last_chars2 = chars2;
    }
    last_chars2 + (loc - last_chars1)
}

fn levenshtein(diffs: &[Diff]) -> usize {
    let mut distance = 0;
    let mut insertions = 0;
    let mut deletions = 0;
    for diff in diffs {
        match diff.op {
            Operation::Insert => insertions += diff.char_len(),
            Operation::Delete => deletions += diff.char_len(),
            Operation::Equal => {
                distance += insertions.max(deletions);
                insertions = 0;
                deletions = 0;
            }
        }
    }
    distance + insertions.max(deletions)
}
