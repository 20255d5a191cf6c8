//! Single-line text form of a patch edit.
//!
//! `@@ -start1,length1 +start2,length2 @@` followed by one token per diff:
//! the operation sigil and its percent-encoded text. Whitespace, control
//! characters and `%` are always escaped, so an encoded edit never spans lines.

use super::{Diff, Operation, PatchEdit};
use crate::error::PechaError;
use regex::Regex;
use std::fmt::Write as _;
use std::sync::OnceLock;

const BOM: char = '\u{feff}';

fn header_regex() -> &'static Regex {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    HEADER.get_or_init(|| {
        Regex::new(r"^@@ -(\d+),(\d+) \+(\d+),(\d+) @@$").expect("valid patch header regex")
    })
}

/// Encode one edit as a single line.
pub fn encode(edit: &PatchEdit) -> String {
    let mut line = format!(
        "@@ -{},{} +{},{} @@",
        edit.start1, edit.length1, edit.start2, edit.length2
    );
    for diff in &edit.diffs {
        line.push(' ');
        line.push(diff.op.sigil());
        escape_into(&mut line, &diff.text);
    }
    line
}

/// Decode one line produced by [`encode`].
///
/// # Errors
/// Returns [`PechaError::Decode`] when the header or a diff token is malformed.
pub fn decode(line: &str) -> Result<PatchEdit, PechaError> {
    decode_line(line, 1)
}

/// Parse a newline-joined list of encoded edits.
///
/// Blank lines and a leading byte-order marker are ignored.
///
/// # Errors
/// Returns [`PechaError::Decode`] carrying the 1-based line number of the
/// first malformed line.
pub fn parse_list(text: &str) -> Result<Vec<PatchEdit>, PechaError> {
    text.trim_start_matches(BOM)
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| decode_line(line.trim_end_matches('\r'), index + 1))
        .collect()
}

fn decode_line(line: &str, number: usize) -> Result<PatchEdit, PechaError> {
    let fail = |reason: String| PechaError::Decode {
        line: number,
        reason,
    };

    let mut tokens = line.split(' ');
    let header: Vec<&str> = tokens.by_ref().take(4).collect();
    let header = header.join(" ");
    let captures = header_regex()
        .captures(&header)
        .ok_or_else(|| fail(format!("bad header '{}'", header)))?;
    let number_at = |group: usize| -> Result<usize, PechaError> {
        captures[group]
            .parse::<usize>()
            .map_err(|err| fail(format!("bad offset '{}': {}", &captures[group], err)))
    };

    let mut diffs = Vec::new();
    for token in tokens {
        let mut chars = token.chars();
        let sigil = chars
            .next()
            .ok_or_else(|| fail("empty diff token".to_string()))?;
        let op = Operation::from_sigil(sigil)
            .ok_or_else(|| fail(format!("unknown diff sigil '{}'", sigil)))?;
        let text = unescape(chars.as_str()).map_err(fail)?;
        diffs.push(Diff::new(op, text));
    }

    Ok(PatchEdit {
        diffs,
        start1: number_at(1)?,
        length1: number_at(2)?,
        start2: number_at(3)?,
        length2: number_at(4)?,
    })
}

fn escape_into(out: &mut String, text: &str) {
    let mut buf = [0u8; 4];
    for c in text.chars() {
        if c == '%' || c.is_whitespace() || c.is_control() || c == BOM {
            for byte in c.encode_utf8(&mut buf).bytes() {
                let _ = write!(out, "%{:02X}", byte);
            }
        } else {
            out.push(c);
        }
    }
}

fn unescape(token: &str) -> Result<String, String> {
    let raw = token.as_bytes();
    let mut bytes = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'%' {
            let hex = token
                .get(i + 1..i + 3)
                .ok_or_else(|| format!("truncated escape in '{}'", token))?;
            let byte = u8::from_str_radix(hex, 16)
                .map_err(|_| format!("invalid escape '%{}' in '{}'", hex, token))?;
            bytes.push(byte);
            i += 3;
        } else {
            bytes.push(raw[i]);
            i += 1;
        }
    }
    String::from_utf8(bytes).map_err(|err| format!("invalid UTF-8 in '{}': {}", token, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PatchEdit {
        PatchEdit::new(
            vec![
                Diff::equal("The "),
                Diff::insert("added 100%\n"),
                Diff::equal("cat sat."),
            ],
            0,
            0,
        )
    }

    #[test]
    fn encode_escapes_whitespace_and_percent() {
        assert_eq!(
            encode(&sample()),
            "@@ -0,12 +0,23 @@ =The%20 +added%20100%25%0A =cat%20sat."
        );
    }

    #[test]
    fn decode_reads_back_encoded_line() {
        let line = encode(&sample());
        assert_eq!(decode(&line).expect("decode"), sample());
    }

    #[test]
    fn non_ascii_text_survives() {
        let edit = PatchEdit::new(
            vec![Diff::equal("བཀྲ་ཤིས་"), Diff::delete("\u{a0}"), Diff::insert("།")],
            3,
            3,
        );
        let line = encode(&edit);
        assert!(!line.contains('\u{a0}'));
        assert_eq!(decode(&line).expect("decode"), edit);
    }

    #[test]
    fn parse_list_skips_bom_and_blank_lines() {
        let text = format!("\u{feff}{}\n\n{}\n", encode(&sample()), encode(&sample()));
        let edits = parse_list(&text).expect("parse");
        assert_eq!(edits, vec![sample(), sample()]);
    }

    #[test]
    fn parse_list_reports_failing_line() {
        let text = format!("{}\n@@ -1 +1 @@ =x", encode(&sample()));
        match parse_list(&text) {
            Err(PechaError::Decode { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn unknown_sigil_is_rejected() {
        assert!(matches!(
            decode("@@ -0,1 +0,1 @@ *x"),
            Err(PechaError::Decode { .. })
        ));
    }
}
