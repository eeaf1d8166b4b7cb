//! Marker stripping and sub-question segmentation.

use std::sync::LazyLock;

use regex::Regex;

use crate::detect::{scan, Detection};

/// Splits on question marks, semicolons, newlines and coordinating words.
/// The question mark stays with the segment it closes.
static BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\?|;|\n|\b(?:and|also|then)\b").expect("boundary pattern is valid"));

/// Rounds of detect-and-strip before giving up on a pathological input.
const MAX_STRIP_ROUNDS: usize = 8;

/// Remove every marker span, replacing each with a single space so that
/// neighbouring words never fuse into new tokens.
pub fn strip_markers(text: &str, detection: &Detection) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in &detection.markers {
        out.push_str(&text[cursor..span.start]);
        out.push(' ');
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Strip until a fresh scan finds nothing. `None` when the text still carries
/// markers after [`MAX_STRIP_ROUNDS`].
pub fn strip_to_fixpoint(text: &str, detection: &Detection) -> Option<String> {
    let mut current = strip_markers(text, detection);
    for _ in 0..MAX_STRIP_ROUNDS {
        let again = scan(&current);
        if !again.has_injection {
            return Some(current);
        }
        current = strip_markers(&current, &again);
    }
    None
}

/// Strip markers, split into segments, and repeat on the rejoined segments
/// until the joined text scans clean. Dropping a boundary can fuse pieces
/// back into a marker, and the joined text is what gets assessed as the
/// composite and retrieved with. `None` when stripping does not converge.
pub fn clean_segments(text: &str, detection: &Detection) -> Option<Vec<String>> {
    let mut clean = strip_to_fixpoint(text, detection)?;
    for _ in 0..MAX_STRIP_ROUNDS {
        let segments = split_segments(&clean);
        let joined = segments.join(" ");
        let again = scan(&joined);
        if !again.has_injection {
            return Some(segments);
        }
        clean = strip_to_fixpoint(&joined, &again)?;
    }
    None
}

pub fn split_segments(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut cursor = 0;
    for m in BOUNDARY.find_iter(text) {
        let end = if m.as_str() == "?" { m.end() } else { m.start() };
        push_segment(&mut segments, &text[cursor..end]);
        cursor = m.end();
    }
    push_segment(&mut segments, &text[cursor..]);
    segments
}

fn push_segment(segments: &mut Vec<String>, piece: &str) {
    let trimmed = piece
        .trim()
        .trim_start_matches(|c: char| c.is_whitespace() || matches!(c, ',' | '.' | ':' | '-' | '!'))
        .trim_end_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ':' | '-'));
    if trimmed.chars().any(char::is_alphanumeric) {
        segments.push(collapse_whitespace(trimmed));
    }
}

fn collapse_whitespace(s: &str) -> String { s.split_whitespace().collect::<Vec<_>>().join(" ") }
