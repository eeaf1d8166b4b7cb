//! Claim segmentation and citation-marker handling.

use std::sync::LazyLock;

use regex::Regex;

static SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]+(?:\s+|$)").expect("sentence pattern is valid"));
static LIST_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s+").expect("list pattern is valid"));
static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[\s*(?:(\d+(?:\s*,\s*\d+)*)|cite|citation|source\b[^\]]*|ref\b[^\]]*)\s*\]").expect("marker pattern is valid")
});

/// One sentence of generated text with its citation markers removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub text: String,
    /// 1-based indices from numeric markers such as `[2]` or `[1, 3]`.
    pub cited: Vec<usize>,
}

/// Split on line breaks, then on sentence terminators followed by whitespace.
/// A decimal like `4.5` has no whitespace after the point and stays whole.
pub fn split_claims(text: &str) -> Vec<Claim> {
    let mut claims = Vec::new();
    for line in text.lines() {
        let line = LIST_PREFIX.replace(line, "");
        let mut cursor = 0;
        for m in SENTENCE_END.find_iter(&line) {
            push_claim(&mut claims, &line[cursor..m.end()]);
            cursor = m.end();
        }
        push_claim(&mut claims, &line[cursor..]);
    }
    claims
}

fn push_claim(claims: &mut Vec<Claim>, sentence: &str) {
    let (text, cited) = strip_markers(sentence);
    if text.chars().any(char::is_alphanumeric) {
        claims.push(Claim { text, cited });
    } else if let Some(last) = claims.last_mut() {
        // a marker trailing its sentence, e.g. "quarts. [1]"
        last.cited.extend(cited);
    }
}

/// Remove citation markers, returning the clean text and numeric indices.
pub fn strip_markers(sentence: &str) -> (String, Vec<usize>) {
    let mut cited = Vec::new();
    for caps in MARKER.captures_iter(sentence) {
        if let Some(list) = caps.get(1) {
            cited.extend(list.as_str().split(',').filter_map(|n| n.trim().parse::<usize>().ok()));
        }
    }
    let clean = MARKER.replace_all(sentence, " ");
    let text = clean.split_whitespace().collect::<Vec<_>>().join(" ");
    let text = text.trim_end_matches(|c: char| c.is_whitespace() || matches!(c, '.' | '!' | '?' | ',' | ';' | ':')).to_string();
    (text, cited)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimals_do_not_split() {
        let claims = split_claims("Oil capacity is 4.5 quarts. Torque the plug to 25 lb-ft!");
        let texts: Vec<&str> = claims.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["Oil capacity is 4.5 quarts", "Torque the plug to 25 lb-ft"]);
    }

    #[test]
    fn markers_are_stripped_and_collected() {
        let claims = split_claims("Use 5W-30 oil [2]. Check weekly [1, 3].\n- Replace filter [cite]");
        assert_eq!(claims.len(), 3);
        assert_eq!(claims[0], Claim { text: "Use 5W-30 oil".into(), cited: vec![2] });
        assert_eq!(claims[1].cited, vec![1, 3]);
        assert_eq!(claims[2].text, "Replace filter");
    }

    #[test]
    fn trailing_marker_attaches_to_previous_claim() {
        let claims = split_claims("Capacity is 4.5 quarts. [4]");
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].cited, vec![4]);
    }
}
