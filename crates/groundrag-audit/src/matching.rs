use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:[.,]\d+)*").expect("number pattern is valid"));
static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[[:alnum:]]+(?:[.,][[:digit:]]+)*").expect("word pattern is valid"));
static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(section|part|figure|fig|table|page|chapter|step|appendix)\.?\s*(?:no\.?\s*|#\s*)?([a-z]?\d+(?:[.\-]\d+)*[a-z]?)\b")
        .expect("reference pattern is valid")
});

/// Numeric literals exactly as written: `4.5`, `1,000`, `25`.
pub fn numbers(text: &str) -> Vec<String> { NUMBER.find_iter(text).map(|m| m.as_str().to_string()).collect() }

/// Lowercased word sequence, single-spaced and padded so that substring tests
/// only succeed on whole words.
pub fn normalize(text: &str) -> String {
    let lower = text.to_lowercase();
    let words: Vec<&str> = WORD.find_iter(&lower).map(|m| m.as_str()).collect();
    format!(" {} ", words.join(" "))
}

/// Document references such as `section 4.2` or `Fig. 7`, normalised to
/// `(kind, id)` in lowercase.
pub fn references(text: &str) -> Vec<(String, String)> {
    REFERENCE
        .captures_iter(text)
        .map(|c| {
            let kind = match c[1].to_lowercase().as_str() {
                "fig" => "figure".to_string(),
                other => other.to_string(),
            };
            (kind, c[2].to_lowercase())
        })
        .collect()
}

/// `text` with every document reference blanked out.
pub fn strip_references(text: &str) -> String { REFERENCE.replace_all(text, " ").into_owned() }

/// Share of `claim` tokens present in `snippet`. `1.0` for an empty claim.
pub fn coverage(claim: &HashSet<String>, snippet: &HashSet<String>) -> f32 {
    if claim.is_empty() {
        return 1.0;
    }
    claim.iter().filter(|t| snippet.contains(*t)).count() as f32 / claim.len() as f32
}
