use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use groundrag_core::traits::RiskClassifier;
use groundrag_core::types::RiskTier;

const SAFETY_SYSTEMS: &str = r"airbags?|srs|abs|brakes?|brake\s+lines?|seat\s*belts?|stability\s+control|traction\s+control|tpms";
const DISABLE_VERBS: &str = r"disable|deactivate|disconnect|remove|bypass|defeat|override|turn\s+off|cut|unplug";

static CRITICAL: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        compile(&format!(r"(?i)\b(?:{DISABLE_VERBS})\b.{{0,40}}\b(?:{SAFETY_SYSTEMS})\b")),
        compile(&format!(r"(?i)\b(?:{SAFETY_SYSTEMS})\b.{{0,40}}\b(?:{DISABLE_VERBS})\b")),
    ]
});

static HIGH: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        compile(r"(?i)\b(?:delete|remove|bypass|defeat|tamper\w*|disable|gut)\b.{0,40}\b(?:catalytic\s+converters?|dpf|egr|emissions?|immobili[sz]ers?|odometers?|speed\s+limiters?|governors?)\b"),
        compile(r"(?i)\broll\s*back\b.{0,20}\bodometers?\b"),
        compile(r"(?i)\bhot[\s-]?wir\w*"),
        compile(r"(?i)\b(?:make|build)\b.{0,30}\b(?:bomb|explosives?|incendiary)\b"),
    ]
});

static MEDIUM: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![compile(
        r"(?i)\b(?:jack(?:ing)?\s+up|lift(?:ing)?\s+the\s+(?:car|vehicle)|brake\s+fluid|fuel\s+(?:lines?|pump)|battery\s+terminals?|high[\s-]voltage|radiator\s+cap|coolant\s+cap)\b",
    )]
});

fn compile(pattern: &str) -> Regex { Regex::new(pattern).expect("lexicon pattern is valid") }

/// Deterministic keyword classifier for offline use and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconClassifier;

impl LexiconClassifier {
    pub fn tier(text: &str) -> RiskTier {
        let hit = |set: &[Regex]| set.iter().any(|re| re.is_match(text));
        if hit(CRITICAL.as_slice()) {
            RiskTier::Critical
        } else if hit(HIGH.as_slice()) {
            RiskTier::High
        } else if hit(MEDIUM.as_slice()) {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }
}

#[async_trait]
impl RiskClassifier for LexiconClassifier {
    async fn classify(&self, text: &str) -> anyhow::Result<RiskTier> { Ok(Self::tier(text)) }
}
