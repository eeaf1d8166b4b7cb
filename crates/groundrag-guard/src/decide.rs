//! Pure decision table over assessed segments.

use groundrag_core::types::{RefusalReason, RiskSegment};

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Every segment is safe; retrieval runs on `effective_query` only.
    Answer { effective_query: String, segments: Vec<RiskSegment> },
    Refuse(RefusalReason),
}

impl Decision {
    pub fn is_refusal(&self) -> bool { matches!(self, Decision::Refuse(_)) }
}

/// Any unsafe segment (or an unsafe whole-query composite) refuses the entire
/// request. No segments at all refuses too.
pub fn decide(segments: &[RiskSegment], composite: Option<&RiskSegment>) -> Decision {
    if segments.is_empty() {
        return Decision::Refuse(RefusalReason::EmptyAfterStripping);
    }
    let composite_unsafe = composite.is_some_and(|c| !c.tier.is_safe());
    if composite_unsafe || segments.iter().any(|s| !s.tier.is_safe()) {
        let mut flagged = segments.to_vec();
        flagged.extend(composite.filter(|c| !c.tier.is_safe()).cloned());
        return Decision::Refuse(RefusalReason::UnsafeIntent { segments: flagged });
    }
    let effective_query = segments.iter().map(|s| s.text.as_str()).collect::<Vec<_>>().join(" ");
    Decision::Answer { effective_query, segments: segments.to_vec() }
}
