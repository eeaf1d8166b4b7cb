//! Injection resolution as a typestate chain: each stage can only be reached
//! from the one before it, so the assessor never sees raw marker text.

use std::sync::Arc;

use tracing::{debug, info, warn};

use groundrag_core::config::GuardConfig;
use groundrag_core::error::{Error, Result};
use groundrag_core::traits::RiskClassifier;
use groundrag_core::types::{RefusalReason, RiskSegment, RiskTier};

use crate::decide::{decide, Decision};
use crate::detect::{is_zero_width, scan, Detection};
use crate::extract::clean_segments;

/// Outcome of resolving one raw query.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub detection: Detection,
    pub segments: Vec<RiskSegment>,
    pub decision: Decision,
}

/// Raw text that has been scanned for markers.
#[derive(Debug)]
pub struct Detected {
    raw: String,
    detection: Detection,
}

/// Marker-free sub-questions whose rejoined text is marker-free as well.
/// Only [`Detected::extract`] builds this.
#[derive(Debug)]
pub struct Extracted {
    detection: Detection,
    segments: Vec<String>,
}

#[derive(Debug)]
pub struct Assessed {
    detection: Detection,
    segments: Vec<RiskSegment>,
    composite: Option<RiskSegment>,
}

/// Drop zero-width characters, then scan.
pub fn detect(raw: &str) -> Detected {
    let raw: String = raw.chars().filter(|&c| !is_zero_width(c)).collect();
    let detection = scan(&raw);
    Detected { raw, detection }
}

impl Detected {
    pub fn detection(&self) -> &Detection { &self.detection }

    pub fn extract(self) -> Extracted {
        let segments = match clean_segments(&self.raw, &self.detection) {
            Some(segments) => segments,
            None => {
                warn!(markers = self.detection.markers.len(), "markers survive repeated stripping; dropping all text");
                Vec::new()
            }
        };
        Extracted { detection: self.detection, segments }
    }
}

impl Extracted {
    pub fn segments(&self) -> &[String] { &self.segments }

    /// Classify every segment, plus the rejoined query when there is more than
    /// one segment. A single classifier error fails the whole assessment.
    pub async fn assess(self, classifier: &dyn RiskClassifier) -> Result<Assessed> {
        let mut segments = Vec::with_capacity(self.segments.len());
        for text in &self.segments {
            let tier = classify(classifier, text).await?;
            debug!(segment = %text, %tier, "segment assessed");
            segments.push(RiskSegment { text: text.clone(), tier });
        }
        let composite = if self.segments.len() > 1 {
            let text = self.segments.join(" ");
            let tier = classify(classifier, &text).await?;
            Some(RiskSegment { text, tier })
        } else {
            None
        };
        Ok(Assessed { detection: self.detection, segments, composite })
    }
}

async fn classify(classifier: &dyn RiskClassifier, text: &str) -> Result<RiskTier> {
    classifier.classify(text).await.map_err(|e| Error::ClassifierUnavailable(format!("{e:#}")))
}

impl Assessed {
    pub fn decide(self) -> Resolution {
        let decision = decide(&self.segments, self.composite.as_ref());
        Resolution { detection: self.detection, segments: self.segments, decision }
    }
}

/// Validates input, then runs detect → extract → assess → decide.
pub struct InjectionResolver {
    classifier: Arc<dyn RiskClassifier>,
    max_query_chars: usize,
}

impl InjectionResolver {
    pub fn new(classifier: Arc<dyn RiskClassifier>, config: &GuardConfig) -> Self {
        Self { classifier, max_query_chars: config.max_query_chars }
    }

    pub async fn resolve(&self, raw: &str) -> Resolution {
        if let Err(e) = validate_query(raw, self.max_query_chars) {
            info!(error = %e, "query rejected before resolution");
            return refuse(Detection::default(), Vec::new(), RefusalReason::InputInvalid { detail: e.to_string() });
        }

        let detected = detect(raw);
        if detected.detection().has_injection {
            info!(markers = detected.detection().markers.len(), "injection markers detected");
        }
        let extracted = detected.extract();
        let detection = extracted.detection.clone();

        let resolution = match extracted.assess(self.classifier.as_ref()).await {
            Ok(assessed) => assessed.decide(),
            Err(e) => {
                warn!(error = %e, "risk classifier failed; refusing");
                refuse(detection, Vec::new(), RefusalReason::ClassifierUnavailable { detail: e.to_string() })
            }
        };
        info!(
            injection = resolution.detection.has_injection,
            segments = resolution.segments.len(),
            refused = resolution.decision.is_refusal(),
            "query resolved"
        );
        resolution
    }
}

/// Reject empty or oversized input before any other stage runs.
pub fn validate_query(raw: &str, max_chars: usize) -> Result<()> {
    if raw.trim().is_empty() {
        return Err(Error::InputInvalid("query is empty".into()));
    }
    let chars = raw.chars().count();
    if chars > max_chars {
        return Err(Error::InputInvalid(format!("query has {chars} characters, limit is {max_chars}")));
    }
    Ok(())
}

fn refuse(detection: Detection, segments: Vec<RiskSegment>, reason: RefusalReason) -> Resolution {
    Resolution { detection, segments, decision: Decision::Refuse(reason) }
}
