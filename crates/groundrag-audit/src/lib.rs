//! Post-generation citation audit: claim extraction, evidence matching and
//! the fully/partially/un-cited classification.

pub mod auditor;
pub mod claims;
pub mod matching;

pub use auditor::CitationAuditor;
pub use claims::{split_claims, Claim};
