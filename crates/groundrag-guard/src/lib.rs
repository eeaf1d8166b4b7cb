//! Query guard: strips prompt-injection syntax, splits the remainder into
//! sub-questions, classifies each, and refuses the whole request when any
//! part is unsafe.

pub mod decide;
pub mod detect;
pub mod engine;
pub mod extract;
pub mod lexicon;

pub use decide::{decide, Decision};
pub use detect::{scan, Detection, MarkerKind, MarkerSpan};
pub use engine::{detect, validate_query, Assessed, Detected, Extracted, InjectionResolver, Resolution};
pub use lexicon::LexiconClassifier;
