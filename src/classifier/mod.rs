//! General-purpose language classification, the backstop outside Darija.
//!
//! [`GeneralClassifier`] is the pluggable strategy. Two families implement it:
//!
//! - [`statistical::StatisticalClassifier`]: local script analysis, function-word
//!   markers, and a `whatlang` trigram backstop. Never touches the network.
//! - [`remote::RemoteTier`] and the models it composes: hosted general and
//!   Darija-specialized models, raced against a budget by the orchestrator.
//!
//! The trait is object-safe and asynchronous so both can sit behind one
//! `Arc<dyn GeneralClassifier>`; local implementations resolve immediately.

pub mod remote;
pub mod statistical;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::ClassifierResult;
use crate::language::Language;

/// A classifier's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierVerdict {
    pub language: Language,
    pub confidence: f32,
    /// Which model or stage produced the verdict (`markers`, `whatlang`,
    /// `script`, `remote:<name>`, ...).
    pub provenance: String,
}

impl ClassifierVerdict {
    pub fn new(language: Language, confidence: f32, provenance: impl Into<String>) -> Self {
        Self {
            language,
            confidence: confidence.clamp(0.0, 1.0),
            provenance: provenance.into(),
        }
    }

    /// The verdict used when a classifier cannot say anything.
    pub fn unknown(confidence: f32, provenance: impl Into<String>) -> Self {
        Self::new(Language::Unknown, confidence, provenance)
    }
}

/// A language identifier usable as the general tier of the pipeline.
pub trait GeneralClassifier: Send + Sync {
    /// Short stable name for logs and telemetry.
    fn name(&self) -> &str;

    /// Classify a normalized text.
    fn classify<'a>(&'a self, text: &'a str) -> BoxFuture<'a, ClassifierResult<ClassifierVerdict>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_confidence_is_clamped() {
        let v = ClassifierVerdict::new(Language::French, 1.4, "markers");
        assert_eq!(v.confidence, 1.0);
        let u = ClassifierVerdict::unknown(-1.0, "none");
        assert_eq!(u.confidence, 0.0);
        assert_eq!(u.language, Language::Unknown);
    }
}
