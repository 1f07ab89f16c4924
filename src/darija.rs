//! Darija scorer: weighted combination of the five signal extractors.
//!
//! `confidence = Σ signal_i · weight_i`. The weights and the decision threshold
//! are calibration knobs from [`DarijaConfig`], not constants: they were tuned
//! against a labeled corpus and should be re-validated for new deployments.

use serde::{Deserialize, Serialize};

use crate::config::{DarijaConfig, DarijaWeights};
use crate::error::ConfigResult;
use crate::lexicon::Lexicon;
use crate::signals::{SignalExtractors, SignalScores};

/// Scorer verdict for one text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DarijaScore {
    pub is_darija: bool,
    pub confidence: f32,
    /// Matched evidence, e.g. `keyword:wach`, `code_switch:je bghit`, `idiom:inchallah`.
    pub indicators: Vec<String>,
    pub signals: SignalScores,
}

impl DarijaScore {
    pub fn indicator_count(&self) -> usize {
        self.indicators.len()
    }
}

/// Combines the signal extractors under a weight table.
#[derive(Debug, Clone)]
pub struct DarijaScorer {
    extractors: SignalExtractors,
    weights: DarijaWeights,
    threshold: f32,
}

impl DarijaScorer {
    pub fn new(lexicon: &Lexicon, config: &DarijaConfig) -> ConfigResult<Self> {
        Ok(Self {
            extractors: SignalExtractors::new(lexicon, config)?,
            weights: config.weights,
            threshold: config.threshold,
        })
    }

    pub fn weights(&self) -> &DarijaWeights {
        &self.weights
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Score a normalized text.
    pub fn score(&self, text: &str) -> DarijaScore {
        let signals = self.extractors.extract(text);
        let w = &self.weights;

        let confidence = (signals.keywords.score * w.keywords
            + signals.code_switching.score * w.code_switching
            + signals.morphological.score * w.morphological
            + signals.idiomatic.score * w.idiomatic
            + signals.script_mixing.score * w.script_mixing)
            .clamp(0.0, 1.0);

        let indicators = signals
            .keywords
            .matches
            .iter()
            .map(|k| format!("keyword:{k}"))
            .chain(
                signals
                    .code_switching
                    .matches
                    .iter()
                    .map(|c| format!("code_switch:{c}")),
            )
            .chain(
                signals
                    .idiomatic
                    .matches
                    .iter()
                    .map(|i| format!("idiom:{i}")),
            )
            .collect();

        DarijaScore {
            is_darija: confidence >= self.threshold,
            confidence,
            indicators,
            signals,
        }
    }
}
