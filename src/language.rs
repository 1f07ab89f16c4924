//! Core detection types: languages, scripts, provenance, and the result shape
//! handed to conversation-persistence and UI layers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::darija::DarijaScore;
use crate::script::ScriptAnalysis;

/// Languages the engine can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    French,
    /// Modern Standard Arabic.
    Arabic,
    /// Moroccan Arabic, in Arabic script or Latin transliteration.
    Darija,
    English,
    Spanish,
    Unknown,
}

impl Language {
    /// BCP 47 code for this language (`und` for unknown).
    pub fn bcp47(&self) -> &'static str {
        match self {
            Self::French => "fr",
            Self::Arabic => "ar",
            Self::Darija => "ary",
            Self::English => "en",
            Self::Spanish => "es",
            Self::Unknown => "und",
        }
    }

    /// Parse a language name or code as returned by remote models.
    ///
    /// Accepts BCP 47 codes, ISO 639-3 codes and English names, case-insensitive.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_lowercase().as_str() {
            "fr" | "fra" | "fre" | "french" => Self::French,
            "ar" | "ara" | "arb" | "arabic" | "msa" => Self::Arabic,
            "ary" | "darija" | "moroccan" | "moroccan_arabic" | "ar-ma" => Self::Darija,
            "en" | "eng" | "english" => Self::English,
            "es" | "spa" | "spanish" => Self::Spanish,
            _ => Self::Unknown,
        }
    }

    /// Whether the language is written right-to-left by default.
    pub fn is_rtl(&self) -> bool {
        matches!(self, Self::Arabic)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::French => "french",
            Self::Arabic => "arabic",
            Self::Darija => "darija",
            Self::English => "english",
            Self::Spanish => "spanish",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Writing system of an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Script {
    Latin,
    Arabic,
    Mixed,
    Unknown,
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Latin => "latin",
            Self::Arabic => "arabic",
            Self::Mixed => "mixed",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Which tier produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    LocalRules,
    RemoteModel,
    Cache,
    OfflineFallback,
    Error,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LocalRules => "local-rules",
            Self::RemoteModel => "remote-model",
            Self::Cache => "cache",
            Self::OfflineFallback => "offline-fallback",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Why the remote tier was abandoned in favor of local rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    Timeout,
    LowConfidence,
    Error,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Timeout => "timeout",
            Self::LowConfidence => "low_confidence",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Per-call options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionOptions {
    /// Skip the remote tier entirely.
    #[serde(default)]
    pub offline: bool,
    /// Budget for the remote tier, in milliseconds. `None` uses the
    /// configured default (400ms out of the box).
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Verdicts below this confidence are reported as `unknown`.
    #[serde(default)]
    pub min_confidence: f32,
    /// Neither read from nor write to the result cache.
    #[serde(default)]
    pub bypass_cache: bool,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            offline: false,
            timeout_ms: None,
            min_confidence: 0.0,
            bypass_cache: false,
        }
    }
}

impl DetectionOptions {
    /// Options forcing the local-only path.
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Default::default()
        }
    }

    /// Options with an explicit remote budget.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Signal breakdown attached to a result for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionDetails {
    pub darija: DarijaScore,
    pub script: ScriptAnalysis,
    /// Verdict of the general classifier before merging.
    pub general_language: Language,
    pub general_confidence: f32,
    /// Which merger rule decided the verdict (`None` when the general
    /// classifier's verdict passed through).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
}

/// The result of a single `detect` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub language: Language,
    /// Always within `[0.0, 1.0]`.
    pub confidence: f32,
    pub script: Script,
    pub source: Source,
    /// Wall-clock cost of the call that returned this value.
    pub processing_time_ms: f64,
    /// Signals that fired, e.g. `keyword:wach`, `idiom:inchallah`, `transliteration:3`.
    #[serde(default)]
    pub indicators: Vec<String>,
    /// Set only when `source` is [`Source::Error`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<DetectionDetails>,
}

impl DetectionResult {
    /// A failed detection: `unknown`, zero confidence, `source = error`.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            language: Language::Unknown,
            confidence: 0.0,
            script: Script::Unknown,
            source: Source::Error,
            processing_time_ms: 0.0,
            indicators: Vec::new(),
            error: Some(message.into()),
            fallback_reason: None,
            details: None,
        }
    }

    /// Clamp confidence into `[0, 1]`, mapping NaN to zero.
    pub(crate) fn clamp_confidence(value: f32) -> f32 {
        if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, 1.0)
        }
    }

    pub fn is_darija(&self) -> bool {
        self.language == Language::Darija
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_codes_round_trip_through_from_code() {
        for lang in [
            Language::French,
            Language::Arabic,
            Language::Darija,
            Language::English,
            Language::Spanish,
        ] {
            assert_eq!(Language::from_code(lang.bcp47()), lang);
        }
        assert_eq!(Language::from_code("klingon"), Language::Unknown);
    }

    #[test]
    fn from_code_accepts_names() {
        assert_eq!(Language::from_code("Darija"), Language::Darija);
        assert_eq!(Language::from_code(" arabic "), Language::Arabic);
        assert_eq!(Language::from_code("FRA"), Language::French);
    }

    #[test]
    fn failure_result_shape() {
        let r = DetectionResult::failure("empty input");
        assert_eq!(r.language, Language::Unknown);
        assert_eq!(r.confidence, 0.0);
        assert_eq!(r.source, Source::Error);
        assert_eq!(r.error.as_deref(), Some("empty input"));
    }

    #[test]
    fn clamp_handles_nan_and_range() {
        assert_eq!(DetectionResult::clamp_confidence(f32::NAN), 0.0);
        assert_eq!(DetectionResult::clamp_confidence(1.7), 1.0);
        assert_eq!(DetectionResult::clamp_confidence(-0.2), 0.0);
        assert_eq!(DetectionResult::clamp_confidence(0.42), 0.42);
    }

    #[test]
    fn result_serializes_with_camel_case_and_kebab_source() {
        let r = DetectionResult::failure("x");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["source"], "error");
        assert_eq!(json["language"], "unknown");
        assert!(json.get("processingTimeMs").is_some());
    }

    #[test]
    fn source_display_matches_serde() {
        let json = serde_json::to_value(Source::OfflineFallback).unwrap();
        assert_eq!(json, Source::OfflineFallback.to_string());
        assert_eq!(FallbackReason::LowConfidence.to_string(), "low_confidence");
    }
}
