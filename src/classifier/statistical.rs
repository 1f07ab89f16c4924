//! Local statistical language identification.
//!
//! Three stages, each cheaper than the next:
//!
//! 1. **Script analysis**: an Arabic-dominant text is Arabic with high confidence.
//! 2. **Latin disambiguation**: function-word markers and diacritics separate
//!    French, English, and Spanish.
//! 3. **Trigram backstop**: when no marker fires, `whatlang` decides among the
//!    same languages. Guesses below the configured floor come back `unknown`.
//!
//! Marker profiles are built in, or loaded from a TOML file. A profile file that
//! fails to load puts the classifier in degraded mode, where it answers
//! `unknown` with low confidence instead of failing the detection.

use std::path::Path;

use futures_util::future::{self, BoxFuture};
use serde::{Deserialize, Serialize};
use whatlang::{Detector, Lang};

use super::{ClassifierVerdict, GeneralClassifier};
use crate::config::ClassifierConfig;
use crate::error::{ClassifierError, ClassifierResult};
use crate::language::Language;
use crate::script::{is_arabic_char, is_latin_letter};

/// Confidence reported in degraded mode.
const DEGRADED_CONFIDENCE: f32 = 0.1;

/// Confidence reported when the trigram model cannot tell.
const UNSURE_CONFIDENCE: f32 = 0.2;

/// Function words and orthographic markers of one Latin-script language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerProfile {
    pub language: Language,
    pub words: Vec<String>,
    /// Each present diacritic class adds 2 to the language's raw score (once).
    #[serde(default)]
    pub diacritics: Vec<char>,
    /// Each present punctuation mark adds 3 (once), e.g. Spanish `¿`.
    #[serde(default)]
    pub punctuation: Vec<char>,
}

#[derive(Debug, Clone, Deserialize)]
struct ProfileFile {
    profiles: Vec<MarkerProfile>,
}

/// Load marker profiles from a TOML file of `[[profiles]]` tables.
pub fn load_profiles(path: &Path) -> ClassifierResult<Vec<MarkerProfile>> {
    let content =
        std::fs::read_to_string(path).map_err(|e| ClassifierError::Initialization {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
    let file: ProfileFile =
        toml::from_str(&content).map_err(|e| ClassifierError::Initialization {
            message: format!("cannot parse {}: {e}", path.display()),
        })?;
    if file.profiles.is_empty() {
        return Err(ClassifierError::Initialization {
            message: format!("{} defines no profiles", path.display()),
        });
    }
    Ok(file.profiles)
}

/// The built-in French, English, and Spanish profiles.
pub fn builtin_profiles() -> Vec<MarkerProfile> {
    vec![
        MarkerProfile {
            language: Language::French,
            words: owned(FRENCH_MARKERS),
            diacritics: vec!['é', 'è', 'ê', 'ë', 'ç', 'à', 'ù', 'î', 'ô', 'œ'],
            punctuation: Vec::new(),
        },
        MarkerProfile {
            language: Language::English,
            words: owned(ENGLISH_MARKERS),
            diacritics: Vec::new(),
            punctuation: Vec::new(),
        },
        MarkerProfile {
            language: Language::Spanish,
            words: owned(SPANISH_MARKERS),
            diacritics: vec!['ñ', 'á', 'í', 'ó', 'ú', 'ü'],
            punctuation: vec!['¿', '¡'],
        },
    ]
}

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| (*w).to_string()).collect()
}

const FRENCH_MARKERS: &[&str] = &[
    "le", "la", "les", "des", "est", "dans", "avec", "une", "sur", "pour", "pas", "qui", "que",
    "sont", "ont", "fait", "plus", "mais", "aussi", "cette", "ces", "nous", "vous", "ils",
    "elles", "je", "tu", "il", "du", "au", "aux", "mon", "mes", "votre", "bonjour", "bonsoir",
    "salut", "merci", "comment", "oui", "non", "très", "bien", "suis", "c'est", "ça", "allez",
    "va", "beaucoup", "pourquoi", "où", "quand",
];

const ENGLISH_MARKERS: &[&str] = &[
    "the", "is", "are", "was", "were", "with", "from", "this", "that", "and", "for", "not",
    "but", "have", "has", "had", "will", "would", "can", "could", "should", "it", "they", "we",
    "you", "he", "she", "hello", "thanks", "what", "how", "where", "why",
];

const SPANISH_MARKERS: &[&str] = &[
    "el", "los", "las", "está", "esta", "tiene", "por", "para", "pero", "también", "tambien",
    "como", "más", "son", "hay", "ser", "estar", "muy", "todo", "puede", "sobre", "nos", "ese",
    "esa", "estos", "hola", "gracias", "qué", "dónde", "usted",
];

/// Local, network-free general classifier.
pub struct StatisticalClassifier {
    profiles: Vec<MarkerProfile>,
    trigram: Detector,
    trigram_min_confidence: f32,
    degraded: Option<String>,
}

impl StatisticalClassifier {
    /// Build with the built-in profiles.
    pub fn new() -> Self {
        Self::with_profiles(builtin_profiles())
    }

    pub fn with_profiles(profiles: Vec<MarkerProfile>) -> Self {
        Self {
            profiles,
            trigram: Detector::with_allowlist(vec![Lang::Fra, Lang::Eng, Lang::Spa, Lang::Ara]),
            trigram_min_confidence: ClassifierConfig::default().trigram_min_confidence,
            degraded: None,
        }
    }

    /// Trigram verdicts below `min` are reported as unknown.
    pub fn with_trigram_min_confidence(mut self, min: f32) -> Self {
        self.trigram_min_confidence = min;
        self
    }

    /// Build from config. A profile file that fails to load is logged and
    /// leaves the classifier degraded rather than returning an error.
    pub fn from_config(config: &ClassifierConfig) -> Self {
        let classifier = match &config.profiles_path {
            None => Self::new(),
            Some(path) => match load_profiles(path) {
                Ok(profiles) => {
                    tracing::info!(
                        path = %path.display(),
                        count = profiles.len(),
                        "loaded classifier marker profiles"
                    );
                    Self::with_profiles(profiles)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "statistical classifier degraded");
                    Self::degraded(e)
                }
            },
        };
        classifier.with_trigram_min_confidence(config.trigram_min_confidence)
    }

    /// A classifier that failed to initialize.
    pub fn degraded(error: ClassifierError) -> Self {
        Self {
            profiles: Vec::new(),
            trigram: Detector::new(),
            trigram_min_confidence: ClassifierConfig::default().trigram_min_confidence,
            degraded: Some(error.to_string()),
        }
    }

    /// The initialization failure, if degraded.
    pub fn degraded_reason(&self) -> Option<&str> {
        self.degraded.as_deref()
    }

    /// Classify synchronously. Never fails.
    pub fn classify_text(&self, text: &str) -> ClassifierVerdict {
        if self.degraded.is_some() {
            return ClassifierVerdict::unknown(DEGRADED_CONFIDENCE, "degraded");
        }

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return ClassifierVerdict::unknown(0.0, "script");
        }

        // Stage 1: script analysis over alphabetic codepoints
        let mut arabic = 0u32;
        let mut latin = 0u32;
        let mut total_alpha = 0u32;
        for c in trimmed.chars().filter(|c| c.is_alphabetic()) {
            total_alpha += 1;
            if is_arabic_char(c) {
                arabic += 1;
            } else if is_latin_letter(c) {
                latin += 1;
            }
        }

        if total_alpha == 0 {
            return ClassifierVerdict::unknown(0.1, "script");
        }

        let arabic_ratio = arabic as f32 / total_alpha as f32;
        let latin_ratio = latin as f32 / total_alpha as f32;

        if arabic_ratio > 0.5 {
            return ClassifierVerdict::new(
                Language::Arabic,
                (0.70 + arabic_ratio * 0.25).min(0.95),
                "script",
            );
        }

        if latin_ratio > 0.5 {
            return self.classify_latin(trimmed);
        }

        ClassifierVerdict::unknown(0.3, "script")
    }

    /// Stages 2 and 3.
    fn classify_latin(&self, text: &str) -> ClassifierVerdict {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| c.is_whitespace() || c == '-')
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\''))
            .filter(|w| !w.is_empty())
            .collect();
        let word_count = words.len().max(1) as f32;

        // Normalize by word count so longer texts don't inflate any one language
        let mut scores: Vec<(Language, f32)> = self
            .profiles
            .iter()
            .map(|profile| {
                let mut raw = words
                    .iter()
                    .filter(|w| profile.words.iter().any(|m| m == *w))
                    .count() as f32;
                if profile.diacritics.iter().any(|d| lower.contains(*d)) {
                    raw += 2.0;
                }
                if profile.punctuation.iter().any(|p| text.contains(*p)) {
                    raw += 3.0;
                }
                (profile.language, raw / word_count)
            })
            .collect();
        scores.sort_by(|a, b| b.1.total_cmp(&a.1));

        let Some(&(best, best_score)) = scores.first() else {
            return self.trigram_backstop(text);
        };
        if best_score < 0.01 {
            return self.trigram_backstop(text);
        }

        // Close races get lower confidence
        let runner_up = scores.get(1).map(|s| s.1).unwrap_or(0.0);
        let confidence = (0.60 + (best_score - runner_up).min(0.20)).min(0.85);
        ClassifierVerdict::new(best, confidence, "markers")
    }

    fn trigram_backstop(&self, text: &str) -> ClassifierVerdict {
        match self.trigram.detect(text) {
            Some(info) if info.confidence() as f32 >= self.trigram_min_confidence => {
                let language = match info.lang() {
                    Lang::Fra => Language::French,
                    Lang::Eng => Language::English,
                    Lang::Spa => Language::Spanish,
                    Lang::Ara => Language::Arabic,
                    _ => Language::Unknown,
                };
                // Trigram statistics are shaky on chat-length input
                let confidence = (info.confidence() as f32).min(0.55);
                ClassifierVerdict::new(language, confidence, "whatlang")
            }
            Some(info) => {
                tracing::trace!(
                    guess = info.lang().code(),
                    confidence = info.confidence(),
                    "trigram guess too weak"
                );
                ClassifierVerdict::unknown(UNSURE_CONFIDENCE, "whatlang")
            }
            None => ClassifierVerdict::unknown(UNSURE_CONFIDENCE, "whatlang"),
        }
    }
}

impl Default for StatisticalClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneralClassifier for StatisticalClassifier {
    fn name(&self) -> &str {
        "statistical"
    }

    fn classify<'a>(&'a self, text: &'a str) -> BoxFuture<'a, ClassifierResult<ClassifierVerdict>> {
        Box::pin(future::ready(Ok(self.classify_text(text))))
    }
}
