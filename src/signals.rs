//! The five Darija signal extractors.
//!
//! Each extractor is a pure function of the normalized text and the compiled
//! tables held by [`SignalExtractors`], returning a score in `[0, 1]` and the
//! evidence it matched. No extractor depends on another.

use std::collections::HashSet;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::config::DarijaConfig;
use crate::error::{ConfigError, ConfigResult};
use crate::lexicon::Lexicon;
use crate::script::{is_arabic_char, is_latin_letter};

/// Score and evidence from one extractor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalScore {
    pub score: f32,
    /// What matched, without the indicator prefix.
    pub matches: Vec<String>,
}

impl SignalScore {
    fn new(score: f32, matches: Vec<String>) -> Self {
        Self {
            score: score.clamp(0.0, 1.0),
            matches,
        }
    }
}

/// All five signals for one text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalScores {
    pub keywords: SignalScore,
    pub code_switching: SignalScore,
    pub morphological: SignalScore,
    pub idiomatic: SignalScore,
    pub script_mixing: SignalScore,
}

/// Compiled lexical tables plus the normalization constants.
#[derive(Debug, Clone)]
pub struct SignalExtractors {
    keywords: HashSet<String>,
    idioms: Vec<String>,
    code_switch: Vec<Regex>,
    morphology: Vec<Regex>,
    code_switch_per_chars: f32,
    morphology_per_chars: f32,
    idiom_increment: f32,
    script_mix_floor: f32,
}

impl SignalExtractors {
    /// Compile the lexicon's regex tables. Fails on the first invalid pattern.
    pub fn new(lexicon: &Lexicon, config: &DarijaConfig) -> ConfigResult<Self> {
        Ok(Self {
            keywords: lexicon.keywords.iter().map(|k| k.to_lowercase()).collect(),
            idioms: lexicon.idioms.iter().map(|i| i.to_lowercase()).collect(),
            code_switch: compile("code_switch_patterns", &lexicon.code_switch_patterns)?,
            morphology: compile("morphology_patterns", &lexicon.morphology_patterns)?,
            code_switch_per_chars: config.code_switch_per_chars,
            morphology_per_chars: config.morphology_per_chars,
            idiom_increment: config.idiom_increment,
            script_mix_floor: config.script_mix_floor,
        })
    }

    /// Run every extractor.
    pub fn extract(&self, text: &str) -> SignalScores {
        SignalScores {
            keywords: self.keyword_score(text),
            code_switching: self.code_switch_score(text),
            morphological: self.morphology_score(text),
            idiomatic: self.idiom_score(text),
            script_mixing: self.script_mixing_score(text),
        }
    }

    /// Fraction of tokens found in the Darija lexicon.
    pub fn keyword_score(&self, text: &str) -> SignalScore {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return SignalScore::default();
        }

        let mut matched = 0usize;
        let mut seen = Vec::new();
        for token in &tokens {
            if self.keywords.contains(token.as_str()) {
                matched += 1;
                if !seen.contains(token) {
                    seen.push(token.clone());
                }
            }
        }

        SignalScore::new(matched as f32 / tokens.len() as f32, seen)
    }

    /// Code-switch pattern matches per `code_switch_per_chars` characters.
    pub fn code_switch_score(&self, text: &str) -> SignalScore {
        density(&self.code_switch, text, self.code_switch_per_chars)
    }

    /// Affix pattern matches per `morphology_per_chars` characters.
    pub fn morphology_score(&self, text: &str) -> SignalScore {
        density(&self.morphology, text, self.morphology_per_chars)
    }

    /// `idiom_increment` per distinct idiom found as a whole phrase.
    pub fn idiom_score(&self, text: &str) -> SignalScore {
        let lower = text.to_lowercase();
        let found: Vec<String> = self
            .idioms
            .iter()
            .filter(|idiom| contains_phrase(&lower, idiom))
            .cloned()
            .collect();
        SignalScore::new(found.len() as f32 * self.idiom_increment, found)
    }

    /// Share of the minority script among Latin and Arabic letters, counted
    /// only above `script_mix_floor`.
    pub fn script_mixing_score(&self, text: &str) -> SignalScore {
        let latin = text.chars().filter(|c| is_latin_letter(*c)).count();
        let arabic = text.chars().filter(|c| is_arabic_char(*c)).count();
        if latin == 0 || arabic == 0 {
            return SignalScore::default();
        }

        let ratio = latin.min(arabic) as f32 / (latin + arabic) as f32;
        if ratio > self.script_mix_floor {
            SignalScore::new(ratio, vec![format!("{ratio:.2}")])
        } else {
            SignalScore::default()
        }
    }
}

fn compile(table: &str, patterns: &[String]) -> ConfigResult<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .map_err(|e| ConfigError::Regex {
                    table: table.into(),
                    pattern: p.clone(),
                    source: e,
                })
        })
        .collect()
}

fn density(patterns: &[Regex], text: &str, per_chars: f32) -> SignalScore {
    let length = text.chars().count();
    if length == 0 {
        return SignalScore::default();
    }

    let matches: Vec<String> = patterns
        .iter()
        .flat_map(|re| re.find_iter(text).map(|m| m.as_str().to_string()))
        .collect();
    let per_unit = matches.len() as f32 / (length as f32 / per_chars);
    SignalScore::new(per_unit.min(1.0), matches)
}

/// Lowercased whitespace tokens with surrounding punctuation removed.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Whether `phrase` occurs in `haystack` with non-alphanumeric boundaries.
fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    haystack.match_indices(phrase).any(|(start, _)| {
        let end = start + phrase.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_alphanumeric());
        before_ok && after_ok
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractors() -> SignalExtractors {
        SignalExtractors::new(&Lexicon::builtin(), &DarijaConfig::default()).unwrap()
    }

    #[test]
    fn keyword_score_is_fraction_of_tokens() {
        let s = extractors().keyword_score("wach nta mezyan?");
        assert_eq!(s.score, 1.0);
        assert_eq!(s.matches, vec!["wach", "nta", "mezyan"]);

        let half = extractors().keyword_score("wach bonjour");
        assert!((half.score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn keyword_score_matches_arabic_script() {
        let s = extractors().keyword_score("واش نتا مزيان");
        assert_eq!(s.score, 1.0);
    }

    #[test]
    fn keyword_score_zero_for_french() {
        let s = extractors().keyword_score("Bonjour, comment allez-vous?");
        assert_eq!(s.score, 0.0);
        assert!(s.matches.is_empty());
    }

    #[test]
    fn repeated_keyword_counts_once_as_evidence() {
        let s = extractors().keyword_score("wach wach");
        assert_eq!(s.score, 1.0);
        assert_eq!(s.matches, vec!["wach"]);
    }

    #[test]
    fn code_switch_detects_french_pronoun_then_particle() {
        let s = extractors().code_switch_score("je bghit nmchi");
        assert_eq!(s.score, 1.0);
        assert_eq!(s.matches, vec!["je bghit"]);
    }

    #[test]
    fn code_switch_density_scales_with_length() {
        let filler = "x".repeat(400);
        let text = format!("la voiture dyali {filler}");
        let s = extractors().code_switch_score(&text);
        assert!(s.score > 0.0 && s.score < 1.0, "score={}", s.score);
    }

    #[test]
    fn morphology_detects_negation_circumfix() {
        let s = extractors().morphology_score("mabghitch");
        assert!(s.score > 0.0);
        assert!(s.matches.iter().any(|m| m == "mabghitch"));
    }

    #[test]
    fn idiom_requires_whole_phrase() {
        let ex = extractors();
        let s = ex.idiom_score("ghadi nji inchallah");
        assert!((s.score - 0.1).abs() < 1e-6);
        assert_eq!(s.matches, vec!["inchallah"]);

        let none = ex.idiom_score("xinchallahx");
        assert_eq!(none.score, 0.0);
    }

    #[test]
    fn idiom_score_caps_at_one() {
        let cfg = DarijaConfig {
            idiom_increment: 0.6,
            ..Default::default()
        };
        let ex = SignalExtractors::new(&Lexicon::builtin(), &cfg).unwrap();
        let s = ex.idiom_score("bismillah, inchallah, ma3lich");
        assert_eq!(s.score, 1.0);
    }

    #[test]
    fn script_mixing_ignores_loanword_noise() {
        let ex = extractors();
        assert_eq!(ex.script_mixing_score("bonjour").score, 0.0);
        assert_eq!(
            ex.script_mixing_score("je suis vraiment très content و").score,
            0.0
        );
        let mixed = ex.script_mixing_score("ana bghit نمشي");
        assert!(mixed.score > 0.2, "score={}", mixed.score);
    }

    #[test]
    fn invalid_regex_is_config_error() {
        let mut lex = Lexicon::builtin();
        lex.morphology_patterns.push("(unclosed".into());
        let err = SignalExtractors::new(&lex, &DarijaConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Regex { .. }));
    }

    #[test]
    fn all_scores_bounded() {
        let s = extractors().extract("wach 3lach kifach je bghit dyal la voiture dyali inchallah نمشي");
        for v in [
            s.keywords.score,
            s.code_switching.score,
            s.morphological.score,
            s.idiomatic.score,
            s.script_mixing.score,
        ] {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn tokenize_strips_punctuation() {
        assert_eq!(tokenize("Wach, nta?! «mezyan»"), vec!["wach", "nta", "mezyan"]);
        assert_eq!(tokenize("حالك؟"), vec!["حالك"]);
    }
}
