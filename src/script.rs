//! Script analysis: per-character script ratios, cross-script tokens, and
//! Arabizi transliteration digraphs.
//!
//! Codepoints are bucketed by Unicode block:
//!
//! - **Latin**: Basic Latin letters, Latin-1 Supplement, Extended-A/B, Extended Additional
//! - **Arabic**: Arabic, Arabic Supplement, Extended-A, Presentation Forms A/B
//! - **Numeric**: ASCII digits and Arabic-Indic / Extended Arabic-Indic digits
//! - **Other**: everything else that is not whitespace (punctuation, emoji, ...)

use serde::{Deserialize, Serialize};

use crate::language::Script;
use crate::lexicon::Transliteration;

/// A ratio above this makes a script a dominant candidate.
const DOMINANT_RATIO: f32 = 0.3;
/// The other major script must stay below this for dominance; both above it
/// makes the text mixed.
const PRESENCE_RATIO: f32 = 0.1;

/// Which way a transliteration pattern was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// The Latin spelling appeared (e.g. `3` in `3lach`).
    Latin,
    /// The Arabic letter appeared.
    Arabic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransliterationMatch {
    pub arabic: char,
    pub latin: String,
    pub direction: Direction,
}

/// Script profile of a text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptAnalysis {
    pub latin_ratio: f32,
    pub arabic_ratio: f32,
    pub numeric_ratio: f32,
    pub other_ratio: f32,
    pub latin_chars: usize,
    pub arabic_chars: usize,
    pub dominant_script: Script,
    /// Whitespace-delimited tokens containing both Latin and Arabic letters.
    pub mixed_tokens: Vec<String>,
    pub transliteration_patterns: Vec<TransliterationMatch>,
    pub is_bi_script: bool,
}

impl ScriptAnalysis {
    fn empty() -> Self {
        Self {
            latin_ratio: 0.0,
            arabic_ratio: 0.0,
            numeric_ratio: 0.0,
            other_ratio: 0.0,
            latin_chars: 0,
            arabic_chars: 0,
            dominant_script: Script::Unknown,
            mixed_tokens: Vec::new(),
            transliteration_patterns: Vec::new(),
            is_bi_script: false,
        }
    }

    /// Latin-direction transliterations, i.e. Arabizi spellings.
    pub fn arabizi_patterns(&self) -> impl Iterator<Item = &TransliterationMatch> {
        self.transliteration_patterns
            .iter()
            .filter(|m| m.direction == Direction::Latin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Latin,
    Arabic,
    Numeric,
    Other,
}

fn classify(c: char) -> CharClass {
    match c {
        '0'..='9' | '\u{0660}'..='\u{0669}' | '\u{06F0}'..='\u{06F9}' => CharClass::Numeric,
        'A'..='Z'
        | 'a'..='z'
        | '\u{00C0}'..='\u{00D6}'
        | '\u{00D8}'..='\u{00F6}'
        | '\u{00F8}'..='\u{024F}'
        | '\u{1E00}'..='\u{1EFF}' => CharClass::Latin,
        '\u{0600}'..='\u{06FF}'
        | '\u{0750}'..='\u{077F}'
        | '\u{08A0}'..='\u{08FF}'
        | '\u{FB50}'..='\u{FDFF}'
        | '\u{FE70}'..='\u{FEFF}' => CharClass::Arabic,
        _ => CharClass::Other,
    }
}

pub(crate) fn is_latin_letter(c: char) -> bool {
    classify(c) == CharClass::Latin
}

pub(crate) fn is_arabic_char(c: char) -> bool {
    classify(c) == CharClass::Arabic
}

/// Script analyzer over a fixed transliteration table.
#[derive(Debug, Clone)]
pub struct ScriptAnalyzer {
    transliterations: Vec<Transliteration>,
}

impl ScriptAnalyzer {
    pub fn new(transliterations: Vec<Transliteration>) -> Self {
        Self { transliterations }
    }

    /// Analyze a (normalized) text. Pure and deterministic.
    pub fn analyze(&self, text: &str) -> ScriptAnalysis {
        let mut latin = 0usize;
        let mut arabic = 0usize;
        let mut numeric = 0usize;
        let mut other = 0usize;

        for c in text.chars().filter(|c| !c.is_whitespace()) {
            match classify(c) {
                CharClass::Latin => latin += 1,
                CharClass::Arabic => arabic += 1,
                CharClass::Numeric => numeric += 1,
                CharClass::Other => other += 1,
            }
        }

        let total = latin + arabic + numeric + other;
        if total == 0 {
            return ScriptAnalysis::empty();
        }

        let ratio = |n: usize| n as f32 / total as f32;
        let latin_ratio = ratio(latin);
        let arabic_ratio = ratio(arabic);

        let mixed_tokens: Vec<String> = text
            .split_whitespace()
            .filter(|token| {
                token.chars().any(is_latin_letter) && token.chars().any(is_arabic_char)
            })
            .map(str::to_string)
            .collect();

        let is_bi_script = (latin_ratio > PRESENCE_RATIO && arabic_ratio > PRESENCE_RATIO)
            || !mixed_tokens.is_empty();

        ScriptAnalysis {
            latin_ratio,
            arabic_ratio,
            numeric_ratio: ratio(numeric),
            other_ratio: ratio(other),
            latin_chars: latin,
            arabic_chars: arabic,
            dominant_script: dominant_script(latin_ratio, arabic_ratio),
            mixed_tokens,
            transliteration_patterns: self.find_transliterations(text),
            is_bi_script,
        }
    }

    /// Record each table entry observed in either direction, once per direction.
    fn find_transliterations(&self, text: &str) -> Vec<TransliterationMatch> {
        let lower = text.to_lowercase();
        let tokens: Vec<&str> = lower.split_whitespace().collect();
        let mut found = Vec::new();

        for entry in &self.transliterations {
            if !entry.latin.is_empty() && tokens.iter().any(|t| latin_spelling_in(t, &entry.latin))
            {
                found.push(TransliterationMatch {
                    arabic: entry.arabic,
                    latin: entry.latin.clone(),
                    direction: Direction::Latin,
                });
            }
            if lower.contains(entry.arabic) {
                let already = found
                    .iter()
                    .any(|m| m.arabic == entry.arabic && m.direction == Direction::Arabic);
                if !already {
                    found.push(TransliterationMatch {
                        arabic: entry.arabic,
                        latin: entry.latin.clone(),
                        direction: Direction::Arabic,
                    });
                }
            }
        }

        found
    }
}

impl Default for ScriptAnalyzer {
    fn default() -> Self {
        Self::new(crate::lexicon::Lexicon::builtin().transliterations)
    }
}

fn dominant_script(latin_ratio: f32, arabic_ratio: f32) -> Script {
    if latin_ratio > DOMINANT_RATIO && arabic_ratio < PRESENCE_RATIO {
        Script::Latin
    } else if arabic_ratio > DOMINANT_RATIO && latin_ratio < PRESENCE_RATIO {
        Script::Arabic
    } else if latin_ratio > 0.0 || arabic_ratio > 0.0 {
        Script::Mixed
    } else {
        Script::Unknown
    }
}

/// Unit and ordinal suffixes written straight after a number (`3h`, `9min`,
/// `5dh`, `2e`).
const NUMBER_SUFFIXES: &[&str] = &[
    "h", "min", "mn", "s", "am", "pm", "km", "m", "cm", "mm", "kg", "g", "l", "dh", "e", "er",
    "ere", "ème", "eme",
];

/// Whether `spelling` occurs inside a Latin-script token.
///
/// Digit spellings (`3`, `7`, `9`) only count when attached to a Latin
/// letter, so plain numbers like `2024` are not mistaken for Arabizi.
/// Numbers carrying a unit or ordinal suffix (`3h30`, `15min`) do not count
/// either.
fn latin_spelling_in(token: &str, spelling: &str) -> bool {
    if !token.chars().any(is_latin_letter) {
        return false;
    }
    if spelling.chars().all(|c| c.is_ascii_digit()) {
        if is_suffixed_number(token) {
            return false;
        }
        let chars: Vec<char> = token.chars().collect();
        let digit_len = spelling.chars().count();
        return chars.windows(digit_len).enumerate().any(|(i, window)| {
            let matches = window.iter().copied().eq(spelling.chars());
            let before = i.checked_sub(1).map(|j| chars[j]);
            let after = chars.get(i + digit_len).copied();
            matches
                && (before.is_some_and(is_latin_letter) || after.is_some_and(is_latin_letter))
        });
    }
    token.contains(spelling)
}

/// Digits, then a known suffix, then optionally more digits.
fn is_suffixed_number(token: &str) -> bool {
    let token = token.trim_matches(|c: char| !c.is_alphanumeric());
    let rest = token.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() == token.len() {
        return false;
    }
    let suffix = rest.trim_end_matches(|c: char| c.is_ascii_digit());
    NUMBER_SUFFIXES.contains(&suffix)
}
