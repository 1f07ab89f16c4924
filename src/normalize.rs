//! Text normalization ahead of script analysis and scoring.
//!
//! Composes to NFC, drops zero-width and bidi control characters, strips
//! Arabic diacritics (tashkil) and tatweel, and collapses whitespace runs.
//! Also splits utterances into sentences for per-sentence detection.

use unicode_normalization::UnicodeNormalization;

/// Normalize an utterance. Total and pure.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for c in text.nfc() {
        if is_invisible(c) || is_arabic_diacritic(c) || c == '\u{0640}' {
            continue;
        }
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }

    out
}

/// Zero-width, joiner, directional, and other format characters.
fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}'              // soft hyphen
        | '\u{061C}'            // Arabic letter mark
        | '\u{180E}'            // Mongolian vowel separator
        | '\u{200B}'..='\u{200F}'
        | '\u{202A}'..='\u{202E}'
        | '\u{2060}'..='\u{2064}'
        | '\u{2066}'..='\u{2069}'
        | '\u{FEFF}'
    ) || (c.is_control() && !c.is_whitespace())
}

/// Arabic harakat, tanwin, shadda, sukun, and Quranic annotation marks.
pub(crate) fn is_arabic_diacritic(c: char) -> bool {
    matches!(
        c,
        '\u{0610}'..='\u{061A}'
        | '\u{064B}'..='\u{065F}'
        | '\u{0670}'
        | '\u{06D6}'..='\u{06DC}'
        | '\u{06DF}'..='\u{06E4}'
        | '\u{06E7}'
        | '\u{06E8}'
        | '\u{06EA}'..='\u{06ED}'
    )
}

/// Split text at Latin and Arabic sentence terminators, keeping the
/// terminator with its sentence. Blank pieces are dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        current.push(c);
        if is_sentence_end(c) {
            push_trimmed(&mut sentences, &current);
            current.clear();
        }
    }
    push_trimmed(&mut sentences, &current);

    sentences
}

fn push_trimmed(sentences: &mut Vec<String>, piece: &str) {
    let trimmed = piece.trim();
    // A run of terminators ("?!") belongs to the previous sentence
    if trimmed.chars().all(is_sentence_end) {
        if let Some(last) = sentences.last_mut() {
            last.push_str(trimmed);
        }
        return;
    }
    sentences.push(trimmed.to_string());
}

fn is_sentence_end(c: char) -> bool {
    matches!(
        c,
        '.' | '!' | '?' |
        '\u{061F}' |  // ؟ Arabic question mark
        '\u{06D4}' |  // ۔ Arabic full stop
        '\u{2026}' // … ellipsis
    )
}
