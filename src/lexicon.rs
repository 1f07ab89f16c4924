//! Built-in Darija lexical resources.
//!
//! Word lists, idiom phrases, regex tables, and the Arabic ↔ Latin
//! transliteration table. Everything here is plain data: components receive a
//! [`Lexicon`] at construction and never reach for globals, so a deployment can
//! extend or replace any table from the TOML config.

use serde::{Deserialize, Serialize};

use crate::config::LexiconConfig;

/// One Arabic phoneme and the Latin spelling Arabizi writers use for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transliteration {
    pub arabic: char,
    pub latin: String,
}

/// The complete set of lexical tables the scorers run against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lexicon {
    /// Darija words, Latin-transliterated and Arabic-script, lowercase.
    pub keywords: Vec<String>,
    /// Multi-word idiomatic expressions, lowercase.
    pub idioms: Vec<String>,
    /// Regexes matching French/Darija adjacency (code-switching).
    pub code_switch_patterns: Vec<String>,
    /// Regexes matching Darija verb and possessive affixes.
    pub morphology_patterns: Vec<String>,
    pub transliterations: Vec<Transliteration>,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Lexicon {
    /// The built-in Moroccan lexicon.
    pub fn builtin() -> Self {
        Self {
            keywords: owned(DARIJA_LATIN_KEYWORDS)
                .chain(owned(DARIJA_ARABIC_KEYWORDS))
                .collect(),
            idioms: owned(DARIJA_IDIOMS).collect(),
            code_switch_patterns: owned(CODE_SWITCH_PATTERNS).collect(),
            morphology_patterns: owned(MORPHOLOGY_PATTERNS).collect(),
            transliterations: TRANSLITERATIONS
                .iter()
                .map(|(arabic, latin)| Transliteration {
                    arabic: *arabic,
                    latin: (*latin).to_string(),
                })
                .collect(),
        }
    }

    /// Build from config: the built-in tables plus any configured entries,
    /// or only the configured entries when `replace_builtin` is set.
    pub fn from_config(config: &LexiconConfig) -> Self {
        let mut lexicon = if config.replace_builtin {
            Self {
                keywords: Vec::new(),
                idioms: Vec::new(),
                code_switch_patterns: Vec::new(),
                morphology_patterns: Vec::new(),
                transliterations: Vec::new(),
            }
        } else {
            Self::builtin()
        };

        lexicon
            .keywords
            .extend(config.keywords.iter().map(|k| k.to_lowercase()));
        lexicon
            .idioms
            .extend(config.idioms.iter().map(|i| i.to_lowercase()));
        lexicon
            .code_switch_patterns
            .extend(config.code_switch_patterns.iter().cloned());
        lexicon
            .morphology_patterns
            .extend(config.morphology_patterns.iter().cloned());
        lexicon
            .transliterations
            .extend(config.transliterations.iter().cloned());

        lexicon.keywords.sort();
        lexicon.keywords.dedup();
        lexicon.idioms.dedup();
        lexicon
    }
}

fn owned(words: &'static [&'static str]) -> impl Iterator<Item = String> {
    words.iter().map(|w| (*w).to_string())
}

// ── Keywords ────────────────────────────────────────────────────────────

/// Words that collide with common French or English words ("fin", "sir",
/// "bent", "taxi", "mama") are left out.
const DARIJA_LATIN_KEYWORDS: &[&str] = &[
    // greetings & politeness
    "salam", "slm", "labas", "bikhir", "lbas", "bslama", "mrhba", "marhba", "saha", "sahtek",
    "bsahtek", "3afak", "afak", "llah", "tbarkallah", "hamdullah", "hamdoulilah",
    // question words
    "wach", "wash", "wax", "chno", "chnou", "chnu", "shno", "achno", "kifach", "kifash",
    "kifax", "fayn", "mnin", "imta", "waqtach", "3lach", "3lash", "alach", "chhal",
    "ch7al", "shhal", "chkoun", "chkon", "shkon",
    // pronouns
    "ana", "nta", "nti", "ntia", "howa", "huwa", "hiya", "hia", "7na", "hna", "ntoma",
    "ntouma", "homa", "huma",
    // possession & particles
    "dyal", "dial", "dyali", "diali", "dyalk", "dialk", "dyalek", "dialek", "dyalo", "dialo",
    "dyalha", "dyalna", "dialna", "dyalkom", "dyalhom", "ghir", "gha", "ghadi", "bach", "bash",
    "hta", "7ta", "m3a", "wla", "ila", "ra", "rah", "raha", "rani", "rak", "raki",
    "rahom",
    // negation
    "machi", "mashi", "mach", "makayn", "makaynch", "makaynsh", "walo", "la2", "ma3ndich",
    "mabghitch", "mafhemtch",
    // temporal
    "daba", "db", "ghda", "ghdda", "lbar7", "lbareh", "lyoum", "lyom", "dima", "ba9i", "baqi",
    "mazal", "mzal", "3ad", "tal", "chi", "shi", "sa3a", "chwiya", "shwiya", "chwia",
    // verbs & states
    "bghit", "bghiti", "bghina", "bgha", "kanbghi", "kanbghik", "kan", "kant", "kayn", "kayna",
    "kaynin", "kat", "mzyan", "mezyan", "mzian", "mziana", "zwin", "zwina", "khayb", "khayba",
    "bzaf", "bezzaf", "bzzaf", "wakha", "waxa", "waxxa", "safi", "yallah", "siri",
    "aji", "ajiw", "gol", "goul", "golih", "3raft", "3ref", "kan3ref", "fhamt", "fhemti",
    "nta3", "ta3", "dakchi", "hadchi", "hadak", "hadik", "hada", "hadi", "hadou",
    // kinship
    "khoya", "khouya", "khti", "khtí", "wlidi", "lwalida", "lwalid", "mmi", "bba", "3mi",
    "3amti", "khali", "khalti", "drari", "drri", "wlad", "sa7bi", "sahbi", "zwja",
    // food, commerce, transport
    "khobz", "atay", "lhout", "l7out", "lham", "l7em", "flous", "flouss", "floos", "hanout",
    "l7anout", "souk", "sou9", "tobis", "tomobil", "tonobil", "tran", "lmdina", "derb",
    "tajine", "couscous", "harira", "msemen", "bghrir", "chriha", "ghali", "rkhis",
];

const DARIJA_ARABIC_KEYWORDS: &[&str] = &[
    "واش", "شنو", "شنوا", "اشنو", "كيفاش", "فين", "منين", "إمتى", "امتى", "علاش", "شحال",
    "شكون", "بزاف", "مزيان", "مزيانة", "زوين", "زوينة", "خايب", "دابا", "غدا", "البارح", "ديما",
    "باقي", "مازال", "ديال", "ديالي", "ديالك", "ديالو", "ديالها", "ديالنا", "ديالكم", "ديالهم",
    "غير", "غادي", "باش", "حتى", "معا", "راه", "راها", "راني", "راك", "بغيت", "بغيتي", "كنبغي",
    "كاين", "كاينة", "ماكاينش", "مكاينش", "ماشي", "والو", "واخا", "صافي", "يالاه", "سير",
    "أجي", "اجي", "نتا", "نتي", "نتوما", "هوما", "حنا", "خويا", "ختي", "الوالدة", "الوالد",
    "الدراري", "صاحبي", "أتاي", "الحوت", "الخبز", "فلوس", "الحانوت", "الطوبيس", "الطوموبيل",
    "شوية", "دكشي", "هادشي", "هادا", "هادي", "لاباس", "بسلامة", "عافاك", "تبارك",
];

// ── Idioms ──────────────────────────────────────────────────────────────

const DARIJA_IDIOMS: &[&str] = &[
    // religious formulae
    "inchallah", "incha allah", "in sha allah", "nchallah", "hamdullah", "lhamdulillah",
    "bismillah", "tbarkallah", "allah ybarek", "allah y3awn", "allah y3awnek", "allah yhfdek",
    "allah yrhmo", "allah yrhm lwalidin", "allah ysahel", "allah yhdik",
    // politeness markers
    "bla mzya", "bla jmil", "smh liya", "smhli", "smeh liya", "3afak", "bsahtek", "bssahtek",
    "bsa7tek", "3la slamtek", "mabrouk 3lik", "lah ykhlik", "lah ykhalik",
    // agreement & disagreement
    "wakha a sahbi", "safi hakka", "machi mochkil", "ma3lich", "ma kayn mochkil",
    "kolchi mzyan", "labas 3lik", "ila bghiti", "hadchi li kayn", "ma3ndi ma ndir",
    "nta li kat9ol", "wa9ila",
    // Arabic script
    "إن شاء الله", "ان شاء الله", "الحمد لله", "بسم الله", "تبارك الله", "الله يبارك",
    "الله يعاون", "الله يحفظك", "الله يرحم الوالدين", "بالصحة", "بلا مزية", "سمح ليا",
    "معليش", "ما كاين مشكل", "ماشي مشكل", "على سلامتك", "الله يخليك", "كلشي مزيان",
];

// ── Regex tables ────────────────────────────────────────────────────────

/// French/Darija adjacency. Compiled case-insensitive.
const CODE_SWITCH_PATTERNS: &[&str] = &[
    // French subject pronoun followed by a Darija particle or verb
    r"\b(?:je|tu|il|elle|on|nous|vous|ils|elles)\s+(?:dyal|dial|ghir|bghit|bghiti|kayn|kan|kant|machi|mashi|ghadi)\b",
    // French determiner + noun + Darija possessive ("la voiture dyali")
    r"\b(?:le|la|les|un|une|des|ce|cette)\s+\w+\s+(?:dyal|dial|dyali|diali|dyalk|dialk|dyalna|dialna|dyalo|dialo)\b",
    // Darija possessive before a French determiner
    r"\b(?:dyal|dial)\s+(?:le|la|les|l'|mon|ma|mes|ton|ta|tes|notre|votre)\b",
    // Darija question word followed by a French clause
    r"\b(?:wach|wash|3lach|kifach|chno|fayn)\s+(?:tu|vous|il|elle|on|c'est|ça|ca)\b",
    // French copula followed by a Darija adjective
    r"\b(?:c'est|ça|ca|très|trop)\s+(?:mzyan|mezyan|zwin|zwina|khayb|bzaf|bezzaf|ghali)\b",
    // Darija quantifier followed by a French partitive
    r"\b(?:bzaf|bezzaf|bzzaf|chwiya|shwiya)\s+(?:de|des|du|d')",
    // French connective followed by a Darija pronoun or adverb
    r"\b(?:mais|parce que|donc|alors|puis|et)\s+(?:ana|nta|nti|howa|hiya|hna|homa|daba|wakha|safi)\b",
    // Script switch inside one utterance
    r"\p{Arabic}{2,}\s+[a-z]{2,}",
    r"[a-z]{2,}\s+\p{Arabic}{2,}",
];

/// Darija affixes. Compiled case-insensitive.
const MORPHOLOGY_PATTERNS: &[&str] = &[
    // imperfective prefixes ka-/ta- with person marker: kanbghi, kat3ref, taymchi
    r"\b(?:ka|ta)[nty][a-z0-9]{2,}\b",
    // negation circumfix ma-...-ch: mabghitch, makaynch
    r"\bma[a-z0-9]{2,}(?:ch|sh)\b",
    // prohibitive la-...-ch: latkhafch
    r"\bla[a-z0-9]{2,}(?:ch|sh)\b",
    // perfective suffixes: bghit, bghina, mchaw, ja, klitu
    r"\b[a-z0-9]{2,}(?:it|iti|ina|na|tu|tiw)\b",
    r"\b[a-z0-9]*[379][a-z0-9]*(?:at|u|w)\b",
    // possessive suffixes on dyal: dyali, dyalek, dyalkom
    r"\b(?:dyal|dial)(?:i|ek|k|o|ha|na|kom|hom)\b",
    // Arabic-script imperfective prefixes: كنبغي, كتعرف, كيمشي
    r"\b(?:كن|كت|كي|تن|تي)\p{Arabic}{2,}",
    // Arabic-script negation circumfix: ماكاينش, مابغيتش
    r"\bما?\p{Arabic}{2,}ش\b",
    // Arabic-script possessive particle with suffix
    r"\bديال(?:ي|ك|و|ها|نا|كم|هم)\b",
];

// ── Transliteration ─────────────────────────────────────────────────────

/// Arabic phoneme ↔ Arabizi spelling.
const TRANSLITERATIONS: &[(char, &str)] = &[
    ('ع', "3"),
    ('ح', "7"),
    ('ق', "9"),
    ('ء', "2"),
    ('خ', "5"),
    ('خ', "kh"),
    ('غ', "gh"),
    ('ش', "ch"),
    ('ش', "sh"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_keywords_cover_both_scripts() {
        let lex = Lexicon::builtin();
        assert!(lex.keywords.iter().any(|k| k == "wach"));
        assert!(lex.keywords.iter().any(|k| k == "واش"));
    }

    #[test]
    fn builtin_keywords_avoid_french_collisions() {
        let lex = Lexicon::builtin();
        for french in ["bonjour", "comment", "vous", "allez", "taxi", "mama"] {
            assert!(
                !lex.keywords.iter().any(|k| k == french),
                "{french} should not be a Darija keyword"
            );
        }
    }

    #[test]
    fn config_extends_builtin_tables() {
        let cfg = LexiconConfig {
            keywords: vec!["Zaz".into()],
            ..Default::default()
        };
        let lex = Lexicon::from_config(&cfg);
        assert!(lex.keywords.iter().any(|k| k == "zaz"));
        assert!(lex.keywords.iter().any(|k| k == "wach"));
    }

    #[test]
    fn config_can_replace_builtin_tables() {
        let cfg = LexiconConfig {
            replace_builtin: true,
            keywords: vec!["zaz".into()],
            ..Default::default()
        };
        let lex = Lexicon::from_config(&cfg);
        assert_eq!(lex.keywords, vec!["zaz".to_string()]);
        assert!(lex.idioms.is_empty());
    }
}
