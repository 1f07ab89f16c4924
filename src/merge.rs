//! Decision merger: the tie-break ladder combining the Darija scorer, the
//! general classifier, and script analysis into one verdict.
//!
//! Rules are evaluated in order and the first match wins. Order encodes
//! precedence; a later rule never overrides an earlier one on confidence.

use crate::classifier::ClassifierVerdict;
use crate::config::MergerConfig;
use crate::darija::DarijaScore;
use crate::language::{DetectionDetails, DetectionResult, Language, Script, Source};
use crate::script::ScriptAnalysis;

/// Which rule decided a merged verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
    /// The Darija scorer crossed its own threshold.
    ScorerThreshold,
    /// Darija evidence, general says Arabic, and the text is bi-script.
    ArabicBiScript,
    /// Darija evidence backed by several indicators and script/Arabic support.
    SupportedIndicators,
    /// The general classifier is unsure and Darija evidence exists.
    WeakGeneral,
    /// Many indicators on their own.
    ManyIndicators,
    /// Several indicators with moderate Darija confidence.
    SomeIndicators,
    /// The general classifier's verdict passed through.
    General,
}

impl MergeRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScorerThreshold => "scorer_threshold",
            Self::ArabicBiScript => "arabic_bi_script",
            Self::SupportedIndicators => "supported_indicators",
            Self::WeakGeneral => "weak_general",
            Self::ManyIndicators => "many_indicators",
            Self::SomeIndicators => "some_indicators",
            Self::General => "general",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DecisionMerger {
    config: MergerConfig,
}

impl DecisionMerger {
    pub fn new(config: MergerConfig) -> Self {
        Self { config }
    }

    /// Pick the rule that applies, with the confidence floor it carries.
    pub fn decide(
        &self,
        darija: &DarijaScore,
        general: &ClassifierVerdict,
        script: &ScriptAnalysis,
    ) -> (MergeRule, f32) {
        let c = &self.config;
        let conf = darija.confidence;
        let indicators = darija.indicator_count();
        let general_arabic = general.language == Language::Arabic;

        if darija.is_darija {
            return (MergeRule::ScorerThreshold, 0.0);
        }
        if conf > c.arabic_biscript_min && general_arabic && script.is_bi_script {
            return (MergeRule::ArabicBiScript, c.floors.arabic_biscript);
        }
        if conf > c.supported_min
            && indicators >= c.supported_indicators
            && (script.is_bi_script || general_arabic)
        {
            return (MergeRule::SupportedIndicators, c.floors.supported);
        }
        if general.confidence < c.weak_general_max
            && conf > c.weak_general_darija_min
            && indicators >= c.weak_general_indicators
        {
            return (MergeRule::WeakGeneral, c.floors.weak_general);
        }
        if indicators >= c.many_indicators && conf > c.many_indicators_min {
            return (MergeRule::ManyIndicators, c.floors.many_indicators);
        }
        if indicators >= c.some_indicators && conf > c.some_indicators_min {
            return (MergeRule::SomeIndicators, c.floors.some_indicators);
        }
        (MergeRule::General, 0.0)
    }

    /// Merge into a result tagged with `source`. Timing is filled in by the caller.
    pub fn merge(
        &self,
        darija: DarijaScore,
        general: ClassifierVerdict,
        script: ScriptAnalysis,
        source: Source,
    ) -> DetectionResult {
        let (rule, floor) = self.decide(&darija, &general, &script);

        let (language, confidence) = match rule {
            MergeRule::General => (general.language, general.confidence),
            _ => (Language::Darija, darija.confidence.max(floor)),
        };

        tracing::debug!(
            rule = rule.as_str(),
            language = %language,
            confidence,
            darija_confidence = darija.confidence,
            general = %general.language,
            "merged verdict"
        );

        build(language, confidence, rule, darija, general, script, source)
    }

    /// Wrap a verdict that bypasses the ladder (an accepted remote verdict)
    /// with the same diagnostics a merged one carries.
    pub fn annotate(
        &self,
        darija: DarijaScore,
        verdict: ClassifierVerdict,
        script: ScriptAnalysis,
        source: Source,
    ) -> DetectionResult {
        build(
            verdict.language,
            verdict.confidence,
            MergeRule::General,
            darija,
            verdict,
            script,
            source,
        )
    }
}

#[allow(clippy::too_many_arguments)]
fn build(
    language: Language,
    confidence: f32,
    rule: MergeRule,
    darija: DarijaScore,
    general: ClassifierVerdict,
    script: ScriptAnalysis,
    source: Source,
) -> DetectionResult {
    let script_tag = if script.latin_chars + script.arabic_chars == 0 {
        Script::Unknown
    } else {
        script.dominant_script
    };

    let mut indicators = darija.indicators.clone();
    indicators.extend(
        script
            .arabizi_patterns()
            .map(|m| format!("transliteration:{}", m.latin)),
    );

    DetectionResult {
        language,
        confidence: DetectionResult::clamp_confidence(confidence),
        script: script_tag,
        source,
        processing_time_ms: 0.0,
        indicators,
        error: None,
        fallback_reason: None,
        details: Some(DetectionDetails {
            general_language: general.language,
            general_confidence: general.confidence,
            rule: (rule != MergeRule::General).then(|| rule.as_str().to_string()),
            darija,
            script,
        }),
    }
}

impl Default for DecisionMerger {
    fn default() -> Self {
        Self::new(MergerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::SignalScores;

    fn darija(confidence: f32, indicators: usize) -> DarijaScore {
        DarijaScore {
            is_darija: confidence >= 0.65,
            confidence,
            indicators: (0..indicators).map(|i| format!("keyword:k{i}")).collect(),
            signals: SignalScores::default(),
        }
    }

    fn general(language: Language, confidence: f32) -> ClassifierVerdict {
        ClassifierVerdict::new(language, confidence, "test")
    }

    fn script(bi: bool) -> ScriptAnalysis {
        let mut s = crate::script::ScriptAnalyzer::default().analyze(if bi {
            "ana bghit نمشي"
        } else {
            "bonjour tout le monde"
        });
        s.is_bi_script = bi;
        s
    }

    fn rule(d: DarijaScore, g: ClassifierVerdict, s: ScriptAnalysis) -> MergeRule {
        DecisionMerger::default().decide(&d, &g, &s).0
    }

    #[test]
    fn scorer_threshold_wins_first() {
        assert_eq!(
            rule(darija(0.7, 0), general(Language::French, 0.9), script(false)),
            MergeRule::ScorerThreshold
        );
    }

    #[test]
    fn rule_one_arabic_bi_script() {
        assert_eq!(
            rule(darija(0.36, 0), general(Language::Arabic, 0.9), script(true)),
            MergeRule::ArabicBiScript
        );
        // Not bi-script: falls through
        assert_eq!(
            rule(darija(0.36, 0), general(Language::Arabic, 0.9), script(false)),
            MergeRule::General
        );
    }

    #[test]
    fn rule_two_supported_indicators() {
        assert_eq!(
            rule(darija(0.26, 3), general(Language::Arabic, 0.9), script(false)),
            MergeRule::SupportedIndicators
        );
    }

    #[test]
    fn rule_three_weak_general() {
        assert_eq!(
            rule(darija(0.31, 2), general(Language::English, 0.5), script(false)),
            MergeRule::WeakGeneral
        );
        assert_eq!(
            rule(darija(0.31, 2), general(Language::English, 0.7), script(false)),
            MergeRule::General
        );
    }

    #[test]
    fn rule_four_many_indicators() {
        assert_eq!(
            rule(darija(0.21, 5), general(Language::French, 0.8), script(false)),
            MergeRule::ManyIndicators
        );
    }

    #[test]
    fn rule_five_some_indicators() {
        assert_eq!(
            rule(darija(0.26, 3), general(Language::French, 0.8), script(false)),
            MergeRule::SomeIndicators
        );
        assert_eq!(
            rule(darija(0.24, 4), general(Language::French, 0.8), script(false)),
            MergeRule::General
        );
    }

    #[test]
    fn general_verdict_passes_through_verbatim() {
        let r = DecisionMerger::default().merge(
            darija(0.05, 0),
            general(Language::French, 0.8),
            script(false),
            Source::LocalRules,
        );
        assert_eq!(r.language, Language::French);
        assert_eq!(r.confidence, 0.8);
        assert_eq!(r.script, Script::Latin);
        let details = r.details.unwrap();
        assert_eq!(details.rule, None);
        assert_eq!(details.general_language, Language::French);
    }

    #[test]
    fn darija_verdict_reports_rule_floor() {
        let r = DecisionMerger::default().merge(
            darija(0.45, 3),
            general(Language::English, 0.4),
            script(false),
            Source::LocalRules,
        );
        assert_eq!(r.language, Language::Darija);
        assert_eq!(r.confidence, 0.70);
        assert_eq!(r.details.unwrap().rule.as_deref(), Some("weak_general"));
    }

    #[test]
    fn arabizi_patterns_become_indicators() {
        let s = crate::script::ScriptAnalyzer::default().analyze("3lach khoya");
        let r = DecisionMerger::default().merge(
            darija(0.1, 0),
            general(Language::Unknown, 0.2),
            s,
            Source::LocalRules,
        );
        assert!(r.indicators.contains(&"transliteration:3".to_string()));
        assert!(r.indicators.contains(&"transliteration:kh".to_string()));
    }

    #[test]
    fn annotate_keeps_verdict_and_adds_diagnostics() {
        let r = DecisionMerger::default().annotate(
            darija(0.5, 4),
            general(Language::Arabic, 0.97),
            script(false),
            Source::RemoteModel,
        );
        assert_eq!(r.language, Language::Arabic);
        assert_eq!(r.confidence, 0.97);
        assert_eq!(r.source, Source::RemoteModel);
        assert_eq!(r.indicators.len(), 4);
        assert_eq!(r.details.unwrap().rule, None);
    }
}
