//! Detector configuration, persisted as TOML.
//!
//! Every weight, threshold, and table the pipeline uses lives here so that
//! calibration happens in config files rather than in code. All fields have
//! serde defaults, so a partial file (or an empty one) is valid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::lexicon::Transliteration;

/// Top-level configuration for [`Detector`](crate::detector::Detector).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Inputs shorter than this (in characters, after normalization) are rejected.
    #[serde(default = "default_min_length")]
    pub min_length: usize,
    #[serde(default)]
    pub darija: DarijaConfig,
    #[serde(default)]
    pub lexicon: LexiconConfig,
    #[serde(default)]
    pub merger: MergerConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_min_length() -> usize {
    2
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            darija: DarijaConfig::default(),
            lexicon: LexiconConfig::default(),
            merger: MergerConfig::default(),
            classifier: ClassifierConfig::default(),
            cache: CacheConfig::default(),
            remote: RemoteConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl DetectorConfig {
    /// Load from a TOML file and validate.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config = Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })?;
        Ok(config)
    }

    /// Parse from a TOML string and validate.
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<string>".into(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Render as pretty TOML.
    pub fn to_toml(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: "<string>".into(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = self.to_toml()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Check ranges. Regex tables are validated when compiled.
    pub fn validate(&self) -> ConfigResult<()> {
        self.darija.validate()?;
        self.merger.validate()?;
        self.remote.validate()?;
        unit_interval(
            "classifier.trigram_min_confidence",
            self.classifier.trigram_min_confidence,
        )?;
        if self.cache.capacity == 0 {
            return Err(invalid("cache.capacity", "must be > 0"));
        }
        if self.telemetry.queue_capacity == 0 {
            return Err(invalid("telemetry.queue_capacity", "must be > 0"));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.into(),
        message: message.into(),
    }
}

fn unit_interval(field: &str, value: f32) -> ConfigResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, format!("{value} is outside [0, 1]")))
    }
}

// ---------------------------------------------------------------------------
// Darija scorer
// ---------------------------------------------------------------------------

/// Weights of the five Darija signals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DarijaWeights {
    #[serde(default = "default_keywords_weight")]
    pub keywords: f32,
    #[serde(default = "default_code_switching_weight")]
    pub code_switching: f32,
    #[serde(default = "default_morphological_weight")]
    pub morphological: f32,
    #[serde(default = "default_idiomatic_weight")]
    pub idiomatic: f32,
    #[serde(default = "default_script_mixing_weight")]
    pub script_mixing: f32,
}

fn default_keywords_weight() -> f32 {
    0.45
}
fn default_code_switching_weight() -> f32 {
    0.30
}
fn default_morphological_weight() -> f32 {
    0.15
}
fn default_idiomatic_weight() -> f32 {
    0.08
}
fn default_script_mixing_weight() -> f32 {
    0.02
}

impl Default for DarijaWeights {
    fn default() -> Self {
        Self {
            keywords: default_keywords_weight(),
            code_switching: default_code_switching_weight(),
            morphological: default_morphological_weight(),
            idiomatic: default_idiomatic_weight(),
            script_mixing: default_script_mixing_weight(),
        }
    }
}

impl DarijaWeights {
    pub fn sum(&self) -> f32 {
        self.keywords + self.code_switching + self.morphological + self.idiomatic + self.script_mixing
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DarijaConfig {
    #[serde(default)]
    pub weights: DarijaWeights,
    /// Confidence at or above which the scorer alone declares Darija.
    #[serde(default = "default_darija_threshold")]
    pub threshold: f32,
    /// Code-switch matches are counted per this many characters.
    #[serde(default = "default_code_switch_per_chars")]
    pub code_switch_per_chars: f32,
    /// Morphology matches are counted per this many characters.
    #[serde(default = "default_morphology_per_chars")]
    pub morphology_per_chars: f32,
    /// Score added per idiom found.
    #[serde(default = "default_idiom_increment")]
    pub idiom_increment: f32,
    /// Minority-script share below which mixing is treated as loanword noise.
    #[serde(default = "default_script_mix_floor")]
    pub script_mix_floor: f32,
}

fn default_darija_threshold() -> f32 {
    0.65
}
fn default_code_switch_per_chars() -> f32 {
    100.0
}
fn default_morphology_per_chars() -> f32 {
    50.0
}
fn default_idiom_increment() -> f32 {
    0.1
}
fn default_script_mix_floor() -> f32 {
    0.2
}

impl Default for DarijaConfig {
    fn default() -> Self {
        Self {
            weights: DarijaWeights::default(),
            threshold: default_darija_threshold(),
            code_switch_per_chars: default_code_switch_per_chars(),
            morphology_per_chars: default_morphology_per_chars(),
            idiom_increment: default_idiom_increment(),
            script_mix_floor: default_script_mix_floor(),
        }
    }
}

impl DarijaConfig {
    fn validate(&self) -> ConfigResult<()> {
        let w = &self.weights;
        unit_interval("darija.weights.keywords", w.keywords)?;
        unit_interval("darija.weights.code_switching", w.code_switching)?;
        unit_interval("darija.weights.morphological", w.morphological)?;
        unit_interval("darija.weights.idiomatic", w.idiomatic)?;
        unit_interval("darija.weights.script_mixing", w.script_mixing)?;
        let sum = w.sum();
        if sum <= 0.0 || sum > 1.0 + 1e-4 {
            return Err(invalid(
                "darija.weights",
                format!("weights sum to {sum}, expected (0, 1]"),
            ));
        }
        unit_interval("darija.threshold", self.threshold)?;
        unit_interval("darija.idiom_increment", self.idiom_increment)?;
        unit_interval("darija.script_mix_floor", self.script_mix_floor)?;
        if self.code_switch_per_chars <= 0.0 {
            return Err(invalid("darija.code_switch_per_chars", "must be > 0"));
        }
        if self.morphology_per_chars <= 0.0 {
            return Err(invalid("darija.morphology_per_chars", "must be > 0"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Lexicon overrides
// ---------------------------------------------------------------------------

/// Additional (or replacement) lexical tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LexiconConfig {
    /// Use only the entries below instead of extending the built-ins.
    #[serde(default)]
    pub replace_builtin: bool,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub idioms: Vec<String>,
    #[serde(default)]
    pub code_switch_patterns: Vec<String>,
    #[serde(default)]
    pub morphology_patterns: Vec<String>,
    #[serde(default)]
    pub transliterations: Vec<Transliteration>,
}

// ---------------------------------------------------------------------------
// Decision merger
// ---------------------------------------------------------------------------

/// Thresholds of the merger's tie-break ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergerConfig {
    /// Rule 1: Darija confidence above this, general says Arabic, text is bi-script.
    #[serde(default = "default_arabic_biscript_min")]
    pub arabic_biscript_min: f32,
    /// Rule 2: Darija confidence above this with enough indicators and
    /// bi-script or Arabic support.
    #[serde(default = "default_supported_min")]
    pub supported_min: f32,
    #[serde(default = "default_supported_indicators")]
    pub supported_indicators: usize,
    /// Rule 3: general confidence below this...
    #[serde(default = "default_weak_general_max")]
    pub weak_general_max: f32,
    /// ...and Darija confidence above this with this many indicators.
    #[serde(default = "default_weak_general_darija_min")]
    pub weak_general_darija_min: f32,
    #[serde(default = "default_weak_general_indicators")]
    pub weak_general_indicators: usize,
    /// Rule 4: this many indicators and Darija confidence above the minimum.
    #[serde(default = "default_many_indicators")]
    pub many_indicators: usize,
    #[serde(default = "default_many_indicators_min")]
    pub many_indicators_min: f32,
    /// Rule 5.
    #[serde(default = "default_some_indicators")]
    pub some_indicators: usize,
    #[serde(default = "default_some_indicators_min")]
    pub some_indicators_min: f32,
    /// Minimum confidence reported when a rule elects Darija.
    #[serde(default)]
    pub floors: RuleFloors,
}

fn default_arabic_biscript_min() -> f32 {
    0.35
}
fn default_supported_min() -> f32 {
    0.25
}
fn default_supported_indicators() -> usize {
    3
}
fn default_weak_general_max() -> f32 {
    0.6
}
fn default_weak_general_darija_min() -> f32 {
    0.3
}
fn default_weak_general_indicators() -> usize {
    2
}
fn default_many_indicators() -> usize {
    5
}
fn default_many_indicators_min() -> f32 {
    0.2
}
fn default_some_indicators() -> usize {
    3
}
fn default_some_indicators_min() -> f32 {
    0.25
}

impl Default for MergerConfig {
    fn default() -> Self {
        Self {
            arabic_biscript_min: default_arabic_biscript_min(),
            supported_min: default_supported_min(),
            supported_indicators: default_supported_indicators(),
            weak_general_max: default_weak_general_max(),
            weak_general_darija_min: default_weak_general_darija_min(),
            weak_general_indicators: default_weak_general_indicators(),
            many_indicators: default_many_indicators(),
            many_indicators_min: default_many_indicators_min(),
            some_indicators: default_some_indicators(),
            some_indicators_min: default_some_indicators_min(),
            floors: RuleFloors::default(),
        }
    }
}

impl MergerConfig {
    fn validate(&self) -> ConfigResult<()> {
        unit_interval("merger.arabic_biscript_min", self.arabic_biscript_min)?;
        unit_interval("merger.supported_min", self.supported_min)?;
        unit_interval("merger.weak_general_max", self.weak_general_max)?;
        unit_interval("merger.weak_general_darija_min", self.weak_general_darija_min)?;
        unit_interval("merger.many_indicators_min", self.many_indicators_min)?;
        unit_interval("merger.some_indicators_min", self.some_indicators_min)?;
        let f = &self.floors;
        unit_interval("merger.floors.arabic_biscript", f.arabic_biscript)?;
        unit_interval("merger.floors.supported", f.supported)?;
        unit_interval("merger.floors.weak_general", f.weak_general)?;
        unit_interval("merger.floors.many_indicators", f.many_indicators)?;
        unit_interval("merger.floors.some_indicators", f.some_indicators)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleFloors {
    #[serde(default = "default_arabic_biscript_floor")]
    pub arabic_biscript: f32,
    #[serde(default = "default_supported_floor")]
    pub supported: f32,
    #[serde(default = "default_weak_general_floor")]
    pub weak_general: f32,
    #[serde(default = "default_many_indicators_floor")]
    pub many_indicators: f32,
    #[serde(default = "default_some_indicators_floor")]
    pub some_indicators: f32,
}

fn default_arabic_biscript_floor() -> f32 {
    0.85
}
fn default_supported_floor() -> f32 {
    0.75
}
fn default_weak_general_floor() -> f32 {
    0.70
}
fn default_many_indicators_floor() -> f32 {
    0.80
}
fn default_some_indicators_floor() -> f32 {
    0.70
}

impl Default for RuleFloors {
    fn default() -> Self {
        Self {
            arabic_biscript: default_arabic_biscript_floor(),
            supported: default_supported_floor(),
            weak_general: default_weak_general_floor(),
            many_indicators: default_many_indicators_floor(),
            some_indicators: default_some_indicators_floor(),
        }
    }
}

// ---------------------------------------------------------------------------
// Classifier, cache, remote, telemetry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// TOML file with marker profiles for the local statistical classifier.
    /// Built-in profiles are used when absent.
    #[serde(default)]
    pub profiles_path: Option<PathBuf>,
    /// Trigram verdicts below this confidence are reported as unknown.
    #[serde(default = "default_trigram_min_confidence")]
    pub trigram_min_confidence: f32,
}

fn default_trigram_min_confidence() -> f32 {
    0.3
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            profiles_path: None,
            trigram_min_confidence: default_trigram_min_confidence(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of in-process entries.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    /// In-process entry lifetime.
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    /// Lifetime of remote verdicts in the persistent store.
    #[serde(default = "default_persistent_ttl_secs")]
    pub persistent_ttl_secs: u64,
    /// Directory for the on-disk persistent store. Disabled when absent.
    #[serde(default)]
    pub persistent_path: Option<PathBuf>,
}

fn default_cache_capacity() -> usize {
    1000
}
fn default_cache_ttl_secs() -> u64 {
    300
}
fn default_persistent_ttl_secs() -> u64 {
    86_400
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl_secs(),
            persistent_ttl_secs: default_persistent_ttl_secs(),
            persistent_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Build HTTP remote models from the endpoints below.
    #[serde(default)]
    pub enabled: bool,
    /// Default budget when the call's options do not set one.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Remote verdicts below this confidence are discarded.
    #[serde(default = "default_accept_confidence")]
    pub accept_confidence: f32,
    /// The Darija model's verdict is final at or above this confidence.
    #[serde(default = "default_darija_override")]
    pub darija_override_confidence: f32,
    /// The general model overrides a disagreeing Darija model only when it
    /// says Arabic at or above this confidence.
    #[serde(default = "default_general_arabic_veto")]
    pub general_arabic_veto: f32,
    #[serde(default)]
    pub darija_endpoint: Option<String>,
    #[serde(default)]
    pub general_endpoint: Option<String>,
}

fn default_timeout_ms() -> u64 {
    400
}
fn default_accept_confidence() -> f32 {
    0.85
}
fn default_darija_override() -> f32 {
    0.85
}
fn default_general_arabic_veto() -> f32 {
    0.95
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_ms: default_timeout_ms(),
            accept_confidence: default_accept_confidence(),
            darija_override_confidence: default_darija_override(),
            general_arabic_veto: default_general_arabic_veto(),
            darija_endpoint: None,
            general_endpoint: None,
        }
    }
}

impl RemoteConfig {
    fn validate(&self) -> ConfigResult<()> {
        unit_interval("remote.accept_confidence", self.accept_confidence)?;
        unit_interval(
            "remote.darija_override_confidence",
            self.darija_override_confidence,
        )?;
        unit_interval("remote.general_arabic_veto", self.general_arabic_veto)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Events beyond this many pending are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_queue_capacity() -> usize {
    256
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        DetectorConfig::default().validate().unwrap();
    }

    #[test]
    fn default_weights_sum_to_one() {
        let sum = DarijaWeights::default().sum();
        assert!((sum - 1.0).abs() < 1e-6, "sum={sum}");
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config = DetectorConfig::from_toml("").unwrap();
        assert_eq!(config, DetectorConfig::default());
    }

    #[test]
    fn partial_toml_overrides_single_fields() {
        let config = DetectorConfig::from_toml(
            r#"
            min_length = 3

            [darija]
            threshold = 0.5

            [cache]
            capacity = 16
            "#,
        )
        .unwrap();
        assert_eq!(config.min_length, 3);
        assert_eq!(config.darija.threshold, 0.5);
        assert_eq!(config.darija.weights, DarijaWeights::default());
        assert_eq!(config.cache.capacity, 16);
        assert_eq!(config.cache.ttl_secs, 300);
    }

    #[test]
    fn single_weight_table_keeps_other_defaults() {
        let config = DetectorConfig::from_toml("[darija.weights]\nkeywords = 0.40\n").unwrap();
        let w = config.darija.weights;
        assert_eq!(w.keywords, 0.40);
        assert_eq!(w.code_switching, 0.30);
        assert_eq!(w.morphological, 0.15);
        assert_eq!(w.idiomatic, 0.08);
        assert_eq!(w.script_mixing, 0.02);
    }

    #[test]
    fn single_floor_table_keeps_other_defaults() {
        let config = DetectorConfig::from_toml("[merger.floors]\nsupported = 0.8\n").unwrap();
        let f = &config.merger.floors;
        assert_eq!(f.supported, 0.8);
        assert_eq!(f.arabic_biscript, 0.85);
        assert_eq!(f.weak_general, 0.70);
        assert_eq!(f.many_indicators, 0.80);
        assert_eq!(f.some_indicators, 0.70);
    }

    #[test]
    fn rejects_weights_above_one() {
        let err = DetectorConfig::from_toml(
            r#"
            [darija.weights]
            keywords = 0.9
            code_switching = 0.9
            morphological = 0.1
            idiomatic = 0.0
            script_mixing = 0.0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }), "{err}");
    }

    #[test]
    fn rejects_zero_capacity() {
        let mut config = DetectorConfig::default();
        config.cache.capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_toml() {
        let err = DetectorConfig::from_toml("min_length = \"two\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("detector.toml");
        let mut config = DetectorConfig::default();
        config.remote.timeout_ms = 250;
        config.lexicon.keywords.push("zaz".into());
        config.save(&path).unwrap();

        let loaded = DetectorConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn load_missing_file_is_read_error() {
        let err = DetectorConfig::load(Path::new("/nonexistent/detector.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
