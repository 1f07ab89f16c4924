//! Rich diagnostic error types for the detection engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text. None of these escape `Detector::detect`:
//! the hot path encodes failures into `DetectionResult::error` instead. They are
//! returned from constructors, loaders, and the lower-level component APIs.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the engine.
#[derive(Debug, Error, Diagnostic)]
pub enum DetectError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Classifier(#[from] ClassifierError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Validation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ValidationError {
    #[error("empty input")]
    #[diagnostic(
        code(darija::validation::empty),
        help("Pass a non-empty utterance. Whitespace and invisible characters are stripped first.")
    )]
    Empty,

    #[error("input too short: {length} character(s), minimum is {minimum}")]
    #[diagnostic(
        code(darija::validation::too_short),
        help("Very short inputs carry too little signal. Lower `min_length` in the config if needed.")
    )]
    TooShort { length: usize, minimum: usize },
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(darija::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(darija::config::parse),
        help("Check the TOML syntax. Run `darija-detect config` to print a valid default file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(darija::config::write),
        help("Ensure you have write permissions to the target directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config value for {field}: {message}")]
    #[diagnostic(
        code(darija::config::invalid),
        help("Weights and thresholds must lie in [0, 1]; the five Darija weights must sum to at most 1.")
    )]
    Invalid { field: String, message: String },

    #[error("invalid regex in {table}: \"{pattern}\"")]
    #[diagnostic(
        code(darija::config::regex),
        help("Patterns use the `regex` crate syntax. Look-around and back-references are not supported.")
    )]
    Regex {
        table: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// ---------------------------------------------------------------------------
// Classifier errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ClassifierError {
    #[error("classifier failed to initialize: {message}")]
    #[diagnostic(
        code(darija::classifier::init),
        help(
            "The local statistical classifier could not load its marker profiles. \
             Detection continues in degraded mode and reports `unknown`."
        )
    )]
    Initialization { message: String },

    #[error("remote model \"{model}\" did not answer within {timeout_ms}ms")]
    #[diagnostic(
        code(darija::classifier::remote_timeout),
        help("Raise `timeout_ms` or check the remote endpoint's latency. Local rules were used instead.")
    )]
    RemoteTimeout { model: String, timeout_ms: u64 },

    #[error("remote model \"{model}\" failed: {message}")]
    #[diagnostic(
        code(darija::classifier::remote),
        help("Check that the model endpoint is reachable. Local rules were used instead.")
    )]
    Remote { model: String, message: String },

    #[error("remote model \"{model}\" returned a malformed response: {message}")]
    #[diagnostic(
        code(darija::classifier::malformed),
        help("The endpoint must answer with JSON of the form {{\"language\": \"ary\", \"confidence\": 0.9}}.")
    )]
    MalformedResponse { model: String, message: String },
}

pub type ClassifierResult<T> = std::result::Result<T, ClassifierError>;

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(darija::store::io),
        help("Check that the cache directory exists, has correct permissions, and that the disk is not full.")
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("redb error: {message}")]
    #[diagnostic(
        code(darija::store::redb),
        help(
            "The persistent cache database failed. It only holds recomputable data, \
             so deleting the cache file is always safe."
        )
    )]
    Redb { message: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(darija::store::serde),
        help("A cached entry could not be (de)serialized. It will be recomputed.")
    )]
    Serialization { message: String },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type for engine-level operations.
pub type DetectResult<T> = std::result::Result<T, DetectError>;
