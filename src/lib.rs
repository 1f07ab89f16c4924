// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # darija-detect
//!
//! Hybrid language identification for short conversational text, tuned for
//! Moroccan Darija written in Arabic script or Latin transliteration (Arabizi)
//! alongside French, Standard Arabic, English, and Spanish.
//!
//! ## Architecture
//!
//! - **Normalizer** (`normalize`): NFC, invisible-character and tashkil stripping
//! - **Script analysis** (`script`): Latin/Arabic ratios, bi-script and Arabizi detection
//! - **Darija signals** (`signals`, `darija`): five weighted extractors and a scorer
//! - **General classifier** (`classifier`): local statistical or remote models
//! - **Decision merger** (`merge`): ordered tie-break ladder
//! - **Result cache** (`cache`): bounded in-process cache plus a persistent store
//! - **Orchestrator** (`orchestrator`): remote attempt raced against a budget,
//!   with offline fallback
//! - **Telemetry** (`telemetry`): fire-and-forget events
//!
//! ## Library usage
//!
//! ```no_run
//! use darija_detect::detector::Detector;
//! use darija_detect::language::{DetectionOptions, Language};
//!
//! let detector = Detector::with_defaults().unwrap();
//! let result = detector.detect_local("wach nta mezyan?", &DetectionOptions::default());
//! assert_eq!(result.language, Language::Darija);
//! ```

pub mod cache;
pub mod classifier;
pub mod config;
pub mod darija;
pub mod detector;
pub mod error;
pub mod language;
pub mod lexicon;
pub mod merge;
pub mod normalize;
pub mod orchestrator;
pub mod script;
pub mod signals;
pub mod telemetry;

pub use detector::Detector;
pub use language::{DetectionOptions, DetectionResult, Language, Script, Source};
