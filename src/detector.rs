//! The detection facade.
//!
//! [`Detector`] owns one instance of every pipeline component and exposes
//! `detect(text, options)`, which always returns a [`DetectionResult`]. Input
//! validation failures, remote timeouts, and remote errors are all encoded in
//! the result (`source`, `error`, `fallback_reason`) instead of propagated.
//!
//! ```text
//! normalize → validate → cache ─hit──────────────────────────────┐
//!                          └miss→ remote tier (raced) ─accepted──┤
//!                                     └fallback→ local pipeline ─┴→ min_confidence → cache → result
//! ```

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use crate::cache::persistent::{KvStore, RedbKvStore};
use crate::cache::{CacheKey, CacheStats, ResultCache, cache_key, text_key};
use crate::classifier::GeneralClassifier;
use crate::classifier::statistical::StatisticalClassifier;
use crate::config::DetectorConfig;
use crate::darija::{DarijaScore, DarijaScorer};
use crate::error::{DetectResult, ValidationError};
use crate::language::{DetectionOptions, DetectionResult, Language, Source};
use crate::lexicon::Lexicon;
use crate::merge::DecisionMerger;
use crate::normalize::{normalize, split_sentences};
use crate::orchestrator::{Orchestrator, OrchestratorStats, RemoteOutcome};
use crate::script::{ScriptAnalysis, ScriptAnalyzer};
use crate::telemetry::{ChannelSink, TelemetryEvent, TelemetrySink, TracingSink};

/// Hybrid Darija-aware language detector.
pub struct Detector {
    config: DetectorConfig,
    analyzer: ScriptAnalyzer,
    scorer: DarijaScorer,
    local: StatisticalClassifier,
    merger: DecisionMerger,
    cache: ResultCache,
    telemetry: Arc<dyn TelemetrySink>,
    remote: Option<Arc<dyn GeneralClassifier>>,
    store: Option<Arc<dyn KvStore>>,
    orchestrator: Option<Orchestrator>,
}

impl Detector {
    /// Build every component from `config`.
    ///
    /// With the `http` feature and `remote.enabled`, HTTP remote models are
    /// built from the configured endpoints. A configured `cache.persistent_path`
    /// opens the on-disk store for remote verdicts.
    pub fn new(config: DetectorConfig) -> DetectResult<Self> {
        config.validate()?;

        let lexicon = Lexicon::from_config(&config.lexicon);
        let analyzer = ScriptAnalyzer::new(lexicon.transliterations.clone());
        let scorer = DarijaScorer::new(&lexicon, &config.darija)?;
        let local = StatisticalClassifier::from_config(&config.classifier);

        let store = match &config.cache.persistent_path {
            Some(path) => Some(Arc::new(RedbKvStore::open(path)?) as Arc<dyn KvStore>),
            None => None,
        };

        let mut detector = Self {
            analyzer,
            scorer,
            local,
            merger: DecisionMerger::new(config.merger.clone()),
            cache: ResultCache::from_config(&config.cache),
            telemetry: Arc::new(ChannelSink::spawn(
                config.telemetry.queue_capacity,
                Box::new(TracingSink),
            )),
            remote: None,
            store,
            orchestrator: None,
            config,
        };

        #[cfg(feature = "http")]
        if detector.config.remote.enabled {
            let tier = crate::classifier::remote::RemoteTier::from_config(&detector.config.remote);
            if tier.is_empty() {
                tracing::warn!("remote tier enabled but no endpoints configured");
            } else {
                detector.remote = Some(Arc::new(tier));
            }
        }
        detector.rebuild_orchestrator();

        tracing::info!(
            keywords = lexicon.keywords.len(),
            idioms = lexicon.idioms.len(),
            remote = detector.remote.is_some(),
            persistent = detector.store.is_some(),
            cache_capacity = detector.cache.capacity(),
            "detector ready"
        );
        Ok(detector)
    }

    /// Build with the default configuration.
    pub fn with_defaults() -> DetectResult<Self> {
        Self::new(DetectorConfig::default())
    }

    /// Use `remote` as the remote tier. Without one, detection is local-only.
    pub fn with_remote(mut self, remote: Arc<dyn GeneralClassifier>) -> Self {
        self.remote = Some(remote);
        self.rebuild_orchestrator();
        self
    }

    /// Remember accepted remote verdicts in `store`.
    pub fn with_persistent_store(mut self, store: Arc<dyn KvStore>) -> Self {
        self.store = Some(store);
        self.rebuild_orchestrator();
        self
    }

    /// Send telemetry events to `sink`. By default events are queued to a
    /// background thread that forwards them into `tracing`.
    pub fn with_telemetry(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = sink;
        self.rebuild_orchestrator();
        self
    }

    fn rebuild_orchestrator(&mut self) {
        self.orchestrator = self.remote.as_ref().map(|remote| {
            let orchestrator = Orchestrator::new(
                Arc::clone(remote),
                &self.config.remote,
                &self.config.cache,
                Arc::clone(&self.telemetry),
            );
            match &self.store {
                Some(store) => orchestrator.with_store(Arc::clone(store)),
                None => orchestrator,
            }
        });
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detect the language of one utterance. Never fails.
    pub async fn detect(&self, text: &str, options: &DetectionOptions) -> DetectionResult {
        let started = Instant::now();
        let normalized = match self.validate(text) {
            Ok(n) => n,
            Err(e) => return self.reject(e, started),
        };

        let key = cache_key(&normalized, options);
        if let Some(hit) = self.lookup(key, options, started) {
            return hit;
        }

        let result = match (&self.orchestrator, options.offline) {
            (_, true) => self.run_local(&normalized, Source::OfflineFallback),
            (None, false) => self.run_local(&normalized, Source::LocalRules),
            (Some(orchestrator), false) => {
                let outcome = orchestrator
                    .attempt(&text_key(&normalized), &normalized, options.timeout_ms)
                    .await;
                match outcome {
                    RemoteOutcome::Accepted(verdict) => {
                        let (script, darija) = self.analyze(&normalized);
                        self.merger
                            .annotate(darija, verdict, script, Source::RemoteModel)
                    }
                    RemoteOutcome::Fallback { reason, .. } => {
                        let mut local = self.run_local(&normalized, Source::OfflineFallback);
                        local.fallback_reason = Some(reason);
                        local
                    }
                }
            }
        };

        self.finish(key, result, options, started)
    }

    /// Detect without the remote tier, synchronously.
    ///
    /// Tagged `offline-fallback` when `options.offline` is set, `local-rules`
    /// otherwise. Shares the result cache with [`Detector::detect`].
    pub fn detect_local(&self, text: &str, options: &DetectionOptions) -> DetectionResult {
        let started = Instant::now();
        let normalized = match self.validate(text) {
            Ok(n) => n,
            Err(e) => return self.reject(e, started),
        };

        let key = cache_key(&normalized, options);
        if let Some(hit) = self.lookup(key, options, started) {
            return hit;
        }

        let source = if options.offline {
            Source::OfflineFallback
        } else {
            Source::LocalRules
        };
        let result = self.run_local(&normalized, source);
        self.finish(key, result, options, started)
    }

    /// Split at sentence terminators and detect each sentence.
    pub async fn detect_sentences(
        &self,
        text: &str,
        options: &DetectionOptions,
    ) -> Vec<(String, DetectionResult)> {
        let mut out = Vec::new();
        for sentence in split_sentences(text) {
            let result = self.detect(&sentence, options).await;
            out.push((sentence, result));
        }
        out
    }

    /// Run the local pipeline over many texts in parallel.
    pub fn detect_batch_local<S: AsRef<str> + Sync>(
        &self,
        texts: &[S],
        options: &DetectionOptions,
    ) -> Vec<DetectionResult> {
        texts
            .par_iter()
            .map(|t| self.detect_local(t.as_ref(), options))
            .collect()
    }

    /// Script report for a raw text.
    pub fn analyze_script(&self, text: &str) -> ScriptAnalysis {
        self.analyzer.analyze(&normalize(text))
    }

    /// Darija signal breakdown for a raw text.
    pub fn score_darija(&self, text: &str) -> DarijaScore {
        self.scorer.score(&normalize(text))
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Remote-tier counters, when a remote tier is configured.
    pub fn orchestrator_stats(&self) -> Option<OrchestratorStats> {
        self.orchestrator.as_ref().map(Orchestrator::stats)
    }

    fn validate(&self, text: &str) -> Result<String, ValidationError> {
        let normalized = normalize(text);
        let length = normalized.chars().count();
        if length == 0 {
            return Err(ValidationError::Empty);
        }
        if length < self.config.min_length {
            return Err(ValidationError::TooShort {
                length,
                minimum: self.config.min_length,
            });
        }
        Ok(normalized)
    }

    fn reject(&self, error: ValidationError, started: Instant) -> DetectionResult {
        let message = error.to_string();
        tracing::debug!(stage = "validate", error = message.as_str(), "input rejected");
        self.telemetry.emit(&TelemetryEvent::ValidationFailed {
            reason: message.clone(),
        });
        let mut result = DetectionResult::failure(message);
        result.processing_time_ms = elapsed_ms(started);
        result
    }

    fn lookup(
        &self,
        key: CacheKey,
        options: &DetectionOptions,
        started: Instant,
    ) -> Option<DetectionResult> {
        if options.bypass_cache {
            return None;
        }
        let Some(mut hit) = self.cache.get(key) else {
            tracing::debug!(stage = "cache", hit = false, key);
            self.telemetry.emit(&TelemetryEvent::CacheMiss { key });
            return None;
        };

        tracing::debug!(stage = "cache", hit = true, key);
        self.telemetry.emit(&TelemetryEvent::CacheHit { key });
        hit.source = Source::Cache;
        hit.fallback_reason = None;
        hit.processing_time_ms = elapsed_ms(started);
        self.completed(&hit);
        Some(hit)
    }

    fn analyze(&self, normalized: &str) -> (ScriptAnalysis, DarijaScore) {
        (
            self.analyzer.analyze(normalized),
            self.scorer.score(normalized),
        )
    }

    fn run_local(&self, normalized: &str, source: Source) -> DetectionResult {
        let (script, darija) = self.analyze(normalized);
        let general = self.local.classify_text(normalized);
        self.merger.merge(darija, general, script, source)
    }

    fn finish(
        &self,
        key: CacheKey,
        mut result: DetectionResult,
        options: &DetectionOptions,
        started: Instant,
    ) -> DetectionResult {
        if result.confidence < options.min_confidence {
            result.language = Language::Unknown;
        }
        result.processing_time_ms = elapsed_ms(started);

        if !options.bypass_cache {
            self.cache.put(key, result.clone());
        }
        self.completed(&result);
        result
    }

    fn completed(&self, result: &DetectionResult) {
        tracing::debug!(
            language = %result.language,
            confidence = result.confidence,
            source = %result.source,
            elapsed_ms = result.processing_time_ms,
            "detection complete"
        );
        self.telemetry.emit(&TelemetryEvent::DetectionCompleted {
            language: result.language,
            confidence: result.confidence,
            source: result.source,
            processing_time_ms: result.processing_time_ms,
        });
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
