//! Cloud/offline orchestrator: the remote attempt and its fallback decision.
//!
//! The remote tier is raced against a timer. Whichever settles first wins; on
//! timeout the remote future is dropped and its late answer never observed.
//! A remote verdict is accepted only at or above `accept_confidence`; every
//! other outcome is a fallback with a recorded reason, after which the caller
//! re-runs detection on the local pipeline.
//!
//! Accepted verdicts are remembered in an optional persistent [`KvStore`], so
//! a restarted process (or a sibling one) can skip the network for texts it
//! has already seen. Store reads and writes block, so they run on tokio's
//! blocking pool.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::persistent::KvStore;
use crate::classifier::{ClassifierVerdict, GeneralClassifier};
use crate::config::{CacheConfig, RemoteConfig};
use crate::error::ClassifierError;
use crate::language::FallbackReason;
use crate::telemetry::{TelemetryEvent, TelemetrySink};

/// What the remote attempt produced.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOutcome {
    /// Use this verdict as the final answer.
    Accepted(ClassifierVerdict),
    /// Re-run detection locally.
    Fallback {
        reason: FallbackReason,
        detail: String,
    },
}

/// Counters of remote-tier behavior. Advisory only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorStats {
    pub attempts: u64,
    pub remote_successes: u64,
    pub persistent_hits: u64,
    pub fallback_timeout: u64,
    pub fallback_low_confidence: u64,
    pub fallback_error: u64,
}

impl OrchestratorStats {
    pub fn fallbacks(&self, reason: FallbackReason) -> u64 {
        match reason {
            FallbackReason::Timeout => self.fallback_timeout,
            FallbackReason::LowConfidence => self.fallback_low_confidence,
            FallbackReason::Error => self.fallback_error,
        }
    }

    pub fn total_fallbacks(&self) -> u64 {
        self.fallback_timeout + self.fallback_low_confidence + self.fallback_error
    }
}

#[derive(Debug, Default)]
struct Counters {
    attempts: AtomicU64,
    remote_successes: AtomicU64,
    persistent_hits: AtomicU64,
    fallback_timeout: AtomicU64,
    fallback_low_confidence: AtomicU64,
    fallback_error: AtomicU64,
}

/// Races the remote tier against a budget and decides whether to fall back.
pub struct Orchestrator {
    remote: Arc<dyn GeneralClassifier>,
    store: Option<Arc<dyn KvStore>>,
    telemetry: Arc<dyn TelemetrySink>,
    accept_confidence: f32,
    default_timeout_ms: u64,
    persistent_ttl_secs: u64,
    counters: Counters,
    last_fallback: Mutex<Option<FallbackReason>>,
}

impl Orchestrator {
    pub fn new(
        remote: Arc<dyn GeneralClassifier>,
        remote_config: &RemoteConfig,
        cache_config: &CacheConfig,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            remote,
            store: None,
            telemetry,
            accept_confidence: remote_config.accept_confidence,
            default_timeout_ms: remote_config.timeout_ms,
            persistent_ttl_secs: cache_config.persistent_ttl_secs,
            counters: Counters::default(),
            last_fallback: Mutex::new(None),
        }
    }

    /// Remember accepted verdicts in `store`.
    pub fn with_store(mut self, store: Arc<dyn KvStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn default_timeout_ms(&self) -> u64 {
        self.default_timeout_ms
    }

    pub fn remote_name(&self) -> &str {
        self.remote.name()
    }

    /// Try the remote tier for a normalized text.
    ///
    /// `key` identifies the text in the persistent store. Never fails: every
    /// problem becomes a [`RemoteOutcome::Fallback`].
    pub async fn attempt(&self, key: &str, text: &str, timeout_ms: Option<u64>) -> RemoteOutcome {
        if let Some(verdict) = self.recall(key).await {
            self.counters.persistent_hits.fetch_add(1, Ordering::Relaxed);
            return self.accept(verdict);
        }

        let budget = timeout_ms.unwrap_or(self.default_timeout_ms);
        self.counters.attempts.fetch_add(1, Ordering::Relaxed);
        self.telemetry
            .emit(&TelemetryEvent::RemoteAttempt { timeout_ms: budget });
        tracing::debug!(
            stage = "remote",
            model = self.remote.name(),
            timeout_ms = budget,
            "remote attempt"
        );

        let raced = tokio::time::timeout(Duration::from_millis(budget), self.remote.classify(text));
        match raced.await {
            Err(_elapsed) => {
                let err = ClassifierError::RemoteTimeout {
                    model: self.remote.name().to_string(),
                    timeout_ms: budget,
                };
                self.fallback(FallbackReason::Timeout, err.to_string())
            }
            Ok(Err(e)) => self.fallback(FallbackReason::Error, e.to_string()),
            Ok(Ok(verdict)) if verdict.confidence < self.accept_confidence => self.fallback(
                FallbackReason::LowConfidence,
                format!(
                    "{} answered {} at {:.2}, below {:.2}",
                    verdict.provenance, verdict.language, verdict.confidence, self.accept_confidence
                ),
            ),
            Ok(Ok(verdict)) => {
                self.remember(key, &verdict).await;
                self.accept(verdict)
            }
        }
    }

    pub fn stats(&self) -> OrchestratorStats {
        let c = &self.counters;
        OrchestratorStats {
            attempts: c.attempts.load(Ordering::Relaxed),
            remote_successes: c.remote_successes.load(Ordering::Relaxed),
            persistent_hits: c.persistent_hits.load(Ordering::Relaxed),
            fallback_timeout: c.fallback_timeout.load(Ordering::Relaxed),
            fallback_low_confidence: c.fallback_low_confidence.load(Ordering::Relaxed),
            fallback_error: c.fallback_error.load(Ordering::Relaxed),
        }
    }

    /// Reason of the most recent fallback, if any happened.
    pub fn last_fallback(&self) -> Option<FallbackReason> {
        self.last_fallback.lock().ok().and_then(|r| *r)
    }

    fn accept(&self, verdict: ClassifierVerdict) -> RemoteOutcome {
        self.counters.remote_successes.fetch_add(1, Ordering::Relaxed);
        self.telemetry.emit(&TelemetryEvent::RemoteAccepted {
            language: verdict.language,
            confidence: verdict.confidence,
        });
        RemoteOutcome::Accepted(verdict)
    }

    fn fallback(&self, reason: FallbackReason, detail: String) -> RemoteOutcome {
        let counter = match reason {
            FallbackReason::Timeout => &self.counters.fallback_timeout,
            FallbackReason::LowConfidence => &self.counters.fallback_low_confidence,
            FallbackReason::Error => &self.counters.fallback_error,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_fallback.lock() {
            *last = Some(reason);
        }

        tracing::warn!(stage = "remote", reason = %reason, detail = detail.as_str(), "falling back to local rules");
        self.telemetry.emit(&TelemetryEvent::FallbackUsed {
            reason,
            detail: Some(detail.clone()),
        });
        RemoteOutcome::Fallback { reason, detail }
    }

    /// Persistent lookup. Errors and undecodable entries read as misses.
    async fn recall(&self, key: &str) -> Option<ClassifierVerdict> {
        let store = Arc::clone(self.store.as_ref()?);
        let key = key.to_string();
        let read = tokio::task::spawn_blocking(move || store.get(&key)).await;
        let read = match read {
            Ok(read) => read,
            Err(e) => {
                tracing::warn!(error = %e, "persistent cache read task failed");
                return None;
            }
        };
        match read {
            Ok(Some(value)) => match serde_json::from_value::<ClassifierVerdict>(value) {
                Ok(verdict) if verdict.confidence >= self.accept_confidence => {
                    tracing::debug!(stage = "persistent", hit = true, "persistent cache hit");
                    Some(verdict)
                }
                Ok(_) => None,
                Err(e) => {
                    tracing::debug!(error = %e, "ignoring undecodable persistent entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "persistent cache read failed");
                None
            }
        }
    }

    async fn remember(&self, key: &str, verdict: &ClassifierVerdict) {
        let Some(store) = &self.store else {
            return;
        };
        let value = match serde_json::to_value(verdict) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "cannot encode verdict for persistent cache");
                return;
            }
        };
        let store = Arc::clone(store);
        let key = key.to_string();
        let ttl_secs = self.persistent_ttl_secs;
        let written = tokio::task::spawn_blocking(move || {
            store.set(&key, &value, ttl_secs).map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| e.to_string())
        .and_then(|r| r);
        if let Err(e) = written {
            tracing::warn!(error = %e, "persistent cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use futures_util::future::BoxFuture;

    use super::*;
    use crate::cache::persistent::MemoryKvStore;
    use crate::error::{ClassifierError, ClassifierResult};
    use crate::language::Language;
    use crate::telemetry::VecSink;

    struct Stub {
        verdict: ClassifierVerdict,
        delay: Duration,
        fail: bool,
        calls: AtomicUsize,
    }

    impl Stub {
        fn answering(language: Language, confidence: f32) -> Arc<Self> {
            Arc::new(Self {
                verdict: ClassifierVerdict::new(language, confidence, "remote:stub"),
                delay: Duration::ZERO,
                fail: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                verdict: ClassifierVerdict::new(Language::Darija, 0.99, "remote:stub"),
                delay,
                fail: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                verdict: ClassifierVerdict::unknown(0.0, "remote:stub"),
                delay: Duration::ZERO,
                fail: true,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl GeneralClassifier for Stub {
        fn name(&self) -> &str {
            "stub"
        }

        fn classify<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, ClassifierResult<ClassifierVerdict>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                if self.fail {
                    return Err(ClassifierError::Remote {
                        model: "stub".into(),
                        message: "connection refused".into(),
                    });
                }
                Ok(self.verdict.clone())
            })
        }
    }

    fn orchestrator(remote: Arc<Stub>, sink: Arc<VecSink>) -> Orchestrator {
        Orchestrator::new(
            remote,
            &RemoteConfig::default(),
            &CacheConfig::default(),
            sink,
        )
    }

    #[tokio::test]
    async fn confident_remote_verdict_is_accepted() {
        let sink = Arc::new(VecSink::new());
        let o = orchestrator(Stub::answering(Language::Darija, 0.9), sink.clone());
        let outcome = o.attempt("k", "wach", None).await;
        assert!(matches!(outcome, RemoteOutcome::Accepted(ref v) if v.language == Language::Darija));
        assert_eq!(o.stats().remote_successes, 1);
        assert_eq!(sink.names(), vec!["remote_attempt", "remote_accepted"]);
    }

    #[tokio::test]
    async fn slow_remote_times_out() {
        let sink = Arc::new(VecSink::new());
        let o = orchestrator(Stub::slow(Duration::from_millis(500)), sink.clone());
        let outcome = o.attempt("k", "wach", Some(1)).await;
        match outcome {
            RemoteOutcome::Fallback { reason, detail } => {
                assert_eq!(reason, FallbackReason::Timeout);
                let expected = ClassifierError::RemoteTimeout {
                    model: "stub".into(),
                    timeout_ms: 1,
                };
                assert_eq!(detail, expected.to_string());
            }
            other => panic!("expected fallback, got {other:?}"),
        }
        assert_eq!(o.stats().fallbacks(FallbackReason::Timeout), 1);
        assert_eq!(o.last_fallback(), Some(FallbackReason::Timeout));
        assert!(sink.names().contains(&"fallback_used"));
    }

    #[tokio::test]
    async fn low_confidence_remote_is_discarded() {
        let o = orchestrator(
            Stub::answering(Language::Arabic, 0.6),
            Arc::new(VecSink::new()),
        );
        let outcome = o.attempt("k", "text", None).await;
        assert!(matches!(
            outcome,
            RemoteOutcome::Fallback {
                reason: FallbackReason::LowConfidence,
                ..
            }
        ));
        assert_eq!(o.stats().remote_successes, 0);
    }

    #[tokio::test]
    async fn remote_error_falls_back() {
        let o = orchestrator(Stub::failing(), Arc::new(VecSink::new()));
        let outcome = o.attempt("k", "text", None).await;
        match outcome {
            RemoteOutcome::Fallback { reason, detail } => {
                assert_eq!(reason, FallbackReason::Error);
                assert!(detail.contains("connection refused"));
            }
            other => panic!("expected fallback, got {other:?}"),
        }
        assert_eq!(o.stats().total_fallbacks(), 1);
    }

    #[tokio::test]
    async fn accepted_verdicts_are_recalled_from_store() {
        let remote = Stub::answering(Language::French, 0.95);
        let store = Arc::new(MemoryKvStore::new());
        let o = orchestrator(remote.clone(), Arc::new(VecSink::new())).with_store(store.clone());

        o.attempt("k", "bonjour", None).await;
        assert_eq!(store.len(), 1);
        let again = o.attempt("k", "bonjour", None).await;

        assert!(matches!(again, RemoteOutcome::Accepted(ref v) if v.language == Language::French));
        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
        let stats = o.stats();
        assert_eq!(stats.persistent_hits, 1);
        assert_eq!(stats.attempts, 1);
    }

    #[tokio::test]
    async fn store_io_runs_off_the_runtime_thread() {
        use crate::error::StoreResult;

        struct ThreadRecordingStore {
            inner: MemoryKvStore,
            threads: Mutex<Vec<std::thread::ThreadId>>,
        }

        impl ThreadRecordingStore {
            fn record(&self) {
                self.threads.lock().unwrap().push(std::thread::current().id());
            }
        }

        impl KvStore for ThreadRecordingStore {
            fn get(&self, key: &str) -> StoreResult<Option<serde_json::Value>> {
                self.record();
                self.inner.get(key)
            }

            fn set(&self, key: &str, value: &serde_json::Value, ttl_secs: u64) -> StoreResult<()> {
                self.record();
                self.inner.set(key, value, ttl_secs)
            }
        }

        let store = Arc::new(ThreadRecordingStore {
            inner: MemoryKvStore::new(),
            threads: Mutex::new(Vec::new()),
        });
        let o = orchestrator(
            Stub::answering(Language::French, 0.95),
            Arc::new(VecSink::new()),
        )
        .with_store(store.clone());
        o.attempt("k", "bonjour", None).await;

        // current_thread runtime: the test body runs on the only async thread
        let runtime_thread = std::thread::current().id();
        let threads = store.threads.lock().unwrap().clone();
        assert_eq!(threads.len(), 2, "{threads:?}");
        assert!(threads.iter().all(|t| *t != runtime_thread), "{threads:?}");
    }

    #[tokio::test]
    async fn low_confidence_verdicts_are_not_persisted() {
        let store = Arc::new(MemoryKvStore::new());
        let o = orchestrator(
            Stub::answering(Language::French, 0.5),
            Arc::new(VecSink::new()),
        )
        .with_store(store.clone());
        o.attempt("k", "bonjour", None).await;
        assert!(store.is_empty());
    }
}
