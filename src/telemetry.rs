//! Telemetry events for the detection path.
//!
//! `TelemetryEvent` replaces ad-hoc counters with typed, named events that a
//! [`TelemetrySink`] can forward anywhere: into `tracing`, collected in memory
//! (testing), or through a bounded queue to a slow consumer.
//!
//! Emission is fire-and-forget. A sink must never block the detection path or
//! report failure back to it.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::thread::JoinHandle;

use serde::{Deserialize, Serialize};

use crate::language::{FallbackReason, Language, Source};

// ── Event types ─────────────────────────────────────────────────────────

/// A named event emitted by the detector or orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TelemetryEvent {
    /// Input rejected before any analysis.
    ValidationFailed { reason: String },
    CacheHit { key: u64 },
    CacheMiss { key: u64 },
    /// The remote tier is about to be called.
    RemoteAttempt { timeout_ms: u64 },
    /// The remote tier answered with an accepted verdict.
    RemoteAccepted { language: Language, confidence: f32 },
    /// The remote tier was abandoned for the local pipeline.
    FallbackUsed {
        reason: FallbackReason,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    /// Final verdict returned to the caller.
    DetectionCompleted {
        language: Language,
        confidence: f32,
        source: Source,
        processing_time_ms: f64,
    },
}

impl TelemetryEvent {
    /// Stable event name, e.g. `fallback_used`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ValidationFailed { .. } => "validation_failed",
            Self::CacheHit { .. } => "cache_hit",
            Self::CacheMiss { .. } => "cache_miss",
            Self::RemoteAttempt { .. } => "remote_attempt",
            Self::RemoteAccepted { .. } => "remote_accepted",
            Self::FallbackUsed { .. } => "fallback_used",
            Self::DetectionCompleted { .. } => "detection_completed",
        }
    }

    /// Event attributes as a flat string map.
    pub fn attributes(&self) -> BTreeMap<String, String> {
        let mut attrs = BTreeMap::new();
        if let Ok(serde_json::Value::Object(map)) = serde_json::to_value(self) {
            for (k, v) in map {
                if k == "event" {
                    continue;
                }
                let value = match v {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                attrs.insert(k, value);
            }
        }
        attrs
    }
}

// ── TelemetrySink trait ─────────────────────────────────────────────────

/// A destination for telemetry events.
pub trait TelemetrySink: Send + Sync {
    /// Emit a single event. Must not block.
    fn emit(&self, event: &TelemetryEvent);

    /// Emit a batch of events.
    fn emit_batch(&self, events: &[TelemetryEvent]) {
        for e in events {
            self.emit(e);
        }
    }
}

// ── NullSink ────────────────────────────────────────────────────────────

/// Discards everything.
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn emit(&self, _event: &TelemetryEvent) {}
}

// ── TracingSink ─────────────────────────────────────────────────────────

/// Forwards events into `tracing` under the `darija_detect::telemetry` target.
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn emit(&self, event: &TelemetryEvent) {
        match event {
            TelemetryEvent::FallbackUsed { reason, detail } => {
                tracing::warn!(
                    target: "darija_detect::telemetry",
                    event = event.name(),
                    reason = %reason,
                    detail = detail.as_deref().unwrap_or(""),
                    "remote tier abandoned"
                );
            }
            TelemetryEvent::ValidationFailed { reason } => {
                tracing::debug!(
                    target: "darija_detect::telemetry",
                    event = event.name(),
                    reason = reason.as_str(),
                    "input rejected"
                );
            }
            other => {
                let attrs = other.attributes();
                tracing::debug!(
                    target: "darija_detect::telemetry",
                    event = other.name(),
                    attributes = ?attrs,
                    "telemetry"
                );
            }
        }
    }
}

// ── VecSink ─────────────────────────────────────────────────────────────

/// Collects events into a `Vec<TelemetryEvent>` for testing.
pub struct VecSink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    /// Get all collected events.
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Names of collected events, in emission order.
    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(TelemetryEvent::name).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut e) = self.events.lock() {
            e.clear();
        }
    }
}

impl Default for VecSink {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySink for VecSink {
    fn emit(&self, event: &TelemetryEvent) {
        if let Ok(mut e) = self.events.lock() {
            e.push(event.clone());
        }
    }
}

// ── ChannelSink ─────────────────────────────────────────────────────────

/// Hands events to a background thread through a bounded queue.
///
/// When the queue is full the event is dropped and counted; the caller never
/// waits on the downstream sink.
pub struct ChannelSink {
    sender: Mutex<Option<SyncSender<TelemetryEvent>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    dropped: AtomicU64,
}

impl ChannelSink {
    /// Spawn a worker thread draining into `downstream`.
    pub fn spawn(capacity: usize, downstream: Box<dyn TelemetrySink>) -> Self {
        let (sender, receiver) = mpsc::sync_channel::<TelemetryEvent>(capacity.max(1));
        let worker = std::thread::Builder::new()
            .name("darija-telemetry".into())
            .spawn(move || {
                for event in receiver {
                    downstream.emit(&event);
                }
            })
            .map_err(|e| tracing::warn!(error = %e, "telemetry worker failed to start"))
            .ok();

        Self {
            sender: Mutex::new(worker.as_ref().map(|_| sender)),
            worker: Mutex::new(worker),
            dropped: AtomicU64::new(0),
        }
    }

    /// Events discarded because the queue was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Close the queue and wait for pending events to drain.
    pub fn shutdown(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        let handle = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

impl TelemetrySink for ChannelSink {
    fn emit(&self, event: &TelemetryEvent) {
        let sent = match self.sender.lock() {
            Ok(guard) => match guard.as_ref() {
                Some(tx) => match tx.try_send(event.clone()) {
                    Ok(()) => true,
                    Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
                },
                None => false,
            },
            Err(_) => false,
        };
        if !sent {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Drop for ChannelSink {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::mpsc::Receiver;
    use std::time::Duration;

    use super::*;

    #[test]
    fn vec_sink_collects() {
        let sink = VecSink::new();
        sink.emit(&TelemetryEvent::CacheMiss { key: 1 });
        sink.emit_batch(&[
            TelemetryEvent::RemoteAttempt { timeout_ms: 400 },
            TelemetryEvent::FallbackUsed {
                reason: FallbackReason::Timeout,
                detail: None,
            },
        ]);
        assert_eq!(sink.len(), 3);
        assert_eq!(
            sink.names(),
            vec!["cache_miss", "remote_attempt", "fallback_used"]
        );
        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn event_serializes_with_tag() {
        let event = TelemetryEvent::FallbackUsed {
            reason: FallbackReason::LowConfidence,
            detail: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""event":"fallback_used""#));
        assert!(json.contains(r#""reason":"low_confidence""#));
        assert!(!json.contains("detail"));
    }

    #[test]
    fn attributes_flatten_fields() {
        let attrs = TelemetryEvent::DetectionCompleted {
            language: Language::Darija,
            confidence: 0.5,
            source: Source::OfflineFallback,
            processing_time_ms: 1.0,
        }
        .attributes();
        assert_eq!(attrs["language"], "darija");
        assert_eq!(attrs["source"], "offline-fallback");
        assert!(!attrs.contains_key("event"));
    }

    #[test]
    fn tracing_and_null_sinks_accept_everything() {
        let events = [
            TelemetryEvent::ValidationFailed {
                reason: "empty".into(),
            },
            TelemetryEvent::CacheHit { key: 7 },
            TelemetryEvent::FallbackUsed {
                reason: FallbackReason::Error,
                detail: Some("boom".into()),
            },
        ];
        TracingSink.emit_batch(&events);
        NullSink.emit_batch(&events);
    }

    /// Downstream sink that blocks until the test releases it.
    struct GatedSink {
        gate: Mutex<Receiver<()>>,
        seen: Arc<VecSink>,
    }

    impl TelemetrySink for GatedSink {
        fn emit(&self, event: &TelemetryEvent) {
            if let Ok(gate) = self.gate.lock() {
                let _ = gate.recv_timeout(Duration::from_secs(5));
            }
            self.seen.emit(event);
        }
    }

    #[test]
    fn channel_sink_drops_when_full_without_blocking() {
        let (release, gate) = mpsc::channel();
        let seen = Arc::new(VecSink::new());
        let sink = ChannelSink::spawn(
            1,
            Box::new(GatedSink {
                gate: Mutex::new(gate),
                seen: Arc::clone(&seen),
            }),
        );

        for key in 0..10 {
            sink.emit(&TelemetryEvent::CacheMiss { key });
        }
        // At most one in flight in the worker plus one queued.
        assert!(sink.dropped() >= 8, "dropped={}", sink.dropped());

        for _ in 0..10 {
            let _ = release.send(());
        }
        sink.shutdown();
        assert_eq!(seen.len() as u64 + sink.dropped(), 10);
    }

    #[test]
    fn channel_sink_delivers_after_shutdown() {
        let seen = Arc::new(VecSink::new());
        struct Forward(Arc<VecSink>);
        impl TelemetrySink for Forward {
            fn emit(&self, event: &TelemetryEvent) {
                self.0.emit(event);
            }
        }

        let sink = ChannelSink::spawn(16, Box::new(Forward(Arc::clone(&seen))));
        sink.emit(&TelemetryEvent::CacheHit { key: 1 });
        sink.emit(&TelemetryEvent::CacheHit { key: 2 });
        sink.shutdown();
        assert_eq!(seen.len(), 2);

        sink.emit(&TelemetryEvent::CacheHit { key: 3 });
        assert_eq!(sink.dropped(), 1);
    }
}
