//! Prometheus metrics collection for cipherd.
//!
//! Metrics are exposed in text format on the HTTP listener's `/metrics`
//! endpoint. Every helper is a no-op until [`init`] has run, so the session
//! core can record unconditionally.
//!
//! - `cipher_sessions_active` - Registered sessions (gauge)
//! - `cipher_handshakes_total{outcome}` - Handshakes by outcome
//! - `cipher_frames_total{kind}` - Inbound frames by kind
//! - `cipher_frame_duration_seconds{kind}` - Frame handling latency
//! - `cipher_frame_errors_total{kind,error}` - Rejected frames
//! - `cipher_forwards_dropped_total{reason}` - Forwards that were not delivered

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

/// Chat messages durably appended to the store.
pub static MESSAGES_PERSISTED: OnceLock<IntCounter> = OnceLock::new();

/// Chat messages enqueued on a recipient's session.
pub static FORWARDS_DELIVERED: OnceLock<IntCounter> = OnceLock::new();

/// Forwards that could not be enqueued, by reason.
pub static FORWARDS_DROPPED: OnceLock<IntCounterVec> = OnceLock::new();

/// Handshakes by outcome (opened, unauthorized, error).
pub static HANDSHAKES: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges (can increase/decrease)
// ========================================================================

/// Sessions currently in the connection registry.
pub static SESSIONS_ACTIVE: OnceLock<IntGauge> = OnceLock::new();

// ========================================================================
// Frame metrics
// ========================================================================

/// Inbound frames by kind.
pub static FRAME_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();

/// Frame handling latency by kind.
pub static FRAME_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Frame errors by kind and error code.
pub static FRAME_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at server startup before any metrics are recorded.
pub fn init() {
    let r = registry();

    // Helper macro to register metric
    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(MESSAGES_PERSISTED, IntCounter::new("cipher_messages_persisted_total", "Chat messages persisted"));
    register!(FORWARDS_DELIVERED, IntCounter::new("cipher_forwards_delivered_total", "Chat messages forwarded to an online recipient"));
    register!(FORWARDS_DROPPED, IntCounterVec::new(Opts::new("cipher_forwards_dropped_total", "Forwards that were not delivered"), &["reason"]));
    register!(HANDSHAKES, IntCounterVec::new(Opts::new("cipher_handshakes_total", "Session handshakes by outcome"), &["outcome"]));
    register!(SESSIONS_ACTIVE, IntGauge::new("cipher_sessions_active", "Sessions in the connection registry"));

    register!(FRAME_COUNTER, IntCounterVec::new(Opts::new("cipher_frames_total", "Inbound frames by kind"), &["kind"]));
    register!(FRAME_LATENCY, HistogramVec::new(
        HistogramOpts::new("cipher_frame_duration_seconds", "Frame handling latency by kind")
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        &["kind"]));
    register!(FRAME_ERRORS, IntCounterVec::new(Opts::new("cipher_frame_errors_total", "Rejected frames by kind and error"), &["kind", "error"]));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions for session metric updates
// ============================================================================

/// Record a handled frame with latency.
#[inline]
pub fn record_frame(kind: &str, duration_secs: f64) {
    if let Some(c) = FRAME_COUNTER.get() {
        c.with_label_values(&[kind]).inc();
    }
    if let Some(h) = FRAME_LATENCY.get() {
        h.with_label_values(&[kind]).observe(duration_secs);
    }
}

/// Record a rejected frame.
#[inline]
pub fn record_frame_error(kind: &str, error: &str) {
    if let Some(c) = FRAME_ERRORS.get() {
        c.with_label_values(&[kind, error]).inc();
    }
}

/// Record a handshake outcome.
#[inline]
pub fn record_handshake(outcome: &str) {
    if let Some(c) = HANDSHAKES.get() {
        c.with_label_values(&[outcome]).inc();
    }
}

/// Update the registered sessions gauge.
#[inline]
pub fn set_sessions_active(count: usize) {
    if let Some(g) = SESSIONS_ACTIVE.get() {
        g.set(count as i64);
    }
}

#[inline]
pub fn inc_persisted() {
    if let Some(c) = MESSAGES_PERSISTED.get() {
        c.inc();
    }
}

#[inline]
pub fn inc_delivered() {
    if let Some(c) = FORWARDS_DELIVERED.get() {
        c.inc();
    }
}

/// Record a forward that was not delivered.
#[inline]
pub fn record_forward_dropped(reason: &str) {
    if let Some(c) = FORWARDS_DROPPED.get() {
        c.with_label_values(&[reason]).inc();
    }
}
