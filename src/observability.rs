//! Metrics for host activity, via `metrics-rs`.
//!
//! | Metric | Type | Description |
//! |--------|------|-------------|
//! | `armature_events_dispatched` | Counter | Event deliveries to subscribers |
//! | `armature_timers_fired` | Counter | Timer callback invocations |
//! | `armature_modules_loaded` | Counter | Modules that reached `Active` |
//! | `armature_modules_failed` | Counter | Modules rejected or failed |
//!
//! Metrics are recorded unconditionally; attach an exporter (prometheus,
//! statsd, ...) to collect them. Structured logging goes through `tracing`
//! at the call sites; module-originated records use the
//! `armature::plugin` target.

use metrics::Unit;
use std::sync::atomic::{AtomicBool, Ordering};

const EVENTS_DISPATCHED: &str = "armature_events_dispatched";
const TIMERS_FIRED: &str = "armature_timers_fired";
const MODULES_LOADED: &str = "armature_modules_loaded";
const MODULES_FAILED: &str = "armature_modules_failed";

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Register metric descriptions.
///
/// Call once at startup, before attaching an exporter. Safe to call
/// multiple times (subsequent calls are no-ops).
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    metrics::describe_counter!(
        EVENTS_DISPATCHED,
        Unit::Count,
        "Total event deliveries to subscribers"
    );
    metrics::describe_counter!(
        TIMERS_FIRED,
        Unit::Count,
        "Total timer callback invocations"
    );
    metrics::describe_counter!(
        MODULES_LOADED,
        Unit::Count,
        "Modules that reached the active state"
    );
    metrics::describe_counter!(
        MODULES_FAILED,
        Unit::Count,
        "Modules rejected at validation or failed during load"
    );
}

/// Record event deliveries from one `send`.
pub fn record_events_dispatched(count: u64) {
    if count > 0 {
        metrics::counter!(EVENTS_DISPATCHED).increment(count);
    }
}

/// Record one timer firing.
pub fn record_timer_fired() {
    metrics::counter!(TIMERS_FIRED).increment(1);
}

/// Record one module reaching `Active`.
pub fn record_module_loaded() {
    metrics::counter!(MODULES_LOADED).increment(1);
}

/// Record one module rejection or load failure.
pub fn record_module_failed() {
    metrics::counter!(MODULES_FAILED).increment(1);
}
