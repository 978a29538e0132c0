//! Metrics instrumentation for edge-failover.
//!
//! All metrics are prefixed with `edge_failover.`

use metrics::{counter, gauge, histogram};
use std::time::Instant;

use crate::error::ProbeError;
use crate::failover::FailoverMode;

/// Which probe ran.
#[derive(Debug, Clone, Copy)]
pub enum ProbeKind {
    /// Public IP fetch.
    PublicIp,
    /// Primary link reachability.
    Reachability,
}

/// Record a probe outcome.
pub fn record_probe(kind: ProbeKind, error: Option<&ProbeError>) {
    let kind_str = match kind {
        ProbeKind::PublicIp => "public_ip",
        ProbeKind::Reachability => "reachability",
    };
    let result_str = match error {
        None => "success",
        Some(ProbeError::Timeout { .. }) => "timeout",
        Some(ProbeError::Network { .. }) => "network",
        Some(ProbeError::Status { .. }) => "non_2xx",
        Some(ProbeError::Body { .. }) => "body",
        Some(ProbeError::Decode { .. }) => "decode",
    };

    counter!("edge_failover.probe.count", "probe" => kind_str, "result" => result_str)
        .increment(1);
}

/// DNS check result type for metrics.
#[derive(Debug, Clone, Copy)]
pub enum DnsCheckResult {
    /// Published record matches the public IP.
    UpToDate,
    /// Record differs and an update was attempted.
    Changed,
    /// A probe failed and an update was forced.
    Forced,
    /// Nothing could be done this tick.
    Skipped,
}

/// Record one DNS loop check.
pub fn record_dns_check(result: DnsCheckResult) {
    let result_str = match result {
        DnsCheckResult::UpToDate => "up_to_date",
        DnsCheckResult::Changed => "changed",
        DnsCheckResult::Forced => "forced",
        DnsCheckResult::Skipped => "skipped",
    };

    counter!("edge_failover.dns.check.count", "result" => result_str).increment(1);
}

/// Record an upsert into one hosted zone.
pub fn record_zone_upsert(purpose: &'static str, success: bool) {
    let result_str = if success { "success" } else { "error" };
    counter!("edge_failover.dns.upsert.count", "purpose" => purpose, "result" => result_str)
        .increment(1);
}

/// Record a failover transition attempt.
pub fn record_transition(target: FailoverMode, success: bool) {
    let result_str = if success { "success" } else { "error" };
    counter!(
        "edge_failover.failover.transition.count",
        "target" => target.as_str(),
        "result" => result_str
    )
    .increment(1);
}

/// Record the current failover mode (-1 unknown, 0 normal, 1 fallback).
pub fn record_mode(mode: Option<FailoverMode>) {
    let value = match mode {
        None => -1.0,
        Some(FailoverMode::Normal) => 0.0,
        Some(FailoverMode::Fallback) => 1.0,
    };
    gauge!("edge_failover.failover.mode").set(value);
}

/// Record whether a capacity shutdown is pending.
pub fn record_shutdown_pending(pending: bool) {
    gauge!("edge_failover.failover.shutdown_pending").set(if pending { 1.0 } else { 0.0 });
}

/// Record a delayed capacity shutdown attempt.
pub fn record_shutdown(success: bool) {
    let result_str = if success { "success" } else { "error" };
    counter!("edge_failover.failover.shutdown.count", "result" => result_str).increment(1);
}

/// Record the duration of a remote API call.
pub fn record_remote_call(
    service: &'static str,
    operation: &'static str,
    duration: std::time::Duration,
) {
    histogram!(
        "edge_failover.remote.duration.seconds",
        "service" => service,
        "operation" => operation
    )
    .record(duration.as_secs_f64());
}

/// Record a reconciliation tick that panicked or failed.
pub fn record_tick_failure(loop_name: &'static str, panicked: bool) {
    let kind = if panicked { "panic" } else { "error" };
    counter!("edge_failover.loop.failure.count", "loop" => loop_name, "kind" => kind)
        .increment(1);
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}
