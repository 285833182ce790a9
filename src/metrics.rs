//! Metrics instrumentation for ospfip-dns.
//!
//! All metrics are prefixed with `ospfip_dns.`

use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// Record a DNS query.
pub fn record_query(record_type: &str, result: QueryResult, duration: std::time::Duration) {
    let result_str = match result {
        QueryResult::Answered => "answered",
        QueryResult::Delegated => "delegated",
        QueryResult::ServerFailure => "servfail",
        QueryResult::FormatError => "formerr",
    };

    counter!("ospfip_dns.query.count", "type" => record_type.to_string(), "result" => result_str)
        .increment(1);
    histogram!("ospfip_dns.query.duration.seconds", "type" => record_type.to_string())
        .record(duration.as_secs_f64());
}

/// Query result type for metrics.
#[derive(Debug, Clone, Copy)]
pub enum QueryResult {
    /// Query answered from the snapshot.
    Answered,
    /// Query passed to the next handler.
    Delegated,
    /// Query failed with a server failure.
    ServerFailure,
    /// Request had no readable question.
    FormatError,
}

/// Record a refresh cycle.
pub fn record_refresh(outcome: RefreshOutcome, duration: std::time::Duration) {
    let outcome_str = match outcome {
        RefreshOutcome::Success => "success",
        RefreshOutcome::FetchError => "fetch_error",
        RefreshOutcome::AssemblyError => "assembly_error",
    };

    counter!("ospfip_dns.refresh.count", "result" => outcome_str).increment(1);
    histogram!("ospfip_dns.refresh.duration.seconds").record(duration.as_secs_f64());
}

/// Refresh cycle outcomes.
#[derive(Debug, Clone, Copy)]
pub enum RefreshOutcome {
    /// New snapshot installed.
    Success,
    /// Inventory could not be listed.
    FetchError,
    /// Snapshot could not be assembled.
    AssemblyError,
}

/// Record a floating IP skipped during assembly.
pub fn record_skipped(reason: SkipReason) {
    let reason_str = match reason {
        SkipReason::NoClaim => "no_claim",
        SkipReason::OutsideOrigins => "outside_origins",
        SkipReason::InvalidAddress => "invalid_address",
    };

    counter!("ospfip_dns.assembly.skipped.count", "reason" => reason_str).increment(1);
}

/// Why a floating IP contributed nothing.
#[derive(Debug, Clone, Copy)]
pub enum SkipReason {
    /// No tag held a valid domain.
    NoClaim,
    /// Claimed name is not under a configured origin.
    OutsideOrigins,
    /// Floating IP address did not parse.
    InvalidAddress,
}

/// Record the size of the installed snapshot.
pub fn record_snapshot_counts(zones: usize, records: usize, reverse: usize) {
    gauge!("ospfip_dns.snapshot.zones.count").set(zones as f64);
    gauge!("ospfip_dns.snapshot.records.count").set(records as f64);
    gauge!("ospfip_dns.snapshot.reverse.count").set(reverse as f64);
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
