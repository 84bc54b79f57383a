//! Metrics definitions for the quotes service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `qs_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `method`: HTTP verbs
//! - `endpoint`: parameterized paths (`/groups/{id}/users/{user_id}`)
//! - `outcome` / `result`: fixed sets chosen by the caller
//! - `region`: cache region names, fixed at construction

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle serving
/// `/metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("qs_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // JWKS fetches are bounded by the fetch timeout
        .set_buckets_for_metric(
            Matcher::Prefix("qs_key_set_fetch".to_string()),
            &[0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000],
        )
        .map_err(|e| format!("Failed to set key set fetch buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion.
///
/// Metric: `qs_http_requests_total`, `qs_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("qs_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("qs_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Replace numeric path segments with placeholders.
///
/// `/groups/7/users/3` becomes `/groups/{id}/users/{user_id}`. Anything
/// outside the known route shapes collapses to `/other`.
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/health" | "/metrics" | "/users/me" | "/groups" | "/groups/me" | "/groups/invite" => {
            return path.to_string();
        }
        _ => {}
    }

    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    let is_id = |s: &&str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    match segments.as_slice() {
        ["groups", id] if is_id(id) => "/groups/{id}".to_string(),
        ["groups", id, "users"] if is_id(id) => "/groups/{id}/users".to_string(),
        ["groups", id, "users", "me"] if is_id(id) => "/groups/{id}/users/me".to_string(),
        ["groups", id, "users", user] if is_id(id) && is_id(user) => {
            "/groups/{id}/users/{user_id}".to_string()
        }
        _ => "/other".to_string(),
    }
}

// ============================================================================
// Authentication Metrics
// ============================================================================

/// Record a token verification outcome.
///
/// Metric: `qs_token_validations_total`
/// Labels: `outcome` (`success`, `invalid`)
pub fn record_token_validation(outcome: &str) {
    counter!("qs_token_validations_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record a key-set fetch against the authority.
///
/// Metric: `qs_key_set_fetches_total`, `qs_key_set_fetch_duration_seconds`
/// Labels: `outcome` (`success`, `error`, `rate_limited`)
pub fn record_key_set_fetch(outcome: &str, duration: Duration) {
    counter!("qs_key_set_fetches_total", "outcome" => outcome.to_string()).increment(1);
    histogram!("qs_key_set_fetch_duration_seconds", "outcome" => outcome.to_string())
        .record(duration.as_secs_f64());
}

/// Record an identity provisioning attempt.
///
/// Metric: `qs_provisioning_total`
/// Labels: `outcome` (`created`, `authority_failed`, `insert_failed`)
pub fn record_provisioning(outcome: &str) {
    counter!("qs_provisioning_total", "outcome" => outcome.to_string()).increment(1);
}

// ============================================================================
// Cache Metrics
// ============================================================================

/// Record a cache region lookup.
///
/// Metric: `qs_cache_lookups_total`
/// Labels: `region`, `result` (`hit`, `miss`)
pub fn record_cache_lookup(region: &'static str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("qs_cache_lookups_total", "region" => region, "result" => result).increment(1);
}

/// Publish the current entry count of a cache region.
///
/// Metric: `qs_cache_entries`
/// Labels: `region`
#[allow(clippy::cast_precision_loss)]
pub fn set_cache_entries(region: &'static str, entries: u64) {
    gauge!("qs_cache_entries", "region" => region).set(entries as f64);
}
