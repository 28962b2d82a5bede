//! Provider-level counters. Request-level metrics come from
//! `service_core::middleware::metrics_middleware`.

use metrics::counter;

/// Record the outcome of one provider stage (`initialize`, `messaging`, `send`).
pub fn record_provider_call(stage: &'static str, status: &'static str) {
    counter!("push_provider_calls_total", "stage" => stage, "status" => status).increment(1);
}

/// Record a notification accepted by the provider.
pub fn record_sent(provider: &'static str) {
    counter!("push_notifications_sent_total", "provider" => provider).increment(1);
}
