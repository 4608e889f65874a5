use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Register descriptions for every metric the crate emits.
///
/// Safe to call repeatedly; only the first call reaches the recorder.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "herald_dispatch_message_sent_total",
            Unit::Count,
            "Delayed messages handed to the notification sender."
        );
        describe_counter!(
            "herald_dispatch_message_failed_total",
            Unit::Count,
            "Delayed messages dropped after a failed or malformed delivery, by reason."
        );
        describe_counter!(
            "herald_dispatch_message_retried_total",
            Unit::Count,
            "Delayed messages rescheduled after a transient delivery failure."
        );
        describe_counter!(
            "herald_dispatch_attachment_sent_total",
            Unit::Count,
            "Attachment jobs delivered."
        );
        describe_counter!(
            "herald_dispatch_attachment_failed_total",
            Unit::Count,
            "Attachment jobs lost to a failed or malformed delivery, by reason."
        );
        describe_histogram!(
            "herald_dispatch_tick_ms",
            Unit::Milliseconds,
            "Dispatch tick latency in milliseconds."
        );
        describe_counter!(
            "herald_dispatch_tick_skipped_total",
            Unit::Count,
            "Dispatch ticks skipped because the previous tick was still running."
        );
        describe_counter!(
            "herald_cache_refresh_total",
            Unit::Count,
            "Cache entries recomputed after a commit, by region."
        );
        describe_counter!(
            "herald_cache_evict_total",
            Unit::Count,
            "Cache entries evicted after a commit, by region."
        );
        describe_counter!(
            "herald_cache_hit_total",
            Unit::Count,
            "Cache reads served from the store, by region."
        );
        describe_counter!(
            "herald_cache_miss_total",
            Unit::Count,
            "Cache reads that found no entry, by region."
        );
        describe_histogram!(
            "herald_cache_apply_ms",
            Unit::Milliseconds,
            "Latency of applying one committed intent batch in milliseconds."
        );
    });
}
