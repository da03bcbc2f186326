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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "varco_resolution_cache_hit_total",
            Unit::Count,
            "Total number of resolution cache hits."
        );
        describe_counter!(
            "varco_resolution_cache_miss_total",
            Unit::Count,
            "Total number of resolution cache misses."
        );
        describe_counter!(
            "varco_pointer_store_error_total",
            Unit::Count,
            "Total number of transient pointer store failures absorbed."
        );
        describe_counter!(
            "varco_content_cache_hit_total",
            Unit::Count,
            "Total number of content cache hits."
        );
        describe_counter!(
            "varco_content_cache_miss_total",
            Unit::Count,
            "Total number of content cache misses."
        );
        describe_counter!(
            "varco_content_cache_evict_total",
            Unit::Count,
            "Total number of content cache evictions due to the byte budget."
        );
        describe_counter!(
            "varco_content_cache_expired_total",
            Unit::Count,
            "Total number of content cache entries dropped at their TTL."
        );
        describe_counter!(
            "varco_content_cache_oversize_total",
            Unit::Count,
            "Total number of payloads served uncached for exceeding the byte budget."
        );
        describe_counter!(
            "varco_object_store_error_total",
            Unit::Count,
            "Total number of transient object store failures absorbed."
        );
        describe_histogram!(
            "varco_object_fetch_ms",
            Unit::Milliseconds,
            "Object store fetch latency in milliseconds."
        );
    });
}
