use anyhow::Result;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram, Meter, MeterProvider},
};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use tracing::info;

/// Owns the meter provider and the thumbnail instruments built from it
#[derive(Clone)]
pub struct AppObservability {
    pub thumbnails: ThumbnailMetrics,
}

impl AppObservability {
    pub fn new(service_name: &str) -> Result<Self> {
        let provider = SdkMeterProvider::builder().build();
        global::set_meter_provider(provider.clone());

        let meter = provider.meter("thumb-proxy");
        info!("Metrics initialized for {} (local meter provider)", service_name);

        let thumbnails = ThumbnailMetrics::new(&meter);
        Ok(Self { thumbnails })
    }
}

/// Pre-built instruments for the thumbnail pipeline
#[derive(Clone)]
pub struct ThumbnailMetrics {
    pub requests: Counter<u64>,
    pub upstream_fallbacks: Counter<u64>,
    pub cache_write_failures: Counter<u64>,
    pub pipeline_duration: Histogram<f64>,
}

impl ThumbnailMetrics {
    pub fn new(meter: &Meter) -> Self {
        let requests = meter
            .u64_counter("thumbnail_requests_total")
            .with_description("Thumbnail requests by outcome")
            .build();
        let upstream_fallbacks = meter
            .u64_counter("thumbnail_upstream_fallbacks_total")
            .with_description("Thumbnails served from the fallback upstream tier")
            .build();
        let cache_write_failures = meter
            .u64_counter("thumbnail_cache_write_failures_total")
            .with_description("Normalized thumbnails that could not be persisted")
            .build();
        let pipeline_duration = meter
            .f64_histogram("thumbnail_pipeline_duration_seconds")
            .with_description("Time from cache miss to response bytes")
            .build();

        Self {
            requests,
            upstream_fallbacks,
            cache_write_failures,
            pipeline_duration,
        }
    }

    /// Instruments bound to the global meter, a no-op until a provider is installed
    pub fn global() -> Self {
        Self::new(&global::meter("thumb-proxy"))
    }

    pub fn record_request(&self, outcome: &'static str) {
        self.requests.add(1, &[KeyValue::new("outcome", outcome)]);
    }

    pub fn record_upstream_fallback(&self) {
        self.upstream_fallbacks.add(1, &[]);
    }

    pub fn record_cache_write_failure(&self) {
        self.cache_write_failures.add(1, &[]);
    }

    pub fn record_pipeline_duration(&self, seconds: f64, outcome: &'static str) {
        self.pipeline_duration
            .record(seconds, &[KeyValue::new("outcome", outcome)]);
    }
}
