//! # Telemetry Features
//!
//! Console logging through `tracing_subscriber::fmt` is always on and filtered
//! by `RUST_LOG` (default `info`). Traffic metrics always go to StatsD; the
//! features below mirror them into OpenTelemetry as well.
//!
//! ## Feature matrix
//!
//! - `metrics`: Records every traffic counter and timing as OpenTelemetry
//!   instruments, labelled with the metric name.
//! - `stdout`: Exports those instruments to stdout every 5 seconds.
//!
//! ## Example usage
//!
//! ```bash
//! cargo run -p chanload-runner --features metrics,stdout -- --api-hosts localhost:8080
//! ```

// Disallow using `stdout` without `metrics`
#[cfg(all(feature = "stdout", not(feature = "metrics")))]
compile_error!("The 'stdout' feature requires 'metrics' to be enabled.");

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Counter, Histogram, Meter};
#[cfg(feature = "metrics")]
use opentelemetry::{InstrumentationScope, KeyValue};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::Resource;
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics as sdkmetrics;
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

pub struct TelemetryProviders {
    #[cfg(feature = "metrics")]
    pub meter_provider: sdkmetrics::SdkMeterProvider,
}

impl TelemetryProviders {
    /// Flushes pending exports and releases the providers. Errors are
    /// printed because the log subscriber may already be gone.
    pub fn shutdown(self) {
        #[cfg(feature = "metrics")]
        {
            if let Err(err) = self.meter_provider.force_flush() {
                eprintln!("Error flushing metrics: {err:#?}");
            }
            if let Err(err) = self.meter_provider.shutdown() {
                eprintln!("Error shutting down meter: {err:#?}");
            }
        }
    }
}

pub fn init_telemetry() -> anyhow::Result<TelemetryProviders> {
    #[cfg(feature = "metrics")]
    let meter_provider = init_metrics()?;

    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true)
                .compact(),
        );

    #[cfg(feature = "metrics")]
    {
        opentelemetry::global::set_meter_provider(meter_provider.clone());
        let scope = InstrumentationScope::builder("chanload")
            .with_version(env!("CARGO_PKG_VERSION"))
            .build();
        init_metric_handles(opentelemetry::global::meter_with_scope(scope));
    }

    registry.init();

    Ok(TelemetryProviders {
        #[cfg(feature = "metrics")]
        meter_provider,
    })
}

#[cfg(feature = "metrics")]
fn resource() -> Resource {
    Resource::builder()
        .with_service_name("chanload-runner")
        .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
        .build()
}

#[cfg(feature = "metrics")]
fn init_metrics() -> anyhow::Result<sdkmetrics::SdkMeterProvider> {
    let builder = sdkmetrics::SdkMeterProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = {
        use opentelemetry_stdout::MetricExporter;
        let exporter = MetricExporter::default();
        let reader = sdkmetrics::PeriodicReader::builder(exporter)
            .with_interval(std::time::Duration::from_secs(5))
            .build();

        builder.with_reader(reader)
    };

    Ok(builder.build())
}

#[cfg(feature = "metrics")]
static TRAFFIC: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static TRAFFIC_TIMING_MS: OnceLock<Histogram<f64>> = OnceLock::new();

#[cfg(feature = "metrics")]
fn init_metric_handles(meter: Meter) {
    let _ = TRAFFIC.set(
        meter
            .u64_counter("traffic")
            .with_description("Traffic actions and their outcomes")
            .build(),
    );

    let _ = TRAFFIC_TIMING_MS.set(
        meter
            .f64_histogram("traffic_timing")
            .with_unit("ms")
            .with_description("Remote call latencies and listing sizes")
            .build(),
    );
}

#[cfg(feature = "metrics")]
pub fn increment_traffic(name: &str) {
    if let Some(counter) = TRAFFIC.get() {
        counter.add(1, &[KeyValue::new("name", name.to_owned())]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_traffic(_name: &str) {}

#[cfg(feature = "metrics")]
pub fn record_traffic_timing(name: &str, millis: u64) {
    if let Some(histogram) = TRAFFIC_TIMING_MS.get() {
        histogram.record(millis as f64, &[KeyValue::new("name", name.to_owned())]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_traffic_timing(_name: &str, _millis: u64) {}
