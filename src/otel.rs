//! OTLP span export.
//!
//! When an endpoint is configured, spans recorded through `tracing` (store
//! operations, http requests) are batched and shipped to an OpenTelemetry
//! collector. Without one, spans stay local and cost nothing.

use opentelemetry::{trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    trace::{Sampler, TracerProvider},
    Resource,
};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::registry::LookupSpan;

pub const SERVICE_NAME: &str = "location-history";

#[derive(Debug, thiserror::Error)]
pub enum OtelError {
    #[error("failed to create OTLP exporter: {0}")]
    Exporter(String),
}

/// Builds the tracing layer exporting to `endpoint` and installs its provider
/// globally so it lives until [`shutdown`].
pub fn init_layer<S>(
    endpoint: &str,
) -> Result<OpenTelemetryLayer<S, opentelemetry_sdk::trace::Tracer>, OtelError>
where
    S: tracing::Subscriber + for<'span> LookupSpan<'span>,
{
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| OtelError::Exporter(e.to_string()))?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_sampler(Sampler::AlwaysOn)
        .with_resource(Resource::new(vec![KeyValue::new(
            "service.name",
            SERVICE_NAME,
        )]))
        .build();

    let tracer = provider.tracer(SERVICE_NAME);
    opentelemetry::global::set_tracer_provider(provider);

    Ok(tracing_opentelemetry::layer().with_tracer(tracer))
}

/// Flushes pending spans. A no-op when no exporter was installed.
pub fn shutdown() {
    opentelemetry::global::shutdown_tracer_provider();
}
