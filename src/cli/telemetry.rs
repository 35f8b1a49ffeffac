//! Log output and optional OTLP trace export.
//!
//! Logs always go to stdout through a pretty `fmt` layer. Spans are also
//! exported over OTLP/gRPC when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.

use anyhow::{anyhow, Context, Result};
use base64ct::{Base64, Encoding};
use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::{global, trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::{SpanExporter, WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::{
    propagation::{BaggagePropagator, TraceContextPropagator},
    runtime,
    trace::{Tracer, TracerProvider},
    Resource,
};
use std::{collections::HashMap, env::var, sync::OnceLock, time::Duration};
use tonic::{
    metadata::{Ascii, Binary, MetadataKey, MetadataMap, MetadataValue},
    transport::ClientTlsConfig,
};
use tracing::{debug, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};
use ulid::Ulid;

const EXPORT_TIMEOUT: Duration = Duration::from_secs(3);

static TRACER_PROVIDER: OnceLock<TracerProvider> = OnceLock::new();

/// Exporter settings taken from the standard `OTEL_*` variables.
#[derive(Debug, PartialEq, Eq)]
struct OtlpSettings {
    endpoint: String,
    headers: HashMap<String, String>,
    instance_id: String,
}

impl OtlpSettings {
    /// `None` unless `OTEL_EXPORTER_OTLP_ENDPOINT` is set to something non-blank.
    fn from_env() -> Option<Self> {
        let endpoint = var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;
        if endpoint.trim().is_empty() {
            return None;
        }

        if let Ok(protocol) = var("OTEL_EXPORTER_OTLP_PROTOCOL") {
            if protocol != "grpc" {
                debug!("OTEL_EXPORTER_OTLP_PROTOCOL='{protocol}' ignored, exporting over grpc");
            }
        }

        Some(Self {
            endpoint: with_scheme(endpoint.trim()),
            headers: var("OTEL_EXPORTER_OTLP_HEADERS")
                .map(|raw| parse_otlp_headers(&raw))
                .unwrap_or_default(),
            instance_id: var("OTEL_SERVICE_INSTANCE_ID")
                .unwrap_or_else(|_| Ulid::new().to_string()),
        })
    }
}

/// `k1=v1,k2=v2`; pairs without `=` or with an empty key are skipped.
fn parse_otlp_headers(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let key = key.trim();
            (!key.is_empty()).then(|| (key.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// gRPC metadata from header pairs. Keys ending in `-bin` carry base64 values.
fn metadata_from_headers(headers: &HashMap<String, String>) -> Result<MetadataMap> {
    let mut metadata = MetadataMap::with_capacity(headers.len());

    for (name, value) in headers {
        let name = name.to_ascii_lowercase();
        if name.ends_with("-bin") {
            let key = MetadataKey::<Binary>::from_bytes(name.as_bytes())
                .map_err(|err| anyhow!("invalid binary metadata key {name}: {err}"))?;
            let bytes = Base64::decode_vec(value)
                .map_err(|err| anyhow!("failed to base64-decode value for key {name}: {err}"))?;
            metadata.insert_bin(key, MetadataValue::from_bytes(&bytes));
        } else {
            let key = MetadataKey::<Ascii>::from_bytes(name.as_bytes())
                .map_err(|err| anyhow!("invalid metadata key {name}: {err}"))?;
            let value: MetadataValue<Ascii> = value
                .parse()
                .map_err(|err| anyhow!("invalid metadata value for key {name}: {err}"))?;
            metadata.insert(key, value);
        }
    }

    Ok(metadata)
}

/// Endpoints given without a scheme are assumed to be TLS.
fn with_scheme(endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("https://{}", endpoint.trim_end_matches('/'))
    }
}

/// Host to verify the collector certificate against, for `https` endpoints.
fn tls_domain(endpoint: &str) -> Option<&str> {
    let authority = endpoint.strip_prefix("https://")?.split('/').next()?;
    let host = authority.split(':').next()?;
    (!host.is_empty()).then_some(host)
}

fn resource(instance_id: &str) -> Resource {
    Resource::new(vec![
        KeyValue::new("service.name", env!("CARGO_PKG_NAME")),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        KeyValue::new("service.instance.id", instance_id.to_string()),
    ])
}

fn span_exporter(settings: &OtlpSettings) -> Result<SpanExporter> {
    let mut builder = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&settings.endpoint)
        .with_timeout(EXPORT_TIMEOUT);

    if let Some(domain) = tls_domain(&settings.endpoint) {
        builder = builder.with_tls_config(
            ClientTlsConfig::new()
                .domain_name(domain.to_string())
                .with_native_roots(),
        );
    }
    if !settings.headers.is_empty() {
        builder = builder.with_metadata(metadata_from_headers(&settings.headers)?);
    }

    builder.build().context("failed to build OTLP span exporter")
}

fn init_tracer(settings: &OtlpSettings) -> Result<Tracer> {
    let provider = TracerProvider::builder()
        .with_batch_exporter(span_exporter(settings)?, runtime::Tokio)
        .with_resource(resource(&settings.instance_id))
        .build();

    let _ = TRACER_PROVIDER.set(provider.clone());

    global::set_tracer_provider(provider.clone());
    global::set_text_map_propagator(TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ]));

    Ok(provider.tracer(env!("CARGO_PKG_NAME")))
}

/// `RUST_LOG` wins over the CLI level; noisy dependencies are capped either way.
fn env_filter(level: Level) -> Result<EnvFilter> {
    Ok(EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
        .add_directive("hyper=error".parse()?)
        .add_directive("tokio=error".parse()?)
        .add_directive("sqlx=warn".parse()?)
        .add_directive("opentelemetry_sdk=warn".parse()?))
}

/// Install the global subscriber. `None` means errors only.
///
/// # Errors
///
/// Returns an error if the exporter or the subscriber cannot be installed.
pub fn init(verbosity_level: Option<Level>) -> Result<()> {
    let filter = env_filter(verbosity_level.unwrap_or(Level::ERROR))?;
    let fmt_layer = fmt::layer()
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_target(false)
        .pretty();

    if let Some(settings) = OtlpSettings::from_env() {
        let tracer = init_tracer(&settings)?;
        let subscriber = Registry::default()
            .with(fmt_layer)
            .with(tracing_opentelemetry::layer().with_tracer(tracer))
            .with(filter);
        tracing::subscriber::set_global_default(subscriber)?;
        debug!(endpoint = %settings.endpoint, "exporting traces over OTLP");
    } else {
        let subscriber = Registry::default().with(fmt_layer).with(filter);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}

/// Flush and stop the exporter, if one was started.
pub fn shutdown_tracer() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(err) = provider.shutdown() {
            debug!("tracer provider shutdown failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otlp_disabled_without_endpoint() {
        temp_env::with_vars(
            [
                ("OTEL_EXPORTER_OTLP_ENDPOINT", None::<&str>),
                ("OTEL_EXPORTER_OTLP_HEADERS", None),
            ],
            || assert_eq!(OtlpSettings::from_env(), None),
        );
        temp_env::with_var("OTEL_EXPORTER_OTLP_ENDPOINT", Some("  "), || {
            assert_eq!(OtlpSettings::from_env(), None);
        });
    }

    #[test]
    fn otlp_settings_from_env() {
        temp_env::with_vars(
            [
                ("OTEL_EXPORTER_OTLP_ENDPOINT", Some("otel.thebpstreet.in:4317/")),
                ("OTEL_EXPORTER_OTLP_HEADERS", Some("x-api-key=abc, team = shop")),
                ("OTEL_SERVICE_INSTANCE_ID", Some("bpstreet-1")),
            ],
            || {
                let settings = OtlpSettings::from_env();
                assert_eq!(
                    settings,
                    Some(OtlpSettings {
                        endpoint: "https://otel.thebpstreet.in:4317".to_string(),
                        headers: HashMap::from([
                            ("x-api-key".to_string(), "abc".to_string()),
                            ("team".to_string(), "shop".to_string()),
                        ]),
                        instance_id: "bpstreet-1".to_string(),
                    })
                );
            },
        );
    }

    #[test]
    fn instance_id_defaults_to_ulid() {
        temp_env::with_vars(
            [
                ("OTEL_EXPORTER_OTLP_ENDPOINT", Some("http://localhost:4317")),
                ("OTEL_SERVICE_INSTANCE_ID", None),
            ],
            || {
                let id = OtlpSettings::from_env().map(|settings| settings.instance_id);
                assert_eq!(id.as_deref().map(str::len), Some(26));
            },
        );
    }

    #[test]
    fn header_pairs_skip_junk() {
        assert!(parse_otlp_headers("").is_empty());
        let headers = parse_otlp_headers("a=1,malformed,=orphan,b=x=y");
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("a").map(String::as_str), Some("1"));
        assert_eq!(headers.get("b").map(String::as_str), Some("x=y"));
    }

    #[test]
    fn metadata_handles_ascii_and_binary() -> Result<()> {
        let headers = HashMap::from([
            ("Authorization".to_string(), "Bearer token123".to_string()),
            ("trace-bin".to_string(), "YmluYXJ5IGRhdGE=".to_string()),
        ]);
        let metadata = metadata_from_headers(&headers)?;
        assert_eq!(metadata.len(), 2);
        assert!(metadata.get("authorization").is_some());
        Ok(())
    }

    #[test]
    fn metadata_rejects_bad_base64() {
        let headers = HashMap::from([("trace-bin".to_string(), "not base64!!".to_string())]);
        let result = metadata_from_headers(&headers);
        assert!(result.is_err());
        if let Err(err) = result {
            assert!(err.to_string().contains("failed to base64-decode"));
        }
    }

    #[test]
    fn endpoint_scheme_and_tls_domain() {
        assert_eq!(with_scheme("http://localhost:4317"), "http://localhost:4317");
        assert_eq!(with_scheme("collector:4317/"), "https://collector:4317");
        assert_eq!(tls_domain("https://collector:4317/v1/traces"), Some("collector"));
        assert_eq!(tls_domain("https://collector"), Some("collector"));
        assert_eq!(tls_domain("http://localhost:4317"), None);
        assert_eq!(tls_domain("https://:4317"), None);
    }

    #[test]
    fn resource_names_the_service() {
        let resource = resource("instance-7");
        let attributes: HashMap<String, String> = resource
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        assert_eq!(
            attributes.get("service.name").map(String::as_str),
            Some("bpstreet")
        );
        assert_eq!(
            attributes.get("service.instance.id").map(String::as_str),
            Some("instance-7")
        );
    }

    #[test]
    fn filter_accepts_every_level() -> Result<()> {
        for level in [Level::ERROR, Level::WARN, Level::INFO, Level::DEBUG, Level::TRACE] {
            env_filter(level)?;
        }
        Ok(())
    }

    #[test]
    fn shutdown_without_provider_is_noop() {
        shutdown_tracer();
    }
}
