//! Tracing pipeline initialisation.
//!
//! | Variable | Effect |
//! |---|---|
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | OTLP collector base URL (e.g. `http://localhost:4318`). When set, spans are exported over OTLP/HTTP. |
//! | `RUST_LOG` | Log filter (default `"info"`). |
//! | `ROVERLINK_LOG_FORMAT=json` | Emit newline-delimited JSON logs. |

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Logging and export settings resolved from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct TracingSettings {
    /// `EnvFilter` directive.
    pub filter: String,
    /// Emit JSON lines instead of the compact format.
    pub json: bool,
    /// OTLP collector URL; `None` disables span export.
    pub otlp_endpoint: Option<String>,
}

impl TracingSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            filter: present("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            json: lookup("ROVERLINK_LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json")),
            otlp_endpoint: present("OTEL_EXPORTER_OTLP_ENDPOINT"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Install the global subscriber using [`TracingSettings::from_env`].
///
/// Hold the returned guard until the process exits; dropping it flushes
/// pending spans.
pub fn init_tracing(service_name: &str) -> TracerProviderGuard {
    install(service_name, &TracingSettings::from_env())
}

fn install(service_name: &str, settings: &TracingSettings) -> TracerProviderGuard {
    let provider = settings.otlp_endpoint.as_deref().and_then(|endpoint| {
        match otlp_provider(service_name, endpoint) {
            Ok(provider) => Some(provider),
            Err(e) => {
                eprintln!("[roverlink] span export disabled: {e}");
                None
            }
        }
    });
    let otel_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer("roverlink")));

    let registry = tracing_subscriber::registry()
        .with(EnvFilter::new(&settings.filter))
        .with(otel_layer);
    if settings.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().compact().with_target(true))
            .init();
    }

    TracerProviderGuard { provider }
}

// ─────────────────────────────────────────────────────────────────────────────
// Span export
// ─────────────────────────────────────────────────────────────────────────────

/// Flushes and shuts down the span exporter when dropped.
pub struct TracerProviderGuard {
    provider: Option<SdkTracerProvider>,
}

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        let Some(provider) = self.provider.take() else {
            return;
        };
        if let Err(e) = provider.force_flush().and_then(|()| provider.shutdown()) {
            eprintln!("[roverlink] span exporter shutdown failed: {e}");
        }
    }
}

fn otlp_provider(service_name: &str, endpoint: &str) -> Result<SdkTracerProvider, String> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| format!("OTLP exporter for {endpoint}: {e}"))?;

    // Synchronous export: no Tokio runtime exists yet when this runs.
    Ok(SdkTracerProvider::builder()
        .with_resource(
            Resource::builder()
                .with_service_name(service_name.to_string())
                .build(),
        )
        .with_simple_exporter(exporter)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> TracingSettings {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        TracingSettings::from_lookup(|key| map.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn defaults_to_compact_info_without_export() {
        let s = settings(&[]);
        assert_eq!(s.filter, "info");
        assert!(!s.json);
        assert!(s.otlp_endpoint.is_none());
    }

    #[test]
    fn reads_filter_format_and_endpoint() {
        let s = settings(&[
            ("RUST_LOG", "roverlink_gateway=debug"),
            ("ROVERLINK_LOG_FORMAT", "JSON"),
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://collector:4318"),
        ]);
        assert_eq!(s.filter, "roverlink_gateway=debug");
        assert!(s.json);
        assert_eq!(s.otlp_endpoint.as_deref(), Some("http://collector:4318"));
    }

    #[test]
    fn blank_endpoint_disables_export() {
        let s = settings(&[("OTEL_EXPORTER_OTLP_ENDPOINT", "  "), ("RUST_LOG", "")]);
        assert!(s.otlp_endpoint.is_none());
        assert_eq!(s.filter, "info");
    }

    #[test]
    fn guard_without_exporter_drops_quietly() {
        drop(TracerProviderGuard { provider: None });
    }
}
