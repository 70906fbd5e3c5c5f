//! Statement metrics and tracing spans.
//!
//! With the `metrics` feature a process-wide [`METRICS`] instance records
//! statement counts, failures and durations through OpenTelemetry, exported
//! in Prometheus format. With the `tracing` feature, drivers wrap each
//! statement in a span from [`tracing_helpers`].

#[cfg(feature = "metrics")]
pub use self::statements::{TidemarkMetrics, METRICS};

#[cfg(feature = "metrics")]
mod statements {
    use once_cell::sync::Lazy;
    use opentelemetry::{
        global,
        metrics::{Counter, Histogram},
    };
    use opentelemetry_sdk::metrics::SdkMeterProvider;
    use std::time::Duration;

    pub static METRICS: Lazy<TidemarkMetrics> = Lazy::new(TidemarkMetrics::init);

    pub struct TidemarkMetrics {
        /// Scrape source for the Prometheus text format.
        pub registry: prometheus::Registry,
        pub queries_total: Counter<u64>,
        pub query_errors_total: Counter<u64>,
        pub query_duration: Histogram<f64>,
    }

    impl TidemarkMetrics {
        pub fn init() -> Self {
            let registry = prometheus::Registry::new();
            // without an exporter the instruments fall back to the no-op global meter
            match opentelemetry_prometheus::exporter()
                .with_registry(registry.clone())
                .build()
            {
                Ok(exporter) => {
                    let provider = SdkMeterProvider::builder().with_reader(exporter).build();
                    global::set_meter_provider(provider);
                }
                Err(err) => log::warn!("failed to build prometheus exporter: {err}"),
            }
            let meter = global::meter("tidemark");

            let queries_total = meter
                .u64_counter("tidemark_queries_total")
                .with_description("Total statements executed")
                .build();

            let query_errors_total = meter
                .u64_counter("tidemark_query_errors_total")
                .with_description("Statements that failed")
                .build();

            let query_duration = meter
                .f64_histogram("tidemark_query_duration_seconds")
                .with_description("Duration of statements")
                .build();

            Self {
                registry,
                queries_total,
                query_errors_total,
                query_duration,
            }
        }

        pub fn record_query(&self, elapsed: Duration) {
            self.queries_total.add(1, &[]);
            self.query_duration.record(elapsed.as_secs_f64(), &[]);
        }

        pub fn record_query_error(&self) {
            self.query_errors_total.add(1, &[]);
        }
    }
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::Span;

    /// Span covering one statement execution.
    pub fn execute_query_span(sql: &str) -> Span {
        tracing::info_span!("tidemark.execute", db.system = "postgresql", db.statement = sql)
    }

    /// Span covering connection establishment.
    pub fn connect_span() -> Span {
        tracing::info_span!("tidemark.connect", db.system = "postgresql")
    }
}
