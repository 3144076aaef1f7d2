//! Push-based observability for evotrade
//!
//! Observability is **outbound data only**: there is no HTTP server and no
//! incoming requests. Metrics are exposed as:
//!
//! 1. **Structured JSON Logs**: periodic `METRICS_JSON:` lines on stdout
//! 2. **Prometheus text**: [`Metrics::render`] for whoever embeds the crate

pub mod metrics;
pub mod reporter;

pub use metrics::Metrics;
pub use reporter::MetricsReporter;
