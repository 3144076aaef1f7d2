//! Prometheus metrics definitions for evotrade
//!
//! All metrics use the `evotrade_` prefix and are read-only.

use prometheus::{
    CounterVec, Gauge, GaugeVec, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
    core::{AtomicF64, GenericGauge},
};
use std::sync::Arc;

/// Prometheus metrics for the scheduler and the population manager
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// Agent cycles by outcome (filled, failed, skipped, error)
    pub agent_cycles_total: CounterVec,
    /// Simulated executions by action and status
    pub executions_total: CounterVec,
    /// Evolution cycles by result (completed, noop, busy, error)
    pub evolution_cycles_total: CounterVec,
    /// Index of the active generation
    pub generation_index: GenericGauge<AtomicF64>,
    /// Average fitness of the last scored population
    pub population_average_fitness: GenericGauge<AtomicF64>,
    /// Agents per status at the last report
    pub agents_by_status: GaugeVec,
    /// Wall-clock duration of a scheduler tick
    pub tick_duration_seconds: Histogram,
}

impl Metrics {
    /// Create a new Metrics instance with all gauges and counters registered
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let agent_cycles_total = CounterVec::new(
            Opts::new("evotrade_agent_cycles_total", "Agent cycles by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(agent_cycles_total.clone()))?;

        let executions_total = CounterVec::new(
            Opts::new(
                "evotrade_executions_total",
                "Simulated executions by action and status",
            ),
            &["action", "status"],
        )?;
        registry.register(Box::new(executions_total.clone()))?;

        let evolution_cycles_total = CounterVec::new(
            Opts::new(
                "evotrade_evolution_cycles_total",
                "Evolution cycles by result",
            ),
            &["result"],
        )?;
        registry.register(Box::new(evolution_cycles_total.clone()))?;

        let generation_index = Gauge::with_opts(Opts::new(
            "evotrade_generation_index",
            "Index of the active generation",
        ))?;
        registry.register(Box::new(generation_index.clone()))?;

        let population_average_fitness = Gauge::with_opts(Opts::new(
            "evotrade_population_average_fitness",
            "Average fitness of the last scored population (0-100)",
        ))?;
        registry.register(Box::new(population_average_fitness.clone()))?;

        let agents_by_status = GaugeVec::new(
            Opts::new("evotrade_agents", "Agents per status"),
            &["status"],
        )?;
        registry.register(Box::new(agents_by_status.clone()))?;

        let tick_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "evotrade_tick_duration_seconds",
                "Scheduler tick duration in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;
        registry.register(Box::new(tick_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            agent_cycles_total,
            executions_total,
            evolution_cycles_total,
            generation_index,
            population_average_fitness,
            agents_by_status,
            tick_duration_seconds,
        })
    }

    /// Render all metrics in Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }

    pub fn inc_agent_cycle(&self, outcome: &str) {
        self.agent_cycles_total.with_label_values(&[outcome]).inc();
    }

    pub fn inc_execution(&self, action: &str, status: &str) {
        self.executions_total
            .with_label_values(&[action, status])
            .inc();
    }

    pub fn inc_evolution_cycle(&self, result: &str) {
        self.evolution_cycles_total
            .with_label_values(&[result])
            .inc();
    }

    pub fn set_agents_with_status(&self, status: &str, count: usize) {
        self.agents_by_status
            .with_label_values(&[status])
            .set(count as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().expect("Failed to create metrics");
        metrics.inc_agent_cycle("filled");
        assert!(metrics.render().contains("evotrade_"));
    }

    #[test]
    fn test_generation_gauge() {
        let metrics = Metrics::new().expect("Failed to create metrics");
        metrics.generation_index.set(7.0);
        let output = metrics.render();
        assert!(output.contains("evotrade_generation_index 7"));
    }

    #[test]
    fn test_execution_counter_labels() {
        let metrics = Metrics::new().expect("Failed to create metrics");
        metrics.inc_execution("BUY", "filled");
        metrics.inc_execution("SELL", "failed");
        let output = metrics.render();
        assert!(output.contains("evotrade_executions_total"));
        assert!(output.contains("BUY"));
        assert!(output.contains("failed"));
    }

    #[test]
    fn test_agents_by_status() {
        let metrics = Metrics::new().expect("Failed to create metrics");
        metrics.set_agents_with_status("running", 8);
        assert!(metrics.render().contains("evotrade_agents{status=\"running\"} 8"));
    }
}
