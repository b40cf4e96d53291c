//! Prometheus metrics definitions for Rustcast
//!
//! All metrics use the `rustcast_` prefix. The registry is push/scrape
//! agnostic: `export` renders the text format, callers decide where it
//! goes.

use crate::domain::metrics::EvaluationMetrics;
use prometheus::{
    CounterVec, GaugeVec, Opts, Registry, TextEncoder,
    core::{AtomicF64, GenericGaugeVec},
};
use std::sync::Arc;

/// Metrics sink for the forecasting core. Optional: the pipeline works
/// without one.
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// RMSE of the latest completed training run, per commodity,
    /// denormalized (original price scale)
    pub training_rmse: GenericGaugeVec<AtomicF64>,
    /// MAE of the latest completed training run, per commodity
    pub training_mae: GenericGaugeVec<AtomicF64>,
    /// Training runs by commodity and outcome
    pub training_runs_total: CounterVec,
    /// Forecast requests served, per commodity
    pub forecasts_total: CounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let training_rmse = GaugeVec::new(
            Opts::new(
                "rustcast_training_rmse",
                "RMSE of the latest training run in original price units",
            ),
            &["commodity"],
        )?;
        registry.register(Box::new(training_rmse.clone()))?;

        let training_mae = GaugeVec::new(
            Opts::new(
                "rustcast_training_mae",
                "MAE of the latest training run in original price units",
            ),
            &["commodity"],
        )?;
        registry.register(Box::new(training_mae.clone()))?;

        let training_runs_total = CounterVec::new(
            Opts::new("rustcast_training_runs_total", "Training runs by outcome"),
            &["commodity", "status"],
        )?;
        registry.register(Box::new(training_runs_total.clone()))?;

        let forecasts_total = CounterVec::new(
            Opts::new("rustcast_forecasts_total", "Forecast requests served"),
            &["commodity"],
        )?;
        registry.register(Box::new(forecasts_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            training_rmse,
            training_mae,
            training_runs_total,
            forecasts_total,
        })
    }

    pub fn record_training_success(&self, commodity: &str, metrics: &EvaluationMetrics) {
        self.training_rmse
            .with_label_values(&[commodity])
            .set(metrics.rmse);
        self.training_mae
            .with_label_values(&[commodity])
            .set(metrics.mae);
        self.training_runs_total
            .with_label_values(&[commodity, "completed"])
            .inc();
    }

    pub fn record_training_failure(&self, commodity: &str) {
        self.training_runs_total
            .with_label_values(&[commodity, "failed"])
            .inc();
    }

    pub fn record_forecast(&self, commodity: &str) {
        self.forecasts_total.with_label_values(&[commodity]).inc();
    }

    /// Render the registry in the Prometheus text format.
    pub fn export(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        Ok(encoder.encode_to_string(&self.registry.gather())?)
    }
}
