use crate::application::cleaner::Cleaner;
use crate::application::forecaster::{Forecaster, SeedPolicy};
use crate::application::jobs::TrainingJobManager;
use crate::application::model::{LstmRegressor, ModelConfig, TrainingParams, TrainingReport};
use crate::domain::errors::ForecastError;
use crate::domain::metrics::EvaluationMetrics;
use crate::domain::scaler::MinMaxScaler;
use crate::domain::series::{ForecastPath, RawObservation, normalize_key};
use crate::domain::windowing::{make_windows, split};
use crate::infrastructure::artifact_store::{ArtifactMeta, ArtifactPaths, ArtifactStore};
use crate::infrastructure::observability::Metrics;
use anyhow::Result;
use chrono::{Duration, NaiveDate, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

/// Knobs for the whole train/forecast pipeline. Defaults reproduce the
/// production setup: window 60, horizon 30, 80/20 chronological split.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub window: usize,
    pub horizon: usize,
    pub train_fraction: f64,
    pub model: ModelConfig,
    pub training: TrainingParams,
    pub seed_policy: SeedPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window: 60,
            horizon: 30,
            train_fraction: 0.8,
            model: ModelConfig::default(),
            training: TrainingParams::default(),
            seed_policy: SeedPolicy::PadWithMean,
        }
    }
}

#[derive(Debug)]
pub struct TrainingOutcome {
    pub commodity: String,
    pub job_id: Uuid,
    pub metrics: EvaluationMetrics,
    pub report: TrainingReport,
    pub artifact: ArtifactPaths,
}

/// Facade over the forecasting core: cleaning, scaling, windowing,
/// training, artifact persistence and autoregressive forecasting.
///
/// Training holds the single job slot for its whole duration; forecasts
/// only ever read fully-written artifact pairs and may run concurrently
/// with each other.
pub struct ForecastPipeline {
    config: PipelineConfig,
    store: ArtifactStore,
    jobs: Arc<TrainingJobManager>,
    metrics: Option<Metrics>,
}

impl ForecastPipeline {
    pub fn new(config: PipelineConfig, store: ArtifactStore) -> Self {
        Self {
            config,
            store,
            jobs: Arc::new(TrainingJobManager::new()),
            metrics: None,
        }
    }

    pub fn with_observability(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn jobs(&self) -> &TrainingJobManager {
        &self.jobs
    }

    pub fn artifact_exists(&self, commodity: &str) -> bool {
        self.store.exists(&normalize_key(commodity))
    }

    /// Train a model for one commodity from its raw observations,
    /// blocking the calling thread for the duration of the fit.
    ///
    /// Claims the training slot first; a concurrent run gets a busy error.
    /// On failure the slot is released, the cause is recorded on the job,
    /// and any previously persisted artifacts stay in place.
    pub fn train(&self, commodity: &str, raw: &[RawObservation]) -> Result<TrainingOutcome> {
        let key = normalize_key(commodity);
        let job_id = self.jobs.claim(&key)?;
        self.train_claimed(job_id, &key, raw)
    }

    /// Run training on a blocking worker, decoupled from the caller.
    /// The slot is claimed before spawning so "busy" surfaces immediately
    /// rather than inside the join handle.
    pub fn spawn_training(
        self: &Arc<Self>,
        commodity: &str,
        raw: Vec<RawObservation>,
    ) -> Result<(Uuid, JoinHandle<Result<TrainingOutcome>>)> {
        let key = normalize_key(commodity);
        let job_id = self.jobs.claim(&key)?;

        let pipeline = Arc::clone(self);
        let handle =
            tokio::task::spawn_blocking(move || pipeline.train_claimed(job_id, &key, &raw));
        Ok((job_id, handle))
    }

    fn train_claimed(
        &self,
        job_id: Uuid,
        key: &str,
        raw: &[RawObservation],
    ) -> Result<TrainingOutcome> {
        info!(commodity = key, job = %job_id, "training started");

        match self.run_training(job_id, key, raw) {
            Ok(outcome) => {
                self.jobs.complete(job_id, outcome.metrics)?;
                if let Some(metrics) = &self.metrics {
                    metrics.record_training_success(key, &outcome.metrics);
                }
                info!(
                    commodity = key,
                    rmse = outcome.metrics.rmse,
                    mae = outcome.metrics.mae,
                    "training completed"
                );
                Ok(outcome)
            }
            Err(cause) => {
                error!(commodity = key, %cause, "training failed");
                self.jobs.fail(job_id, cause.to_string())?;
                if let Some(metrics) = &self.metrics {
                    metrics.record_training_failure(key);
                }
                Err(ForecastError::TrainingFailed {
                    key: key.to_string(),
                    reason: cause.to_string(),
                }
                .into())
            }
        }
    }

    fn run_training(&self, job_id: Uuid, key: &str, raw: &[RawObservation]) -> Result<TrainingOutcome> {
        let series = Cleaner::new(self.config.window).clean(raw)?;
        let prices = series.prices();

        // Fit the scaler over the chronological training portion only, so
        // the evaluation split never leaks future values into the fit.
        let fit_len = ((prices.len() as f64 * self.config.train_fraction).ceil() as usize)
            .clamp(2, prices.len());
        let scaler = MinMaxScaler::fit(&prices[..fit_len]);
        let normalized = scaler.transform(&prices);

        let examples = make_windows(&normalized, self.config.window);
        let (train_set, val_set) = split(examples, self.config.train_fraction);
        if train_set.is_empty() || val_set.is_empty() {
            // Enough rows to pass cleaning but not to populate both
            // splits; report the actual requirement.
            return Err(ForecastError::DataInsufficient {
                rows: prices.len(),
                required: self.config.window + 3,
            }
            .into());
        }

        let model_config = ModelConfig {
            window: self.config.window,
            ..self.config.model.clone()
        };
        let mut model = LstmRegressor::new(model_config)?;
        let report = model.train(&train_set, &val_set, &self.config.training)?;

        // Report metrics in original price units; normalized numbers are
        // meaningless to users.
        let predicted = scaler.inverse(&model.predict_batch(&val_set)?);
        let actual: Vec<f64> = val_set
            .iter()
            .map(|e| scaler.inverse_one(e.target))
            .collect();
        let metrics = EvaluationMetrics::from_predictions(&predicted, &actual);

        let meta = ArtifactMeta {
            commodity: key.to_string(),
            model: model.config().clone(),
            trained_at: Utc::now(),
            metrics,
            best_epoch: report.best_epoch,
            epochs_run: report.epochs_run,
        };
        let artifact = self.store.save(key, &model, &scaler, &meta)?;

        Ok(TrainingOutcome {
            commodity: key.to_string(),
            job_id,
            metrics,
            report,
            artifact,
        })
    }

    /// Forecast `horizon` days past the most recent observation, using the
    /// persisted (model, scaler) pair for this commodity.
    ///
    /// `recent` holds the latest actual observations, oldest first; the
    /// last `window` of them seed the roll-forward (short histories follow
    /// the configured seed policy). Fails with a not-found condition when
    /// no trained artifact exists; never falls back to a default value.
    pub fn forecast(
        &self,
        commodity: &str,
        recent: &[(NaiveDate, f64)],
        horizon: usize,
    ) -> Result<ForecastPath> {
        let key = normalize_key(commodity);
        let artifact = self.store.load(&key)?;

        let last_date = recent
            .last()
            .map(|(d, _)| *d)
            .ok_or(ForecastError::SeedTooShort {
                actual: 0,
                required: self.config.window,
            })?;
        let seed_prices: Vec<f64> = recent.iter().map(|(_, p)| *p).collect();

        let predicted = Forecaster::forecast(
            &artifact.model,
            &artifact.scaler,
            &seed_prices,
            artifact.meta.model.window,
            horizon,
            self.config.seed_policy,
        )?;

        let points: Vec<(NaiveDate, f64)> = predicted
            .into_iter()
            .enumerate()
            .map(|(i, price)| (last_date + Duration::days(i as i64 + 1), price))
            .collect();

        if let Some(metrics) = &self.metrics {
            metrics.record_forecast(&key);
        }
        info!(commodity = key, horizon, "forecast served");

        Ok(ForecastPath {
            commodity: key,
            points,
        })
    }
}
