//! Rustcast trainer - fits one LSTM per commodity
//!
//! Reads per-commodity CSV files from the dataset directory, trains a
//! model for each and writes the artifacts (weights, scaler, metadata)
//! to the artifact directory. A failure on one commodity does not stop
//! the batch.
//!
//! # Usage
//! ```sh
//! cargo run --bin train -- --commodity beras_medium
//! cargo run --bin train                              # whole dataset dir
//! ```
//!
//! # Environment Variables
//! - `DATASET_DIR` / `ARTIFACT_DIR` - input and output directories
//! - `DATABASE_URL` - optional; cleaned series are mirrored there
//! - `FORECAST_WINDOW`, `TRAIN_MAX_EPOCHS`, ... - hyperparameters

use anyhow::Result;
use clap::Parser;
use rustcast::application::cleaner::Cleaner;
use rustcast::application::pipeline::ForecastPipeline;
use rustcast::config::Config;
use rustcast::domain::repositories::ObservationRepository;
use rustcast::domain::series::normalize_key;
use rustcast::infrastructure::artifact_store::ArtifactStore;
use rustcast::infrastructure::dataset::CsvDatasetSource;
use rustcast::infrastructure::observability::Metrics;
use rustcast::infrastructure::persistence::{Database, SqliteObservationRepository};
use std::path::PathBuf;
use tracing::{Level, error, info, warn};
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Train a single commodity (dataset file stem); default is every
    /// CSV in the dataset directory
    #[arg(long)]
    commodity: Option<String>,

    /// Override the dataset directory from the environment
    #[arg(long)]
    datasets: Option<PathBuf>,

    /// Write the Prometheus text exposition of training metrics here
    #[arg(long)]
    metrics_out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false).pretty();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    info!("Rustcast trainer {} starting...", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let config = Config::from_env()?;

    let dataset_dir = args
        .datasets
        .unwrap_or_else(|| PathBuf::from(&config.data.dataset_dir));
    let source = CsvDatasetSource::new(
        dataset_dir.clone(),
        config.data.csv_delimiter,
        config.schema_mapping(),
    );

    let store = ArtifactStore::new(&config.data.artifact_dir);
    let mut pipeline = ForecastPipeline::new(config.pipeline_config(), store);

    let metrics = if config.observability.enabled {
        let metrics = Metrics::new()?;
        pipeline = pipeline.with_observability(metrics.clone());
        Some(metrics)
    } else {
        None
    };

    let mirror = match &config.data.database_url {
        Some(url) => {
            let db = Database::new(url).await?;
            Some(SqliteObservationRepository::new(db.pool.clone()))
        }
        None => None,
    };

    let commodities = match args.commodity {
        Some(one) => vec![one],
        None => source.list_commodities().await?,
    };
    if commodities.is_empty() {
        warn!("No dataset files found in {:?}", dataset_dir);
        return Ok(());
    }
    info!(count = commodities.len(), "Training batch assembled");

    let mut trained = 0usize;
    let mut failed = 0usize;

    for commodity in &commodities {
        let key = normalize_key(commodity);
        let raw = match source.fetch_series(&key).await {
            Ok(raw) => raw,
            Err(e) => {
                error!(commodity = %key, "Failed to read dataset: {e:#}");
                failed += 1;
                continue;
            }
        };

        match pipeline.train(&key, &raw) {
            Ok(outcome) => {
                info!(
                    commodity = %key,
                    rmse = outcome.metrics.rmse,
                    mae = outcome.metrics.mae,
                    epochs = outcome.report.epochs_run,
                    best_epoch = outcome.report.best_epoch,
                    "Training complete, artifacts at {:?}",
                    outcome.artifact.meta.parent()
                );
                trained += 1;

                if let Some(repo) = &mirror {
                    // Dates were already validated during training, so a
                    // parse failure here would be a bug, not bad input.
                    let series = Cleaner::new(1).clean(&raw)?;
                    repo.record_series(&key, series.points()).await?;
                }
            }
            Err(e) => {
                error!(commodity = %key, "Training failed: {e:#}");
                failed += 1;
            }
        }
    }

    info!(trained, failed, "Batch finished");

    if let (Some(metrics), Some(path)) = (&metrics, &args.metrics_out) {
        std::fs::write(path, metrics.export()?)?;
        info!("Metrics written to {path:?}");
    }

    if trained == 0 && failed > 0 {
        anyhow::bail!("all {failed} training runs failed");
    }
    Ok(())
}
