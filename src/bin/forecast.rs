//! Rustcast forecaster - rolls a trained model forward
//!
//! Loads the saved artifacts for a commodity, seeds the window from the
//! most recent observations and prints one predicted price per future
//! day. Observations come from the SQLite mirror when `DATABASE_URL` is
//! set, otherwise from the dataset CSV files.
//!
//! # Usage
//! ```sh
//! cargo run --bin forecast -- --commodity beras_medium --horizon 30
//! ```

use anyhow::Result;
use clap::Parser;
use rustcast::application::pipeline::ForecastPipeline;
use rustcast::config::Config;
use rustcast::domain::repositories::ObservationRepository;
use rustcast::domain::series::normalize_key;
use rustcast::infrastructure::artifact_store::ArtifactStore;
use rustcast::infrastructure::dataset::CsvDatasetSource;
use rustcast::infrastructure::persistence::{Database, SqliteObservationRepository};
use std::path::PathBuf;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Commodity to forecast (dataset file stem)
    #[arg(long)]
    commodity: String,

    /// Days ahead to predict; default comes from FORECAST_HORIZON
    #[arg(long)]
    horizon: Option<usize>,

    /// Override the dataset directory from the environment
    #[arg(long)]
    datasets: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false).pretty();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;
    let key = normalize_key(&args.commodity);
    let horizon = args.horizon.unwrap_or(config.training.horizon);

    let store = ArtifactStore::new(&config.data.artifact_dir);
    let pipeline = ForecastPipeline::new(config.pipeline_config(), store);

    let recent = match &config.data.database_url {
        Some(url) => {
            let db = Database::new(url).await?;
            let repo = SqliteObservationRepository::new(db.pool.clone());
            repo.recent_observations(&key, config.training.window)
                .await?
        }
        None => {
            let dataset_dir = args
                .datasets
                .unwrap_or_else(|| PathBuf::from(&config.data.dataset_dir));
            let source = CsvDatasetSource::new(
                dataset_dir,
                config.data.csv_delimiter,
                config.schema_mapping(),
            );
            source
                .recent_observations(&key, config.training.window)
                .await?
        }
    };

    info!(
        commodity = %key,
        seed_points = recent.len(),
        horizon,
        "Forecasting"
    );

    let path = pipeline.forecast(&key, &recent, horizon)?;

    println!("Forecast for {} ({} days):", path.commodity, horizon);
    for (date, price) in &path.points {
        println!("  {date}  {price:>12.2}");
    }

    Ok(())
}
