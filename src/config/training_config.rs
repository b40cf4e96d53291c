//! Training and forecasting hyperparameter parsing from environment
//! variables.

use crate::application::forecaster::SeedPolicy;
use anyhow::{Context, Result, bail};
use std::env;

/// Training environment configuration
#[derive(Debug, Clone)]
pub struct TrainingEnvConfig {
    // Windowing
    pub window: usize,
    pub horizon: usize,
    pub train_fraction: f64,

    // Network shape
    pub hidden_units: usize,
    pub dropout: f32,

    // Optimization
    pub max_epochs: usize,
    pub batch_size: usize,
    pub patience: usize,
    pub learning_rate: f64,

    // Forecast seeding
    pub seed_policy: SeedPolicy,
}

impl TrainingEnvConfig {
    pub fn from_env() -> Result<Self> {
        let seed_policy_str = env::var("SEED_POLICY").unwrap_or_else(|_| "pad".to_string());
        let seed_policy = match seed_policy_str.to_lowercase().as_str() {
            "pad" => SeedPolicy::PadWithMean,
            "reject" => SeedPolicy::Reject,
            other => bail!("Invalid SEED_POLICY: {}. Must be 'pad' or 'reject'", other),
        };

        let train_fraction = Self::parse_f64("TRAIN_FRACTION", 0.8)?;
        if !(0.0..1.0).contains(&train_fraction) {
            bail!("TRAIN_FRACTION must be in (0, 1), got {}", train_fraction);
        }

        Ok(Self {
            window: Self::parse_usize("FORECAST_WINDOW", 60)?,
            horizon: Self::parse_usize("FORECAST_HORIZON", 30)?,
            train_fraction,
            hidden_units: Self::parse_usize("LSTM_HIDDEN_UNITS", 50)?,
            dropout: Self::parse_f64("LSTM_DROPOUT", 0.2)? as f32,
            max_epochs: Self::parse_usize("TRAIN_MAX_EPOCHS", 100)?,
            batch_size: Self::parse_usize("TRAIN_BATCH_SIZE", 32)?,
            patience: Self::parse_usize("TRAIN_PATIENCE", 20)?,
            learning_rate: Self::parse_f64("TRAIN_LEARNING_RATE", 0.001)?,
            seed_policy,
        })
    }

    fn parse_usize(key: &str, default: usize) -> Result<usize> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<usize>()
            .context(format!("Failed to parse {}", key))
    }

    fn parse_f64(key: &str, default: f64) -> Result<f64> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<f64>()
            .context(format!("Failed to parse {}", key))
    }
}
