//! Configuration module for Rustcast.
//!
//! Structured configuration loading from environment variables, organized
//! by concern: data sources, training hyperparameters, and observability.

mod data_config;
mod observability_config;
mod training_config;

pub use data_config::DataEnvConfig;
pub use observability_config::ObservabilityEnvConfig;
pub use training_config::TrainingEnvConfig;

use crate::application::model::{ModelConfig, TrainingParams};
use crate::application::pipeline::PipelineConfig;
use crate::infrastructure::dataset::SchemaMapping;
use anyhow::{Context, Result};

/// Main application configuration.
///
/// Aggregates all sub-configs; the bins load this once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub data: DataEnvConfig,
    pub training: TrainingEnvConfig,
    pub observability: ObservabilityEnvConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            data: DataEnvConfig::from_env().context("Failed to load data config")?,
            training: TrainingEnvConfig::from_env().context("Failed to load training config")?,
            observability: ObservabilityEnvConfig::from_env(),
        })
    }

    /// Column mapping for dataset files.
    pub fn schema_mapping(&self) -> SchemaMapping {
        SchemaMapping {
            date_column: self.data.date_column.clone(),
            price_column: self.data.price_column.clone(),
        }
    }

    /// Pipeline configuration assembled from the training sub-config.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            window: self.training.window,
            horizon: self.training.horizon,
            train_fraction: self.training.train_fraction,
            model: ModelConfig {
                window: self.training.window,
                hidden_units: self.training.hidden_units,
                dropout: self.training.dropout,
            },
            training: TrainingParams {
                max_epochs: self.training.max_epochs,
                batch_size: self.training.batch_size,
                patience: self.training.patience,
                learning_rate: self.training.learning_rate,
            },
            seed_policy: self.training.seed_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests mutate process state; they only read keys no other
    // test writes.

    #[test]
    fn test_defaults_without_env() {
        let config = Config::from_env().unwrap();
        assert_eq!(config.training.window, 60);
        assert_eq!(config.training.horizon, 30);
        assert_eq!(config.training.max_epochs, 100);
        assert_eq!(config.data.csv_delimiter, b';');
        assert_eq!(config.data.date_column, "date");
    }

    #[test]
    fn test_pipeline_config_mirrors_training_env() {
        let config = Config::from_env().unwrap();
        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.model.window, pipeline.window);
        assert_eq!(pipeline.model.hidden_units, 50);
        assert_eq!(pipeline.training.patience, 20);
    }
}
