//! Data source configuration parsing from environment variables.

use anyhow::{Context, Result};
use std::env;

/// Dataset and storage environment configuration
#[derive(Debug, Clone)]
pub struct DataEnvConfig {
    /// Directory holding one CSV file per commodity
    pub dataset_dir: String,
    /// Directory where trained artifacts are written
    pub artifact_dir: String,
    /// Optional SQLite URL; when set, cleaned series are mirrored there
    /// and forecasts can be served from it
    pub database_url: Option<String>,
    pub csv_delimiter: u8,
    pub date_column: String,
    pub price_column: String,
}

impl DataEnvConfig {
    pub fn from_env() -> Result<Self> {
        let delimiter_str = env::var("CSV_DELIMITER").unwrap_or_else(|_| ";".to_string());
        let csv_delimiter = *delimiter_str
            .as_bytes()
            .first()
            .context("CSV_DELIMITER must be a single character")?;

        Ok(Self {
            dataset_dir: env::var("DATASET_DIR").unwrap_or_else(|_| "datasets".to_string()),
            artifact_dir: env::var("ARTIFACT_DIR").unwrap_or_else(|_| "artifacts".to_string()),
            database_url: env::var("DATABASE_URL").ok(),
            csv_delimiter,
            date_column: env::var("DATE_COLUMN").unwrap_or_else(|_| "date".to_string()),
            price_column: env::var("PRICE_COLUMN").unwrap_or_else(|_| "price".to_string()),
        })
    }
}
