use crate::application::cleaner::Cleaner;
use crate::domain::errors::ForecastError;
use crate::domain::repositories::ObservationRepository;
use crate::domain::series::RawObservation;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Which columns hold the date and the price. Supplied by configuration —
/// column positions are never guessed from the data.
#[derive(Debug, Clone)]
pub struct SchemaMapping {
    pub date_column: String,
    pub price_column: String,
}

impl Default for SchemaMapping {
    fn default() -> Self {
        Self {
            date_column: "date".to_string(),
            price_column: "price".to_string(),
        }
    }
}

/// Reads per-commodity price series from a directory of delimited files,
/// one file per commodity named `<key>.csv`.
///
/// The upstream price exports are semicolon-delimited, hence the unusual
/// default delimiter. Non-numeric price cells are treated as missing and
/// left for the cleaner to forward-fill.
pub struct CsvDatasetSource {
    dir: PathBuf,
    delimiter: u8,
    schema: SchemaMapping,
}

impl CsvDatasetSource {
    pub fn new(dir: impl Into<PathBuf>, delimiter: u8, schema: SchemaMapping) -> Self {
        Self {
            dir: dir.into(),
            delimiter,
            schema,
        }
    }

    pub fn file_for(&self, commodity_key: &str) -> PathBuf {
        self.dir.join(format!("{commodity_key}.csv"))
    }

    pub fn read_file(&self, path: &Path) -> Result<Vec<RawObservation>> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("failed to open dataset {path:?}"))?;

        let headers = reader.headers()?.clone();
        let date_idx = column_index(&headers, &self.schema.date_column)?;
        let price_idx = column_index(&headers, &self.schema.price_column)?;

        let mut observations = Vec::new();
        for record in reader.records() {
            let record = record?;
            let date = record.get(date_idx).unwrap_or_default().to_string();
            let price = record
                .get(price_idx)
                .and_then(|cell| cell.trim().replace(',', "").parse::<f64>().ok());
            observations.push(RawObservation { date, price });
        }

        debug!(path = ?path, rows = observations.len(), "dataset file read");
        Ok(observations)
    }
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
        .ok_or_else(|| {
            ForecastError::SchemaMismatch {
                column: name.to_string(),
            }
            .into()
        })
}

#[async_trait]
impl ObservationRepository for CsvDatasetSource {
    async fn fetch_series(&self, commodity_key: &str) -> Result<Vec<RawObservation>> {
        self.read_file(&self.file_for(commodity_key))
    }

    async fn recent_observations(
        &self,
        commodity_key: &str,
        limit: usize,
    ) -> Result<Vec<(NaiveDate, f64)>> {
        let raw = self.read_file(&self.file_for(commodity_key))?;
        // Run the full cleaning pass so dates are parsed and gaps filled
        // the same way training saw them; no minimum length here, the
        // seed policy decides what to do with short histories.
        let series = Cleaner::new(1).clean(&raw)?;
        Ok(series.tail(limit).to_vec())
    }

    async fn list_commodities(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.dir)
            .with_context(|| format!("failed to read dataset dir {:?}", self.dir))?
        {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "csv")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}
