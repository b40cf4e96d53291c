use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the forecasting core.
///
/// Every variant carries enough context to be surfaced to a caller as a
/// structured status plus a human-readable message. Batch callers catch
/// these per commodity and keep going; nothing falls back to a default
/// forecast value.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("insufficient data: {rows} rows after cleaning, at least {required} required")]
    DataInsufficient { rows: usize, required: usize },

    #[error("unparseable date '{value}': no format matched (tried {attempted})")]
    DateParse { value: String, attempted: String },

    #[error("column '{column}' not found in input data")]
    SchemaMismatch { column: String },

    #[error("no trained artifacts for commodity '{key}'")]
    ArtifactMissing { key: String },

    #[error("artifact pair for '{key}' is inconsistent: {missing} is missing")]
    ArtifactMismatch { key: String, missing: String },

    #[error("a training run is already active (job {job_id})")]
    TrainingBusy { job_id: Uuid },

    #[error("training failed for '{key}': {reason}")]
    TrainingFailed { key: String, reason: String },

    #[error("seed window has {actual} observations, {required} required")]
    SeedTooShort { actual: usize, required: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_insufficient_formatting() {
        let err = ForecastError::DataInsufficient {
            rows: 59,
            required: 60,
        };

        let msg = err.to_string();
        assert!(msg.contains("59"));
        assert!(msg.contains("60"));
    }

    #[test]
    fn test_artifact_mismatch_formatting() {
        let err = ForecastError::ArtifactMismatch {
            key: "beras_medium".to_string(),
            missing: "scaler".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("beras_medium"));
        assert!(msg.contains("scaler"));
    }
}
