use serde::{Deserialize, Serialize};

/// Evaluation metrics for one training run.
///
/// Always computed on denormalized values so the numbers are in the
/// original price scale and readable by users; normalized-space losses are
/// only used internally during training.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub rmse: f64,
    pub mae: f64,
}

impl EvaluationMetrics {
    /// Compute RMSE and MAE between predictions and actuals.
    ///
    /// Both slices must be in the same (denormalized) scale and the same
    /// order; lengths must match.
    pub fn from_predictions(predictions: &[f64], actuals: &[f64]) -> Self {
        assert_eq!(
            predictions.len(),
            actuals.len(),
            "prediction/actual length mismatch"
        );

        let n = predictions.len() as f64;
        if n == 0.0 {
            return Self {
                rmse: 0.0,
                mae: 0.0,
            };
        }

        let sq_err: f64 = predictions
            .iter()
            .zip(actuals.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum();
        let abs_err: f64 = predictions
            .iter()
            .zip(actuals.iter())
            .map(|(p, a)| (p - a).abs())
            .sum();

        Self {
            rmse: (sq_err / n).sqrt(),
            mae: abs_err / n,
        }
    }
}
