use crate::domain::errors::ForecastError;
use crate::domain::scaler::MinMaxScaler;
use anyhow::Result;

/// Seam between the roll-forward logic and the actual network, so the
/// windowing/shifting behavior is testable against a stub.
pub trait SequenceModel {
    /// Predict the next normalized price from a window of W normalized
    /// prices. Must be deterministic: inference never applies dropout or
    /// any other randomness.
    fn predict_next(&self, window: &[f64]) -> Result<f64>;
}

/// What to do when fewer than W actual observations exist to seed the
/// window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedPolicy {
    /// Left-pad with the mean of the available prices (the behavior the
    /// upstream system always had). Understates volatility: the padded
    /// portion is flat where real history would not be.
    PadWithMean,
    /// Refuse to forecast from a short history.
    Reject,
}

/// Autoregressive multi-step forecaster.
///
/// State is a window buffer of fixed length W. Each step consumes the
/// buffer, emits one normalized prediction, and produces the next state by
/// dropping the oldest element and appending the prediction. From step two
/// onward the model is fed its own prior outputs, so error compounds over
/// the horizon; that is a property of autoregressive forecasting, not a
/// defect, and there is no re-seeding with ground truth because future
/// ground truth does not exist.
#[derive(Debug)]
pub struct Forecaster {
    window: Vec<f64>,
}

impl Forecaster {
    /// Build the seed window from normalized prices, applying `policy`
    /// when fewer than `window_len` values are available.
    pub fn seed(normalized: &[f64], window_len: usize, policy: SeedPolicy) -> Result<Self> {
        if normalized.is_empty() {
            return Err(ForecastError::SeedTooShort {
                actual: 0,
                required: window_len,
            }
            .into());
        }

        let window = if normalized.len() >= window_len {
            normalized[normalized.len() - window_len..].to_vec()
        } else {
            match policy {
                SeedPolicy::Reject => {
                    return Err(ForecastError::SeedTooShort {
                        actual: normalized.len(),
                        required: window_len,
                    }
                    .into());
                }
                SeedPolicy::PadWithMean => {
                    let mean = normalized.iter().sum::<f64>() / normalized.len() as f64;
                    let mut padded = vec![mean; window_len - normalized.len()];
                    padded.extend_from_slice(normalized);
                    padded
                }
            }
        };

        Ok(Self { window })
    }

    /// Roll the window forward `horizon` steps, returning the normalized
    /// predictions oldest first. The window buffer keeps length W
    /// throughout.
    pub fn roll_forward(
        &mut self,
        model: &dyn SequenceModel,
        horizon: usize,
    ) -> Result<Vec<f64>> {
        let mut predictions = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            let next = model.predict_next(&self.window)?;
            predictions.push(next);
            self.window.rotate_left(1);
            let last = self.window.len() - 1;
            self.window[last] = next;
        }
        Ok(predictions)
    }

    /// Convenience wrapper: seed, roll forward, and denormalize the whole
    /// output in one batch with the scaler's exact inverse.
    pub fn forecast(
        model: &dyn SequenceModel,
        scaler: &MinMaxScaler,
        seed_prices: &[f64],
        window_len: usize,
        horizon: usize,
        policy: SeedPolicy,
    ) -> Result<Vec<f64>> {
        let normalized = scaler.transform(seed_prices);
        let mut forecaster = Self::seed(&normalized, window_len, policy)?;
        let predictions = forecaster.roll_forward(model, horizon)?;
        Ok(scaler.inverse(&predictions))
    }

    #[cfg(test)]
    fn window(&self) -> &[f64] {
        &self.window
    }
}
