use serde::{Deserialize, Serialize};

/// Min-max normalization state, fit once per commodity over a training
/// slice and persisted next to the trained model.
///
/// `transform` maps linearly into [0, 1] over the fit range; values outside
/// it extrapolate linearly, which is intentional (a forecast above the
/// historical maximum is not an error). `inverse` is the exact algebraic
/// inverse, so `inverse(transform(x)) == x` up to floating-point noise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub data_min: f64,
    pub data_range: f64,
}

impl MinMaxScaler {
    /// Fit over the given slice only. The caller chooses the slice: the
    /// training pipeline passes the chronological training portion so the
    /// evaluation split never leaks future values into the fit.
    pub fn fit(prices: &[f64]) -> Self {
        let data_min = prices.iter().copied().fold(f64::INFINITY, f64::min);
        let data_max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        // A constant slice has zero range; use a unit range so the map
        // stays invertible and constant inputs land on 0.0.
        let range = data_max - data_min;
        let data_range = if range > 0.0 { range } else { 1.0 };

        Self {
            data_min,
            data_range,
        }
    }

    pub fn transform_one(&self, price: f64) -> f64 {
        (price - self.data_min) / self.data_range
    }

    pub fn inverse_one(&self, normalized: f64) -> f64 {
        normalized * self.data_range + self.data_min
    }

    pub fn transform(&self, prices: &[f64]) -> Vec<f64> {
        prices.iter().map(|&p| self.transform_one(p)).collect()
    }

    pub fn inverse(&self, normalized: &[f64]) -> Vec<f64> {
        normalized.iter().map(|&n| self.inverse_one(n)).collect()
    }
}
