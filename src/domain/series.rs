use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single raw observation as read from a dataset file or database row.
///
/// The date is still a string at this point; parsing and validation happen
/// in the cleaner. A missing price (empty cell) is `None` and gets
/// forward-filled downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawObservation {
    pub date: String,
    pub price: Option<f64>,
}

/// A cleaned, chronologically indexed price series for one commodity.
///
/// Invariants (enforced by the cleaner, relied on everywhere else):
/// - exactly one entry per calendar day, sorted ascending
/// - no missing prices (interior gaps forward-filled)
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationSeries {
    points: Vec<(NaiveDate, f64)>,
}

impl ObservationSeries {
    /// Wrap an already-validated point list. Callers are the cleaner and
    /// tests; everything else should go through `Cleaner::clean`.
    pub fn from_points(points: Vec<(NaiveDate, f64)>) -> Self {
        debug_assert!(points.windows(2).all(|w| w[0].0 < w[1].0));
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|(_, p)| *p).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|(d, _)| *d).collect()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|(d, _)| *d)
    }

    pub fn points(&self) -> &[(NaiveDate, f64)] {
        &self.points
    }

    /// The most recent `n` points, oldest first. Returns fewer when the
    /// series is shorter than `n`; the forecaster's seed policy decides
    /// what to do with short histories.
    pub fn tail(&self, n: usize) -> &[(NaiveDate, f64)] {
        let start = self.points.len().saturating_sub(n);
        &self.points[start..]
    }
}

/// Predicted prices for future days, oldest first. Recomputed per request.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastPath {
    pub commodity: String,
    pub points: Vec<(NaiveDate, f64)>,
}

/// Normalize a commodity name into the identifier that keys artifacts and
/// dataset files: lowercase, spaces and hyphens replaced with underscores.
pub fn normalize_key(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace([' ', '-'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, n).unwrap()
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("Beras Medium"), "beras_medium");
        assert_eq!(normalize_key("cabai-merah keriting"), "cabai_merah_keriting");
        assert_eq!(normalize_key("  Gula Pasir "), "gula_pasir");
    }

    #[test]
    fn test_tail_shorter_than_series() {
        let series =
            ObservationSeries::from_points((1..=5).map(|n| (day(n), n as f64)).collect());

        let tail = series.tail(3);
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[0].0, day(3));
        assert_eq!(tail[2].0, day(5));
    }

    #[test]
    fn test_tail_longer_than_series() {
        let series = ObservationSeries::from_points(vec![(day(1), 10.0)]);
        assert_eq!(series.tail(60).len(), 1);
    }
}
