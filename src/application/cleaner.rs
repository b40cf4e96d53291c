use crate::domain::errors::ForecastError;
use crate::domain::series::{ObservationSeries, RawObservation};
use anyhow::Result;
use chrono::{Duration, NaiveDate};
use tracing::{debug, warn};

/// Date formats tried in priority order. The first two are the formats the
/// upstream price sources actually emit; the rest are a permissive fallback
/// for hand-edited files.
pub const DATE_FORMATS: [&str; 5] = ["%d/%m/%Y", "%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y", "%d.%m.%Y"];

/// Turns a raw tabular series into a modeling-ready [`ObservationSeries`].
///
/// Cleaning steps, in order:
/// 1. parse every date against [`DATE_FORMATS`]; any row failing all
///    formats aborts the whole series with a `DateParse` error
/// 2. sort ascending and collapse duplicate dates to the last observation
/// 3. forward-fill missing prices and interior calendar gaps with the
///    last known value; rows before the first known price are dropped
/// 4. reject the series if fewer than `min_rows` days remain
///
/// Pure: returns a fresh series, mutates nothing shared.
pub struct Cleaner {
    min_rows: usize,
}

impl Cleaner {
    /// `min_rows` is the window length required downstream (60 by default);
    /// a shorter series cannot produce a single training example.
    pub fn new(min_rows: usize) -> Self {
        Self { min_rows }
    }

    pub fn clean(&self, raw: &[RawObservation]) -> Result<ObservationSeries> {
        let mut parsed: Vec<(NaiveDate, Option<f64>)> = Vec::with_capacity(raw.len());
        for obs in raw {
            let date = parse_date(&obs.date)?;
            parsed.push((date, obs.price));
        }

        // Stable sort, then keep the last observation per date.
        parsed.sort_by_key(|(d, _)| *d);
        let mut deduped: Vec<(NaiveDate, Option<f64>)> = Vec::with_capacity(parsed.len());
        for (date, price) in parsed {
            match deduped.last_mut() {
                Some((last_date, last_price)) if *last_date == date => {
                    *last_price = price.or(*last_price);
                }
                _ => deduped.push((date, price)),
            }
        }

        let filled = forward_fill(&deduped);
        debug!(
            raw = raw.len(),
            cleaned = filled.len(),
            "cleaned observation series"
        );

        if filled.len() < self.min_rows {
            warn!(
                rows = filled.len(),
                required = self.min_rows,
                "series too short for windowed training"
            );
            return Err(ForecastError::DataInsufficient {
                rows: filled.len(),
                required: self.min_rows,
            }
            .into());
        }

        Ok(ObservationSeries::from_points(filled))
    }
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value.trim(), format) {
            return Ok(date);
        }
    }
    Err(ForecastError::DateParse {
        value: value.to_string(),
        attempted: DATE_FORMATS.join(", "),
    }
    .into())
}

/// Last-known-value propagation over both missing prices and missing
/// calendar days, so the result has exactly one entry per day. Days before
/// the first known price are dropped.
fn forward_fill(points: &[(NaiveDate, Option<f64>)]) -> Vec<(NaiveDate, f64)> {
    let mut filled: Vec<(NaiveDate, f64)> = Vec::with_capacity(points.len());
    let mut last_price: Option<f64> = None;

    for &(date, price) in points {
        let price = match price.or(last_price) {
            Some(p) => p,
            None => continue, // leading gap, nothing to fill from
        };

        if let Some(&(prev_date, prev_price)) = filled.last() {
            let mut gap = prev_date + Duration::days(1);
            while gap < date {
                filled.push((gap, prev_price));
                gap += Duration::days(1);
            }
        }

        filled.push((date, price));
        last_price = Some(price);
    }

    filled
}
