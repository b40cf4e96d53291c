use crate::domain::repositories::ObservationRepository;
use crate::domain::series::RawObservation;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Row, SqlitePool};
use tracing::info;

/// Observation store backed by SQLite. Dates are kept as ISO-8601 text so
/// lexicographic ORDER BY is also chronological.
pub struct SqliteObservationRepository {
    pool: SqlitePool,
}

impl SqliteObservationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert a cleaned series, replacing any price already stored for the
    /// same (commodity, date). Used to mirror dataset files into the
    /// database so forecasts can be served without the files present.
    pub async fn record_series(
        &self,
        commodity_key: &str,
        points: &[(NaiveDate, f64)],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for (date, price) in points {
            sqlx::query(
                r#"
                INSERT INTO observations (commodity, date, price)
                VALUES (?, ?, ?)
                ON CONFLICT(commodity, date) DO UPDATE SET price = excluded.price
                "#,
            )
            .bind(commodity_key)
            .bind(date.format("%Y-%m-%d").to_string())
            .bind(price)
            .execute(&mut *tx)
            .await
            .context("Failed to record observation")?;
        }
        tx.commit().await?;

        info!(commodity = commodity_key, rows = points.len(), "Series recorded");
        Ok(())
    }
}

#[async_trait]
impl ObservationRepository for SqliteObservationRepository {
    async fn fetch_series(&self, commodity_key: &str) -> Result<Vec<RawObservation>> {
        let rows = sqlx::query(
            "SELECT date, price FROM observations WHERE commodity = ? ORDER BY date ASC",
        )
        .bind(commodity_key)
        .fetch_all(&self.pool)
        .await?;

        let mut observations = Vec::with_capacity(rows.len());
        for row in rows {
            observations.push(RawObservation {
                date: row.try_get("date")?,
                price: row.try_get("price")?,
            });
        }
        Ok(observations)
    }

    async fn recent_observations(
        &self,
        commodity_key: &str,
        limit: usize,
    ) -> Result<Vec<(NaiveDate, f64)>> {
        let rows = sqlx::query(
            r#"
            SELECT date, price FROM observations
            WHERE commodity = ? AND price IS NOT NULL
            ORDER BY date DESC LIMIT ?
            "#,
        )
        .bind(commodity_key)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut points = Vec::with_capacity(rows.len());
        for row in rows {
            let date_str: String = row.try_get("date")?;
            let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
                .with_context(|| format!("stored date is not ISO-8601: {date_str}"))?;
            points.push((date, row.try_get("price")?));
        }
        points.reverse();
        Ok(points)
    }

    async fn list_commodities(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT commodity FROM observations ORDER BY commodity")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| row.try_get("commodity").map_err(Into::into))
            .collect()
    }
}
