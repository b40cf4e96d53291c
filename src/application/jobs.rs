use crate::domain::errors::ForecastError;
use crate::domain::metrics::EvaluationMetrics;
use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Completed,
    Failed,
}

/// One training run, queryable by id after it finishes.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: Uuid,
    pub commodity: String,
    pub state: JobState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub metrics: Option<EvaluationMetrics>,
    pub message: Option<String>,
}

struct Inner {
    active: Option<JobRecord>,
    history: Vec<JobRecord>,
}

/// Serializes training runs: at most one may be active system-wide, since
/// the artifact files and the CPU are not designed for concurrent writers.
///
/// `claim` is an atomic check-and-set under a single lock; a second caller
/// gets a busy error naming the active job rather than being queued
/// silently. Completed and failed runs are retained as history so callers
/// can look up metrics and failure causes by job id.
pub struct TrainingJobManager {
    inner: Mutex<Inner>,
}

impl Default for TrainingJobManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainingJobManager {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                active: None,
                history: Vec::new(),
            }),
        }
    }

    /// Claim the single training slot. Fails with `TrainingBusy` when a
    /// run is already active.
    pub fn claim(&self, commodity: &str) -> Result<Uuid> {
        let mut inner = self.lock()?;

        if let Some(active) = &inner.active {
            warn!(
                commodity,
                active_job = %active.id,
                active_commodity = %active.commodity,
                "rejecting training request: slot busy"
            );
            return Err(ForecastError::TrainingBusy { job_id: active.id }.into());
        }

        let record = JobRecord {
            id: Uuid::new_v4(),
            commodity: commodity.to_string(),
            state: JobState::Running,
            started_at: Utc::now(),
            finished_at: None,
            metrics: None,
            message: None,
        };
        let id = record.id;
        info!(commodity, job = %id, "training slot claimed");
        inner.active = Some(record);
        Ok(id)
    }

    pub fn complete(&self, id: Uuid, metrics: EvaluationMetrics) -> Result<()> {
        self.finish(id, JobState::Completed, Some(metrics), None)
    }

    pub fn fail(&self, id: Uuid, message: String) -> Result<()> {
        self.finish(id, JobState::Failed, None, Some(message))
    }

    /// Look up a job by id, active or historical.
    pub fn status(&self, id: Uuid) -> Result<Option<JobRecord>> {
        let inner = self.lock()?;
        if let Some(active) = &inner.active
            && active.id == id
        {
            return Ok(Some(active.clone()));
        }
        Ok(inner.history.iter().find(|j| j.id == id).cloned())
    }

    pub fn active(&self) -> Result<Option<JobRecord>> {
        Ok(self.lock()?.active.clone())
    }

    fn finish(
        &self,
        id: Uuid,
        state: JobState,
        metrics: Option<EvaluationMetrics>,
        message: Option<String>,
    ) -> Result<()> {
        let mut inner = self.lock()?;

        let mut record = match inner.active.take() {
            Some(record) if record.id == id => record,
            other => {
                // Put back whatever was there; finishing a job that does
                // not hold the slot is a caller bug.
                inner.active = other;
                return Err(anyhow!("job {id} does not hold the training slot"));
            }
        };

        record.state = state;
        record.finished_at = Some(Utc::now());
        record.metrics = metrics;
        record.message = message;
        info!(job = %id, state = ?state, "training slot released");
        inner.history.push(record);
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("training job lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> EvaluationMetrics {
        EvaluationMetrics {
            rmse: 120.5,
            mae: 90.1,
        }
    }

    #[test]
    fn test_second_claim_is_rejected_with_busy() {
        let jobs = TrainingJobManager::new();
        let first = jobs.claim("beras_medium").unwrap();

        let err = jobs.claim("gula_pasir").unwrap_err();
        match err.downcast_ref::<ForecastError>().unwrap() {
            ForecastError::TrainingBusy { job_id } => assert_eq!(*job_id, first),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_slot_reusable_after_completion() {
        let jobs = TrainingJobManager::new();
        let id = jobs.claim("beras_medium").unwrap();
        jobs.complete(id, metrics()).unwrap();

        assert!(jobs.active().unwrap().is_none());
        assert!(jobs.claim("gula_pasir").is_ok());
    }

    #[test]
    fn test_completed_job_queryable_by_id() {
        let jobs = TrainingJobManager::new();
        let id = jobs.claim("beras_medium").unwrap();
        jobs.complete(id, metrics()).unwrap();

        let record = jobs.status(id).unwrap().unwrap();
        assert_eq!(record.state, JobState::Completed);
        assert_eq!(record.metrics.unwrap().rmse, 120.5);
        assert!(record.finished_at.is_some());
    }

    #[test]
    fn test_failed_job_keeps_cause() {
        let jobs = TrainingJobManager::new();
        let id = jobs.claim("cabai_merah").unwrap();
        jobs.fail(id, "insufficient data: 12 rows".to_string()).unwrap();

        let record = jobs.status(id).unwrap().unwrap();
        assert_eq!(record.state, JobState::Failed);
        assert!(record.message.unwrap().contains("12 rows"));
        assert!(jobs.active().unwrap().is_none());
    }

    #[test]
    fn test_finishing_without_slot_is_an_error() {
        let jobs = TrainingJobManager::new();
        let id = jobs.claim("beras_medium").unwrap();
        jobs.complete(id, metrics()).unwrap();

        assert!(jobs.complete(id, metrics()).is_err());
    }
}
