use crate::application::model::{LstmRegressor, ModelConfig};
use crate::domain::errors::ForecastError;
use crate::domain::metrics::EvaluationMetrics;
use crate::domain::scaler::MinMaxScaler;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Everything needed to reproduce an inference-time model besides the
/// weights themselves. Written as a unit with the weights; loading a model
/// without it is a contract violation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub commodity: String,
    pub model: ModelConfig,
    pub trained_at: DateTime<Utc>,
    pub metrics: EvaluationMetrics,
    pub best_epoch: usize,
    pub epochs_run: usize,
}

#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub scaler: PathBuf,
    pub meta: PathBuf,
}

/// A fully-loaded, self-consistent (model, scaler) pair.
#[derive(Debug)]
pub struct LoadedArtifact {
    pub model: LstmRegressor,
    pub scaler: MinMaxScaler,
    pub meta: ArtifactMeta,
}

/// Durable storage for per-commodity (model, scaler, meta) triples, keyed
/// by the normalized commodity identifier.
///
/// Writes are replace-on-write: everything lands in temp files first and
/// is renamed into place only once fully written, so a crash mid-training
/// leaves the previous pair untouched and readers never observe a
/// half-written artifact.
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn paths(&self, key: &str) -> ArtifactPaths {
        ArtifactPaths {
            model: self.dir.join(format!("{key}_model.safetensors")),
            scaler: self.dir.join(format!("{key}_scaler.json")),
            meta: self.dir.join(format!("{key}_meta.json")),
        }
    }

    /// True only when the complete pair is present.
    pub fn exists(&self, key: &str) -> bool {
        let paths = self.paths(key);
        paths.model.exists() && paths.scaler.exists() && paths.meta.exists()
    }

    pub fn save(
        &self,
        key: &str,
        model: &LstmRegressor,
        scaler: &MinMaxScaler,
        meta: &ArtifactMeta,
    ) -> Result<ArtifactPaths> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create artifact dir {:?}", self.dir))?;

        let paths = self.paths(key);
        let tmp_model = tmp_path(&paths.model);
        let tmp_scaler = tmp_path(&paths.scaler);
        let tmp_meta = tmp_path(&paths.meta);

        model
            .varmap()
            .save(&tmp_model)
            .context("failed to write model weights")?;
        fs::write(&tmp_scaler, serde_json::to_vec_pretty(scaler)?)
            .context("failed to write scaler state")?;
        fs::write(&tmp_meta, serde_json::to_vec_pretty(meta)?)
            .context("failed to write artifact meta")?;

        // All temp files are complete; swap them in. Only now does the
        // previous pair stop being served.
        fs::rename(&tmp_model, &paths.model)?;
        fs::rename(&tmp_scaler, &paths.scaler)?;
        fs::rename(&tmp_meta, &paths.meta)?;

        info!(key, path = ?paths.model, "artifacts saved");
        Ok(paths)
    }

    /// Load the pair, failing fast on a missing or inconsistent artifact
    /// rather than ever serving a wrongly-scaled prediction.
    pub fn load(&self, key: &str) -> Result<LoadedArtifact> {
        let paths = self.paths(key);
        let present = [
            ("model", paths.model.exists()),
            ("scaler", paths.scaler.exists()),
            ("meta", paths.meta.exists()),
        ];

        if present.iter().all(|(_, exists)| !exists) {
            return Err(ForecastError::ArtifactMissing {
                key: key.to_string(),
            }
            .into());
        }
        if let Some((missing, _)) = present.iter().find(|(_, exists)| !exists) {
            return Err(ForecastError::ArtifactMismatch {
                key: key.to_string(),
                missing: missing.to_string(),
            }
            .into());
        }

        let meta: ArtifactMeta = serde_json::from_slice(
            &fs::read(&paths.meta).context("failed to read artifact meta")?,
        )
        .context("failed to parse artifact meta")?;
        let scaler: MinMaxScaler = serde_json::from_slice(
            &fs::read(&paths.scaler).context("failed to read scaler state")?,
        )
        .context("failed to parse scaler state")?;
        let model = LstmRegressor::load(meta.model.clone(), &paths.model)?;

        Ok(LoadedArtifact {
            model,
            scaler,
            meta,
        })
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
