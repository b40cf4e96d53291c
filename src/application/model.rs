use crate::application::forecaster::SequenceModel;
use crate::domain::windowing::WindowedExample;
use anyhow::{Context, Result, anyhow, ensure};
use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::{
    AdamW, Dropout, LSTM, LSTMConfig, Linear, Module, Optimizer, ParamsAdamW, RNN, VarBuilder,
    VarMap, linear, lstm,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Network shape. Persisted in the artifact meta so a loaded model is
/// rebuilt with the exact architecture it was trained with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub window: usize,
    pub hidden_units: usize,
    pub dropout: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            window: 60,
            hidden_units: 50,
            dropout: 0.2,
        }
    }
}

/// Training hyperparameters.
#[derive(Debug, Clone)]
pub struct TrainingParams {
    pub max_epochs: usize,
    pub batch_size: usize,
    pub patience: usize,
    pub learning_rate: f64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            max_epochs: 100,
            batch_size: 32,
            patience: 20,
            learning_rate: 1e-3,
        }
    }
}

/// Outcome of a training run.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub epochs_run: usize,
    pub best_epoch: usize,
    pub best_val_loss: f64,
    pub val_loss_history: Vec<f64>,
}

/// Validation-loss monitor with best-weight bookkeeping.
///
/// Kept separate from the network so the halt/restore behavior is testable
/// without fitting anything: feed it a loss sequence and check when it
/// stops and which epoch it calls best.
#[derive(Debug)]
pub struct EarlyStopping {
    patience: usize,
    best_loss: f64,
    best_epoch: usize,
    epochs_without_improvement: usize,
}

/// What the training loop should do after observing one validation loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopDecision {
    /// New best loss: snapshot the weights.
    Improved,
    /// No improvement, patience not yet exhausted.
    Continue,
    /// Patience exhausted: halt and restore the best snapshot.
    Stop,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            best_loss: f64::INFINITY,
            best_epoch: 0,
            epochs_without_improvement: 0,
        }
    }

    pub fn observe(&mut self, epoch: usize, val_loss: f64) -> StopDecision {
        if val_loss < self.best_loss {
            self.best_loss = val_loss;
            self.best_epoch = epoch;
            self.epochs_without_improvement = 0;
            return StopDecision::Improved;
        }

        self.epochs_without_improvement += 1;
        if self.epochs_without_improvement >= self.patience {
            StopDecision::Stop
        } else {
            StopDecision::Continue
        }
    }

    pub fn best_epoch(&self) -> usize {
        self.best_epoch
    }

    pub fn best_loss(&self) -> f64 {
        self.best_loss
    }
}

/// Stacked LSTM regressor: two recurrent layers (hidden width 50) each
/// followed by dropout 0.2, then a single linear output unit. MSE loss,
/// Adam-equivalent optimizer at the default rate.
///
/// Lifecycle: built untrained, fitted at most once by [`train`], then
/// persisted and loaded read-only for inference. A failed fit is reported
/// to the caller; it never overwrites previously persisted artifacts.
///
/// [`train`]: LstmRegressor::train
pub struct LstmRegressor {
    varmap: VarMap,
    lstm1: LSTM,
    lstm2: LSTM,
    dropout: Dropout,
    dense: Linear,
    config: ModelConfig,
    device: Device,
}

impl std::fmt::Debug for LstmRegressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LstmRegressor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LstmRegressor {
    pub fn new(config: ModelConfig) -> Result<Self> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        Self::build(varmap, config, device)
    }

    fn build(varmap: VarMap, config: ModelConfig, device: Device) -> Result<Self> {
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);

        let lstm1 = lstm(1, config.hidden_units, LSTMConfig::default(), vb.pp("lstm1"))?;
        let lstm2 = lstm(
            config.hidden_units,
            config.hidden_units,
            LSTMConfig {
                layer_idx: 1,
                ..Default::default()
            },
            vb.pp("lstm2"),
        )?;
        let dense = linear(config.hidden_units, 1, vb.pp("dense"))?;
        let dropout = Dropout::new(config.dropout);

        Ok(Self {
            varmap,
            lstm1,
            lstm2,
            dropout,
            dense,
            config,
            device,
        })
    }

    /// Rebuild the architecture from its config and load persisted weights
    /// into it. Shapes must match, which they do by construction as long as
    /// the meta JSON and the weight file were written as a pair.
    pub fn load(config: ModelConfig, weights_path: &std::path::Path) -> Result<Self> {
        let mut model = Self::new(config)?;
        model
            .varmap
            .load(weights_path)
            .with_context(|| format!("failed to load model weights from {weights_path:?}"))?;
        Ok(model)
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Forward pass over a batch of shape (batch, window, 1).
    /// `train` enables dropout; inference must pass false so repeated
    /// predictions on the same window are identical.
    fn forward(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let states1 = self.lstm1.seq(x)?;
        let seq1 = self.lstm1.states_to_tensor(&states1)?;
        let seq1 = self.dropout.forward(&seq1, train)?;

        let states2 = self.lstm2.seq(&seq1)?;
        let last = states2
            .last()
            .ok_or_else(|| anyhow!("empty sequence through second LSTM layer"))?
            .h()
            .clone();
        let last = self.dropout.forward(&last, train)?;

        Ok(self.dense.forward(&last)?)
    }

    /// Fit on the training windows with early stopping against the
    /// validation windows: patience 20 epochs on validation MSE, and the
    /// best-observed weights (not the final epoch's) are restored on stop.
    /// Without the restore, a run that overfits after its best epoch would
    /// silently ship a worse model.
    pub fn train(
        &mut self,
        train_set: &[WindowedExample],
        val_set: &[WindowedExample],
        params: &TrainingParams,
    ) -> Result<TrainingReport> {
        ensure!(!train_set.is_empty(), "training set is empty");
        ensure!(!val_set.is_empty(), "validation set is empty");

        let (x_train, y_train) = to_tensors(train_set, &self.device)?;
        let (x_val, y_val) = to_tensors(val_set, &self.device)?;

        let mut optimizer = AdamW::new(
            self.varmap.all_vars(),
            ParamsAdamW {
                lr: params.learning_rate,
                // Plain Adam: decoupled weight decay off.
                weight_decay: 0.0,
                ..Default::default()
            },
        )?;

        info!(
            train = train_set.len(),
            val = val_set.len(),
            max_epochs = params.max_epochs,
            batch_size = params.batch_size,
            "starting LSTM training"
        );

        let mut stopper = EarlyStopping::new(params.patience);
        let mut best_weights: Option<HashMap<String, Tensor>> = None;
        let mut val_loss_history = Vec::with_capacity(params.max_epochs);
        let mut epochs_run = 0;

        let n = train_set.len();
        for epoch in 0..params.max_epochs {
            epochs_run = epoch + 1;

            // Minibatches in chronological order; the split already
            // guarantees no future leakage, shuffling buys nothing here.
            for batch_start in (0..n).step_by(params.batch_size) {
                let batch_len = params.batch_size.min(n - batch_start);
                let xb = x_train.narrow(0, batch_start, batch_len)?;
                let yb = y_train.narrow(0, batch_start, batch_len)?;

                let predictions = self.forward(&xb, true)?;
                let loss = candle_nn::loss::mse(&predictions, &yb)?;
                optimizer.backward_step(&loss)?;
            }

            let val_pred = self.forward(&x_val, false)?;
            let val_loss = candle_nn::loss::mse(&val_pred, &y_val)?.to_scalar::<f32>()? as f64;
            val_loss_history.push(val_loss);

            match stopper.observe(epoch, val_loss) {
                StopDecision::Improved => {
                    best_weights = Some(self.snapshot_weights()?);
                }
                StopDecision::Continue => {}
                StopDecision::Stop => {
                    info!(
                        epoch,
                        best_epoch = stopper.best_epoch(),
                        "early stopping: no validation improvement for {} epochs",
                        params.patience
                    );
                    break;
                }
            }

            if epoch % 10 == 0 {
                debug!(epoch, val_loss, "epoch complete");
            }
        }

        if let Some(weights) = &best_weights {
            self.restore_weights(weights)?;
        }

        info!(
            epochs_run,
            best_epoch = stopper.best_epoch(),
            best_val_loss = stopper.best_loss(),
            "training finished"
        );

        Ok(TrainingReport {
            epochs_run,
            best_epoch: stopper.best_epoch(),
            best_val_loss: stopper.best_loss(),
            val_loss_history,
        })
    }

    /// Batch inference over windowed examples, normalized space.
    pub fn predict_batch(&self, examples: &[WindowedExample]) -> Result<Vec<f64>> {
        let (x, _) = to_tensors(examples, &self.device)?;
        let out = self.forward(&x, false)?;
        let values = out.flatten_all()?.to_vec1::<f32>()?;
        Ok(values.into_iter().map(|v| v as f64).collect())
    }

    fn snapshot_weights(&self) -> Result<HashMap<String, Tensor>> {
        let vars = self
            .varmap
            .data()
            .lock()
            .map_err(|_| anyhow!("weight map lock poisoned"))?;
        vars.iter()
            .map(|(name, var)| Ok((name.clone(), var.as_tensor().copy()?)))
            .collect()
    }

    fn restore_weights(&self, weights: &HashMap<String, Tensor>) -> Result<()> {
        let vars = self
            .varmap
            .data()
            .lock()
            .map_err(|_| anyhow!("weight map lock poisoned"))?;
        for (name, var) in vars.iter() {
            let tensor = weights
                .get(name)
                .ok_or_else(|| anyhow!("missing weight '{name}' in snapshot"))?;
            var.set(tensor)?;
        }
        Ok(())
    }
}

impl SequenceModel for LstmRegressor {
    fn predict_next(&self, window: &[f64]) -> Result<f64> {
        ensure!(
            window.len() == self.config.window,
            "window length {} does not match model window {}",
            window.len(),
            self.config.window
        );

        let data: Vec<f32> = window.iter().map(|&v| v as f32).collect();
        let x = Tensor::from_vec(data, (1, window.len(), 1), &self.device)?;
        let out = self.forward(&x, false)?;
        Ok(out.i((0, 0))?.to_scalar::<f32>()? as f64)
    }
}

/// Pack windowed examples into (batch, window, 1) inputs and (batch, 1)
/// targets.
fn to_tensors(examples: &[WindowedExample], device: &Device) -> Result<(Tensor, Tensor)> {
    let window = examples
        .first()
        .map(|e| e.input.len())
        .context("no examples to tensorize")?;

    let mut inputs = Vec::with_capacity(examples.len() * window);
    let mut targets = Vec::with_capacity(examples.len());
    for example in examples {
        ensure!(
            example.input.len() == window,
            "inconsistent window length in examples"
        );
        inputs.extend(example.input.iter().map(|&v| v as f32));
        targets.push(example.target as f32);
    }

    let x = Tensor::from_vec(inputs, (examples.len(), window, 1), device)?;
    let y = Tensor::from_vec(targets, (examples.len(), 1), device)?;
    Ok((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn examples(data: &[f64], window: usize) -> Vec<WindowedExample> {
        crate::domain::windowing::make_windows(data, window)
    }

    #[test]
    fn test_early_stopping_halts_after_patience() {
        let mut stopper = EarlyStopping::new(3);

        assert_eq!(stopper.observe(0, 1.0), StopDecision::Improved);
        assert_eq!(stopper.observe(1, 0.5), StopDecision::Improved);
        assert_eq!(stopper.observe(2, 0.6), StopDecision::Continue);
        assert_eq!(stopper.observe(3, 0.6), StopDecision::Continue);
        assert_eq!(stopper.observe(4, 0.6), StopDecision::Stop);

        assert_eq!(stopper.best_epoch(), 1);
        assert_eq!(stopper.best_loss(), 0.5);
    }

    #[test]
    fn test_early_stopping_resets_on_improvement() {
        let mut stopper = EarlyStopping::new(2);

        stopper.observe(0, 1.0);
        assert_eq!(stopper.observe(1, 1.2), StopDecision::Continue);
        // Improvement resets the stale counter.
        assert_eq!(stopper.observe(2, 0.8), StopDecision::Improved);
        assert_eq!(stopper.observe(3, 0.9), StopDecision::Continue);
        assert_eq!(stopper.observe(4, 0.9), StopDecision::Stop);
        assert_eq!(stopper.best_epoch(), 2);
    }

    #[test]
    fn test_early_stopping_stops_within_patience_of_best() {
        // Loss improves until epoch 4, flat afterwards: must stop by 4 + 20.
        let mut stopper = EarlyStopping::new(20);
        let mut stopped_at = None;
        for epoch in 0..100 {
            let loss = if epoch <= 4 { 1.0 - epoch as f64 * 0.1 } else { 0.6 };
            if stopper.observe(epoch, loss) == StopDecision::Stop {
                stopped_at = Some(epoch);
                break;
            }
        }

        assert_eq!(stopper.best_epoch(), 4);
        assert_eq!(stopped_at, Some(24));
    }

    #[test]
    fn test_untrained_model_predicts_deterministically() {
        let model = LstmRegressor::new(ModelConfig {
            window: 8,
            hidden_units: 4,
            dropout: 0.2,
        })
        .unwrap();

        let window: Vec<f64> = (0..8).map(|i| i as f64 / 8.0).collect();
        let a = model.predict_next(&window).unwrap();
        let b = model.predict_next(&window).unwrap();

        // Dropout is off at inference: identical input, identical output.
        assert_eq!(a, b);
        assert!(a.is_finite());
    }

    #[test]
    fn test_predict_next_rejects_wrong_window_length() {
        let model = LstmRegressor::new(ModelConfig {
            window: 8,
            hidden_units: 4,
            dropout: 0.0,
        })
        .unwrap();

        assert!(model.predict_next(&[0.1, 0.2]).is_err());
    }

    #[test]
    fn test_training_reduces_validation_loss_on_learnable_series() {
        // Tiny network, tiny window: this has to fit a constant function.
        let data: Vec<f64> = vec![0.5; 40];
        let all = examples(&data, 4);
        let (train, val) = crate::domain::windowing::split(all, 0.8);

        let mut model = LstmRegressor::new(ModelConfig {
            window: 4,
            hidden_units: 4,
            dropout: 0.0,
        })
        .unwrap();

        let report = model
            .train(
                &train,
                &val,
                &TrainingParams {
                    max_epochs: 30,
                    batch_size: 8,
                    patience: 30,
                    learning_rate: 1e-2,
                },
            )
            .unwrap();

        assert!(report.epochs_run > 0);
        assert!(
            report.best_val_loss < report.val_loss_history[0]
                || report.best_val_loss < 1e-3,
            "validation loss never improved: {:?}",
            report.val_loss_history
        );
    }

    #[test]
    fn test_restored_loss_is_minimum_observed() {
        let data: Vec<f64> = (0..30).map(|i| (i as f64 * 0.3).sin() * 0.4 + 0.5).collect();
        let all = examples(&data, 4);
        let (train, val) = crate::domain::windowing::split(all, 0.8);

        let mut model = LstmRegressor::new(ModelConfig {
            window: 4,
            hidden_units: 4,
            dropout: 0.0,
        })
        .unwrap();

        let report = model
            .train(
                &train,
                &val,
                &TrainingParams {
                    max_epochs: 20,
                    batch_size: 8,
                    patience: 5,
                    learning_rate: 1e-2,
                },
            )
            .unwrap();

        // The model carries the best epoch's weights, so evaluating on the
        // validation set must reproduce the minimum observed loss.
        let min_observed = report
            .val_loss_history
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);
        assert!((report.best_val_loss - min_observed).abs() < 1e-9);

        let predictions = model.predict_batch(&val).unwrap();
        let actuals: Vec<f64> = val.iter().map(|e| e.target).collect();
        let mse = predictions
            .iter()
            .zip(actuals.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / actuals.len() as f64;
        // f32 forward pass vs f64 bookkeeping leaves a small gap.
        assert!((mse - report.best_val_loss).abs() < 1e-4);
    }
}
