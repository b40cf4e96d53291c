// Raw series cleaning and validation
pub mod cleaner;

// Autoregressive roll-forward prediction
pub mod forecaster;

// Training job slot management
pub mod jobs;

// Stacked LSTM regressor
pub mod model;

// Train/forecast orchestration
pub mod pipeline;
