// Domain-specific error types
pub mod errors;

// Evaluation metrics (RMSE/MAE)
pub mod metrics;

// Repository traits
pub mod repositories;

// Min-max normalization
pub mod scaler;

// Observation series and commodity keys
pub mod series;

// Supervised windowing and chronological splits
pub mod windowing;
