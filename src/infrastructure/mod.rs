// Trained model, scaler and metadata files on disk
pub mod artifact_store;

// CSV dataset files as an observation source
pub mod dataset;

// Prometheus metrics
pub mod observability;

// SQLite observation store
pub mod persistence;
