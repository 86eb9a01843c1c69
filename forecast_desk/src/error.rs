//! Error types for the forecast_desk crate

use crate::acknowledgment::ReviewState;
use curve_math::MathError;
use thiserror::Error;

/// Custom error types for the forecast_desk crate
#[derive(Debug, Error)]
pub enum DeskError {
    /// Error related to record data or lookups
    #[error("Data error: {0}")]
    DataError(String),

    /// Error related to parameter validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// No record with this id in the active project
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// Acknowledge/reject called while no review is open
    #[error("Record {record_id} has no pending review (current state: {state})")]
    InvalidState {
        record_id: String,
        state: ReviewState,
    },

    /// Method change attempted while the AI forecast review is still open
    #[error("Record {0} is awaiting acknowledgment of its AI forecast")]
    ReviewPending(String),

    /// Error from distribution or variance calculations
    #[error("Math error: {0}")]
    MathError(#[from] MathError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from JSON (de)serialization
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Error from CSV export
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error from configuration parsing
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, DeskError>;
