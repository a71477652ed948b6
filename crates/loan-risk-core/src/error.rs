use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoanRiskError {
    #[error("Rating not found: '{rating}' is not defined on the {scale} scale")]
    RatingNotFound { scale: String, rating: String },

    #[error("Transition matrix not found for the {scale} scale")]
    TransitionMatrixNotFound { scale: String },

    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for LoanRiskError {
    fn from(e: serde_json::Error) -> Self {
        LoanRiskError::SerializationError(e.to_string())
    }
}
