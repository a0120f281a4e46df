use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetMeterError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Share allocation does not sum to 100%: got {total}%")]
    UnbalancedShares { total: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for NetMeterError {
    fn from(e: serde_json::Error) -> Self {
        NetMeterError::SerializationError(e.to_string())
    }
}
