use thiserror::Error;

/// Failures a metrics query can report back to its caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("Employee with ID {employee_id} not found")]
    NotFound { employee_id: i64 },

    #[error("No data available for analysis")]
    EmptyDataset,
}

impl AnalysisError {
    /// HTTP-style status for transport layers that want one.
    pub fn status_code(&self) -> u16 {
        match self {
            AnalysisError::NotFound { .. } => 404,
            AnalysisError::EmptyDataset => 500,
        }
    }
}

/// The narrative generator could not produce text. Never fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NarrativeError {
    #[error("narrative unavailable: {0}")]
    Unavailable(String),
}
