use good_lp::ResolutionError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("model consistency error: {0}")]
    Consistency(String),
    #[error("variable {0} declared twice")]
    DuplicateVariable(String),
    #[error("model is infeasible")]
    Infeasible,
    #[error("model is unbounded")]
    Unbounded,
    #[error("solver failure: {0}")]
    Solver(String),
}

impl ModelError {
    pub fn config(msg: impl Into<String>) -> Self {
        ModelError::Configuration(msg.into())
    }

    pub fn consistency(msg: impl Into<String>) -> Self {
        ModelError::Consistency(msg.into())
    }
}

impl From<ResolutionError> for ModelError {
    fn from(value: ResolutionError) -> Self {
        match value {
            ResolutionError::Infeasible => ModelError::Infeasible,
            ResolutionError::Unbounded => ModelError::Unbounded,
            other => ModelError::Solver(other.to_string()),
        }
    }
}
