use thiserror::Error;

/// Artifact emission errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmitError {
    #[error("Plan references {0}, which is not part of the plan")]
    UnresolvedPlan(String),

    #[error("Malformed plan: {0}")]
    MalformedPlan(String),
}

/// Errors raised while applying a callable copy operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    #[error("{path}: expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: String,
        found: String,
    },

    #[error("{path}: zero value of a {elements} element array is too large")]
    ValueTooLarge { path: String, elements: usize },

    #[error("Operation references {0}, which it does not contain")]
    UnresolvedPlan(String),
}

pub type Result<T> = std::result::Result<T, EmitError>;
