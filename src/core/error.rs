use thiserror::Error;

/// Main library error type that aggregates domain-specific errors
#[derive(Error, Debug)]
pub enum StructCopyError {
    /// Configuration layer errors
    #[error(transparent)]
    Config(#[from] crate::config::error::ConfigError),

    /// Descriptor model and index errors
    #[error(transparent)]
    Model(#[from] crate::model::error::ModelError),

    /// Matching and plan building errors
    #[error(transparent)]
    Plan(#[from] crate::plan::error::PlanError),

    /// Emission errors
    #[error(transparent)]
    Emit(#[from] crate::emit::error::EmitError),

    /// Errors raised while running a callable copy operation
    #[error(transparent)]
    Exec(#[from] crate::emit::error::ExecError),

    /// Definition expansion errors
    #[error(transparent)]
    Expand(#[from] crate::expand::error::ExpandError),

    /// Generic I/O errors not covered by specific layers
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for library operations
pub type Result<T> = std::result::Result<T, StructCopyError>;

impl StructCopyError {
    /// Plan error behind this error, if it came from plan building
    pub fn as_plan_error(&self) -> Option<&crate::plan::error::PlanError> {
        match self {
            StructCopyError::Plan(error) => Some(error),
            _ => None,
        }
    }
}
