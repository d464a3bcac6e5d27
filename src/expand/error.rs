use thiserror::Error;

/// Definition expansion errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpandError {
    #[error("Type not found: {0}")]
    NotFound(String),

    #[error("{0} belongs to the standard library and is not expanded")]
    NotExpandable(String),
}

pub type Result<T> = std::result::Result<T, ExpandError>;
