use thiserror::Error;

/// Descriptor model errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid type expression `{text}`: {message}")]
    InvalidType { text: String, message: String },

    #[error("Duplicate declaration: {0}")]
    DuplicateDeclaration(String),

    #[error("Failed to read descriptor file {path}: {source}")]
    ReadFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse descriptor file {path}: {source}")]
    ParseFailed {
        path: String,
        source: serde_json::Error,
    },

    #[error("Failed to walk descriptor directory: {0}")]
    Walk(#[from] walkdir::Error),
}

impl ModelError {
    pub fn invalid_type(text: impl Into<String>, message: impl Into<String>) -> Self {
        ModelError::InvalidType {
            text: text.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;
