use thiserror::Error;

/// Plan building errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("{structure}.{field}: required field has no matching source field")]
    UnmatchedRequiredField { structure: String, field: String },

    #[error("{structure}.{field}: cannot copy {source_type} into {destination_type}")]
    TypeIncompatible {
        structure: String,
        field: String,
        source_type: String,
        destination_type: String,
    },

    #[error("Cyclic structure without indirection: {}", .path.join(" -> "))]
    CyclicStructure { path: Vec<String> },

    #[error("Unknown struct type: {0}")]
    UnknownType(String),

    #[error("No copy plan for {pair}: {}", summarize(.errors))]
    IncompatiblePlan { pair: String, errors: Vec<PlanError> },
}

fn summarize(errors: &[PlanError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl PlanError {
    /// Every individual failure, with aggregates flattened
    pub fn errors(&self) -> Vec<&PlanError> {
        match self {
            PlanError::IncompatiblePlan { errors, .. } => {
                errors.iter().flat_map(PlanError::errors).collect()
            }
            other => vec![other],
        }
    }
}

pub type Result<T> = std::result::Result<T, PlanError>;
