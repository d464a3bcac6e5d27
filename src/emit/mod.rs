pub mod callable;
pub mod error;
pub mod go;

pub use callable::CopyOperation;
pub use error::{EmitError, ExecError, Result};
pub use go::GoWriter;

use std::sync::Arc;
use tracing::debug;

use crate::config::{CopyOptions, Target};
use crate::model::TypeIndex;
use crate::plan::CopyPlan;

/// Emitted form of a copy plan
#[derive(Debug, Clone)]
pub enum Artifact {
    SourceText(String),
    Callable(CopyOperation),
}

impl Artifact {
    pub fn target(&self) -> Target {
        match self {
            Artifact::SourceText(_) => Target::SourceText,
            Artifact::Callable(_) => Target::Callable,
        }
    }

    pub fn as_source_text(&self) -> Option<&str> {
        match self {
            Artifact::SourceText(text) => Some(text),
            Artifact::Callable(_) => None,
        }
    }

    pub fn as_callable(&self) -> Option<&CopyOperation> {
        match self {
            Artifact::Callable(operation) => Some(operation),
            Artifact::SourceText(_) => None,
        }
    }
}

/// Renders plans into the configured target
pub struct Emitter<'a> {
    index: &'a TypeIndex,
    options: &'a CopyOptions,
}

impl<'a> Emitter<'a> {
    pub fn new(index: &'a TypeIndex, options: &'a CopyOptions) -> Self {
        Self { index, options }
    }

    pub fn emit(&self, plan: &CopyPlan) -> Result<Artifact> {
        debug!(pair = %plan.key, target = ?self.options.target, "Emitting copy plan");
        match self.options.target {
            Target::SourceText => GoWriter::new(self.index, self.options)
                .write(plan)
                .map(Artifact::SourceText),
            Target::Callable => {
                CopyOperation::new(plan, Arc::new(self.index.clone())).map(Artifact::Callable)
            }
        }
    }
}
