pub mod config;
pub mod core;
pub mod emit;
pub mod expand;
pub mod generation;
pub mod matcher;
pub mod model;
pub mod plan;

pub use config::{CopyOptions, Target};
pub use crate::core::{Result, StructCopyError};
pub use emit::{Artifact, CopyOperation};
pub use generation::{expand_type, generate, generate_source};
pub use model::{FieldDescriptor, FieldType, StructDescriptor, TypeIndex, TypeRef};
pub use plan::CopyPlan;
