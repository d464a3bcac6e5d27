pub mod error;
pub mod metrics;

pub use error::{Result, StructCopyError};
pub use metrics::Timer;
