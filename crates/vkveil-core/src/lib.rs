//! Core state shared across the vkveil layer: the process-wide handle
//! registry, layer settings, and the error taxonomy.

pub mod error;
pub mod registry;
pub mod settings;

pub use error::CoreError;
pub use registry::HandleRegistry;
pub use settings::{LayerSettings, ValidatorTag};
