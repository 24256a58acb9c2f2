//! Core abstractions for the loom workflow engine.
//!
//! This crate holds the types every other component depends on: the dynamic
//! [`Value`], the authored [`Graph`] model and its canvas loader, run/node
//! status machinery, the run event feed, and the error taxonomy.

pub mod authoring;
mod error;
pub mod events;
mod graph;
mod run;
mod validation;
mod value;

pub use authoring::parse_canvas;
pub use error::{EngineError, GraphError, NodeError};
pub use events::{EventBus, RunEvent};
pub use graph::{Edge, Graph, NodeSpec, DEFAULT_INPUT_PORT, DEFAULT_OUTPUT_PORT};
pub use run::{NodeState, NodeStatus, RunId, RunReport, RunStatus};
pub use validation::{ValidationError, ValidationReport};
pub use value::Value;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
