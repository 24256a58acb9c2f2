//! Workflow graph execution engine.
//!
//! Validates an authored [`loomcore::Graph`] against the node registry,
//! schedules it as a DAG with concurrent dispatch, resolves conditional
//! branches, isolates per-node failures, and publishes live status updates.

pub mod branch;
mod context;
mod executor;
mod registry;
mod runtime;
mod scheduler;
mod validator;

pub use executor::NodeExecutor;
pub use registry::{Branching, NodeBehavior, NodeRegistry, NodeTypeSpec, PortSpec};
pub use runtime::{Engine, RunHandle, RuntimeConfig};
pub use validator::validate;
