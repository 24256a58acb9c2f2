//! Built-in node catalog.
//!
//! Connectors for common workflow steps: triggers, branching, value
//! transforms, HTTP, delays and debug logging. Each module contributes its
//! type specs and behaviors to the registry via [`register_builtins`].

mod condition;
mod debug;
mod http;
mod time;
mod transform;
mod trigger;

pub use condition::IfElseNode;
pub use debug::LogNode;
pub use http::HttpRequestNode;
pub use time::DelayNode;
pub use transform::{PickNode, TemplateNode};
pub use trigger::ManualTriggerNode;

use loomrun::NodeRegistry;
use std::sync::Arc;

/// Register every built-in node type with a registry.
pub fn register_builtins(registry: &mut NodeRegistry) {
    registry.register(trigger::manual_trigger_spec(), Arc::new(ManualTriggerNode));
    registry.register(condition::if_else_spec(), Arc::new(IfElseNode));
    registry.register(transform::template_spec(), Arc::new(TemplateNode));
    registry.register(transform::pick_spec(), Arc::new(PickNode));
    registry.register(http::http_request_spec(), Arc::new(HttpRequestNode::new()));
    registry.register(time::delay_spec(), Arc::new(DelayNode));
    registry.register(debug::log_spec(), Arc::new(LogNode));
}
