//! Run status feed.
//!
//! The engine publishes status deltas to a broadcast channel; subscribers
//! (a canvas UI, a CLI) render them however they like. Delivery is lossy for
//! lagging subscribers, which is acceptable because only the latest status
//! per node matters.

use crate::run::{NodeStatus, RunId, RunStatus};
use crate::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::broadcast;

/// Events emitted over the lifetime of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        run_id: RunId,
        graph_id: String,
        timestamp: DateTime<Utc>,
    },
    NodeStatusChanged {
        run_id: RunId,
        node_id: String,
        status: NodeStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<HashMap<String, Value>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },
    RunFinished {
        run_id: RunId,
        status: RunStatus,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus carrying [`RunEvent`]s for every run started by a runtime.
pub struct EventBus {
    sender: broadcast::Sender<RunEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Send errors (no subscribers) are deliberately
    /// ignored; the feed is observational.
    pub fn emit(&self, event: RunEvent) {
        let _ = self.sender.send(event);
    }
}
