//! State patches and engine events.
//!
//! The engine never owns UI state. It describes every change as a
//! [`StatePatch`] and hands it to a [`StateSink`]; the host applies patches
//! in order. Less frequent, coarse-grained [`EngineEvent`]s (tool runs,
//! finished exchanges) go over the same [`EventBus`] for logging and
//! diagnostics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use crate::message::Conversation;
use crate::mode::ChatModeId;

/// One field-level update to host state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum StatePatch {
    SelectedConversation(Conversation),
    Loading(bool),
    MessageIsStreaming(bool),
}

/// Anything that consumes state patches, in publication order.
pub trait StateSink: Send + Sync {
    fn dispatch(&self, patch: StatePatch);
}

/// Coarse engine events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineEvent {
    /// A host-visible state change
    State(StatePatch),

    /// The planner picked a tool
    ActionPlanned {
        tool_name: String,
        iteration: u32,
        timestamp: DateTime<Utc>,
    },

    /// A tool finished running
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// An exchange ended
    ExchangeFinished {
        mode: ChatModeId,
        success: bool,
        aborted: bool,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus.
///
/// Subscribers that fall behind by more than `capacity` events see a lag
/// error from the receiver; publishers never block.
pub struct EventBus {
    sender: broadcast::Sender<Arc<EngineEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: EngineEvent) {
        // no subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<EngineEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl StateSink for EventBus {
    fn dispatch(&self, patch: StatePatch) {
        self.publish(EngineEvent::State(patch));
    }
}

/// Keeps every patch in memory. Useful for hosts that poll and for tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    patches: Mutex<Vec<StatePatch>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All patches seen so far.
    pub fn patches(&self) -> Vec<StatePatch> {
        self.patches.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// The most recent selected conversation, if any was dispatched.
    pub fn last_conversation(&self) -> Option<Conversation> {
        self.patches().into_iter().rev().find_map(|p| match p {
            StatePatch::SelectedConversation(c) => Some(c),
            _ => None,
        })
    }
}

impl StateSink for RecordingSink {
    fn dispatch(&self, patch: StatePatch) {
        if let Ok(mut patches) = self.patches.lock() {
            patches.push(patch);
        }
    }
}

impl<T: StateSink + ?Sized> StateSink for Arc<T> {
    fn dispatch(&self, patch: StatePatch) {
        (**self).dispatch(patch)
    }
}
