//! Session trace events. The loop reports every state transition here.
//!
//! Emission is fire-and-forget: an emitter failure is logged by the caller
//! and never changes the outcome of a session.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::error::TraceError;

/// Every trace event type a research session produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceEventKind {
    SessionStart,
    IterationStart,
    Thought,
    Action,
    ToolBlocked,
    ToolExecution,
    Observation,
    FinishGuard,
    Finish,
    SessionComplete,
    SessionFailed,
    Error,
}

impl TraceEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionStart => "session_start",
            Self::IterationStart => "iteration_start",
            Self::Thought => "thought",
            Self::Action => "action",
            Self::ToolBlocked => "tool_blocked",
            Self::ToolExecution => "tool_execution",
            Self::Observation => "observation",
            Self::FinishGuard => "finish_guard",
            Self::Finish => "finish",
            Self::SessionComplete => "session_complete",
            Self::SessionFailed => "session_failed",
            Self::Error => "error",
        }
    }

    /// Human-readable message used when the payload does not carry one.
    pub fn default_message(&self, iteration: Option<u32>) -> String {
        match (self, iteration) {
            (Self::IterationStart, Some(i)) => format!("Starting iteration {i}"),
            (Self::Thought, _) => "Agent is reasoning".into(),
            (Self::Action, _) => "Selecting next tool".into(),
            (Self::ToolExecution, _) => "Tool execution complete".into(),
            (Self::Observation, _) => "Observation recorded".into(),
            (Self::SessionComplete, _) => "Session completed".into(),
            (Self::SessionFailed, _) => "Session failed".into(),
            (Self::Finish, _) => "Final report drafted".into(),
            _ => title_case(self.as_str()),
        }
    }
}

fn title_case(snake: &str) -> String {
    snake
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// One trace event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    #[serde(rename = "type")]
    pub kind: TraceEventKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,

    /// Event payload; always carries a `message` string
    pub payload: Map<String, Value>,

    pub timestamp: DateTime<Utc>,
}

impl TraceEvent {
    /// Build an event, filling in `iteration` and a default `message` when absent.
    pub fn new(kind: TraceEventKind, mut payload: Map<String, Value>, iteration: Option<u32>) -> Self {
        if let Some(i) = iteration {
            payload.entry("iteration").or_insert_with(|| Value::from(i));
        }
        let has_message = payload
            .get("message")
            .and_then(Value::as_str)
            .is_some_and(|m| !m.is_empty());
        if !has_message {
            payload.insert("message".into(), Value::String(kind.default_message(iteration)));
        }
        Self {
            kind,
            iteration,
            payload,
            timestamp: Utc::now(),
        }
    }

    pub fn message(&self) -> &str {
        self.payload
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

/// The produced-to sink for trace events.
#[async_trait]
pub trait TraceEmitter: Send + Sync {
    async fn emit(&self, event: &TraceEvent) -> Result<(), TraceError>;
}

/// An emitter that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEmitter;

#[async_trait]
impl TraceEmitter for NoopEmitter {
    async fn emit(&self, _event: &TraceEvent) -> Result<(), TraceError> {
        Ok(())
    }
}

/// A broadcast-based trace bus for live subscribers.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. Slow
/// subscribers lag and miss events rather than blocking the session.
pub struct TraceBus {
    sender: broadcast::Sender<Arc<TraceEvent>>,
}

impl TraceBus {
    /// Create a new trace bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: TraceEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<TraceEvent>> {
        self.sender.subscribe()
    }
}

impl Default for TraceBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl TraceEmitter for TraceBus {
    async fn emit(&self, event: &TraceEvent) -> Result<(), TraceError> {
        self.publish(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn default_messages() {
        assert_eq!(
            TraceEventKind::IterationStart.default_message(Some(3)),
            "Starting iteration 3"
        );
        assert_eq!(TraceEventKind::ToolBlocked.default_message(None), "Tool Blocked");
        assert_eq!(TraceEventKind::FinishGuard.default_message(Some(1)), "Finish Guard");
    }

    #[test]
    fn event_fills_message_and_iteration() {
        let event = TraceEvent::new(TraceEventKind::Observation, payload(json!({"index": 0})), Some(2));
        assert_eq!(event.message(), "Observation recorded");
        assert_eq!(event.payload["iteration"], 2);

        let event = TraceEvent::new(
            TraceEventKind::Thought,
            payload(json!({"message": "custom"})),
            None,
        );
        assert_eq!(event.message(), "custom");
        assert!(!event.payload.contains_key("iteration"));
    }

    #[test]
    fn event_serializes_type_tag() {
        let event = TraceEvent::new(TraceEventKind::SessionStart, Map::new(), None);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "session_start");
    }

    #[tokio::test]
    async fn trace_bus_publish_subscribe() {
        let bus = TraceBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(&TraceEvent::new(TraceEventKind::Action, Map::new(), Some(1)))
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, TraceEventKind::Action);
        assert_eq!(event.iteration, Some(1));
    }

    #[tokio::test]
    async fn trace_bus_no_subscribers_doesnt_fail() {
        let bus = TraceBus::new(16);
        let result = bus
            .emit(&TraceEvent::new(TraceEventKind::Error, Map::new(), None))
            .await;
        assert!(result.is_ok());
    }
}
