//! Fire-and-forget trace emission for one session.

use serde_json::{Map, Value};
use sleuth_core::trace::{TraceEmitter, TraceEvent, TraceEventKind};
use std::sync::Arc;
use tracing::{debug, error};

/// Emits trace events tagged with a session id. Emitter failures are
/// logged and swallowed.
pub struct SessionTracer {
    emitter: Arc<dyn TraceEmitter>,
    session_id: String,
}

impl SessionTracer {
    pub fn new(emitter: Arc<dyn TraceEmitter>, session_id: impl Into<String>) -> Self {
        Self {
            emitter,
            session_id: session_id.into(),
        }
    }

    pub async fn emit(&self, kind: TraceEventKind, payload: Value, iteration: Option<u32>) {
        let mut payload = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("data".into(), other);
                map
            }
        };
        payload
            .entry("session_id")
            .or_insert_with(|| Value::String(self.session_id.clone()));

        let event = TraceEvent::new(kind, payload, iteration);
        debug!(
            session_id = %self.session_id,
            event = kind.as_str(),
            iteration,
            text = event.message(),
            "Trace event"
        );
        if let Err(e) = self.emitter.emit(&event).await {
            error!(event = kind.as_str(), "Trace emission failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use sleuth_core::error::TraceError;
    use sleuth_telemetry::TraceRecorder;

    struct BrokenEmitter;

    #[async_trait]
    impl TraceEmitter for BrokenEmitter {
        async fn emit(&self, _event: &TraceEvent) -> Result<(), TraceError> {
            Err(TraceError::Closed)
        }
    }

    #[tokio::test]
    async fn events_carry_session_id() {
        let recorder = Arc::new(TraceRecorder::new());
        let tracer = SessionTracer::new(recorder.clone(), "s-1");
        tracer
            .emit(TraceEventKind::Thought, json!({"thought": "hmm"}), Some(1))
            .await;

        let events = recorder.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload["session_id"], "s-1");
        assert_eq!(events[0].payload["iteration"], 1);
        assert_eq!(events[0].message(), "Agent is reasoning");
    }

    #[tokio::test]
    async fn emitter_failure_is_swallowed() {
        let tracer = SessionTracer::new(Arc::new(BrokenEmitter), "s-2");
        tracer.emit(TraceEventKind::Error, json!({}), None).await;
    }
}
