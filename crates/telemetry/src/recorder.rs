//! Trace sinks: an in-memory recorder and a JSON Lines file writer.

use async_trait::async_trait;
use sleuth_core::{TraceEmitter, TraceError, TraceEvent, TraceEventKind};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Keeps every emitted event in memory, in order.
#[derive(Debug, Default)]
pub struct TraceRecorder {
    events: Mutex<Vec<TraceEvent>>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events.
    pub async fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().await.clone()
    }

    /// Event kinds in emission order.
    pub async fn kinds(&self) -> Vec<TraceEventKind> {
        self.events.lock().await.iter().map(|e| e.kind).collect()
    }

    /// Recorded events of one kind.
    pub async fn of_kind(&self, kind: TraceEventKind) -> Vec<TraceEvent> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TraceEmitter for TraceRecorder {
    async fn emit(&self, event: &TraceEvent) -> Result<(), TraceError> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

/// Appends one JSON object per event to a file.
pub struct JsonlTraceWriter {
    file: Mutex<tokio::fs::File>,
}

impl JsonlTraceWriter {
    /// Create (or truncate) the trace file at `path`.
    pub async fn create(path: &Path) -> Result<Self, TraceError> {
        let file = tokio::fs::File::create(path)
            .await
            .map_err(|e| TraceError::Sink(format!("{}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "Trace file opened");
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

#[async_trait]
impl TraceEmitter for JsonlTraceWriter {
    async fn emit(&self, event: &TraceEvent) -> Result<(), TraceError> {
        let mut line = serde_json::to_string(event).map_err(|e| TraceError::Sink(e.to_string()))?;
        line.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| TraceError::Sink(e.to_string()))?;
        file.flush().await.map_err(|e| TraceError::Sink(e.to_string()))
    }
}
