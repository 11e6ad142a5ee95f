//! Product analytics events raised by console interactions.

use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackEvent {
    pub name: String,
    pub properties: Value,
}

impl TrackEvent {
    pub fn new(name: impl Into<String>, properties: Value) -> Self {
        Self {
            name: name.into(),
            properties,
        }
    }
}

pub trait Tracker: Send + Sync {
    fn track(&self, event: TrackEvent);
}

/// Emits each event as a structured `tracing` record under the `track` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTracker;

impl Tracker for TracingTracker {
    fn track(&self, event: TrackEvent) {
        info!(target: "track", event = %event.name, properties = %event.properties, "Tracked");
    }
}

/// Keeps events in memory; handy for inspecting what a flow emitted.
#[derive(Debug, Default)]
pub struct RecordingTracker {
    events: Mutex<Vec<TrackEvent>>,
}

impl RecordingTracker {
    pub fn events(&self) -> Vec<TrackEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl Tracker for RecordingTracker {
    fn track(&self, event: TrackEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
