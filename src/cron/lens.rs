//! Structured execution trace.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

/// One entry of an execution trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub title: String,
    pub message: String,
}

/// Append-only trace collector handed to every job payload.
///
/// Clones share the same frames, so a payload may move its handle into spawned
/// tasks and the engine still sees everything captured.
#[derive(Debug, Clone, Default)]
pub struct Lens {
    frames: Arc<Mutex<Vec<Frame>>>,
}

impl Lens {
    pub fn new() -> Self {
        Self::default()
    }

    fn frames_guard(&self) -> MutexGuard<'_, Vec<Frame>> {
        // a payload that panicked while holding the guard still leaves valid frames
        self.frames.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn capture(&self, title: impl Into<String>, message: impl Into<String>) {
        self.frames_guard().push(Frame {
            title: title.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.frames_guard().is_empty()
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.frames_guard().clone()
    }

    /// Frames as a JSON array.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&*self.frames_guard()).unwrap_or_else(|_| "[]".to_string())
    }
}
