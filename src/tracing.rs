//! Event tracing for debugging labwm.
//!
//! Keeps a ring buffer of recent X events and state transitions. With
//! debug logging enabled, a click on the root window dumps it to the log.

use std::collections::VecDeque;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::state::StateTransition;

/// Maximum number of events to keep in the trace buffer
const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Entry in the event log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub sequence: u64,
    pub timestamp_ms: u64,
    pub event_type: String,
    pub window: Option<u32>,
    pub details: String,
}

/// Event tracer with ring buffer storage
pub struct EventTracer {
    entries: VecDeque<EventLogEntry>,
    max_entries: usize,
    sequence: u64,
    start_time: Instant,
}

impl EventTracer {
    /// Create a new event tracer with default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }

    /// Create a new event tracer with specified capacity
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_entries),
            max_entries,
            sequence: 0,
            start_time: Instant::now(),
        }
    }

    /// Get the current timestamp in milliseconds since tracer start
    fn timestamp(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Trace an X11 event
    pub fn trace_x11_event(&mut self, event_type: &str, window: Option<u32>, details: &str) {
        self.add_entry(event_type.to_string(), window, details.to_string());
    }

    /// Trace a state transition
    pub fn trace_transition(&mut self, transition: &StateTransition) {
        let (event_type, window, details) = match transition {
            StateTransition::ClientManaged { window, frame, iconic } => (
                "client_managed",
                Some(*window),
                format!("frame=0x{:x} iconic={}", frame, iconic),
            ),
            StateTransition::ClientRemoved { window, reason } => {
                let reason_str =
                    serde_json::to_string(reason).unwrap_or_else(|_| "unknown".to_string());
                ("client_removed", Some(*window), reason_str)
            }
            StateTransition::FocusChanged { from, to } => {
                ("focus_changed", *to, format!("from={:?}", from))
            }
            StateTransition::ClientHidden { window } => ("client_hidden", Some(*window), String::new()),
            StateTransition::ClientUnhidden { window } => {
                ("client_unhidden", Some(*window), String::new())
            }
            StateTransition::FullscreenEntered { window } => {
                ("fullscreen_entered", Some(*window), String::new())
            }
            StateTransition::FullscreenLeft { window } => {
                ("fullscreen_left", Some(*window), String::new())
            }
            StateTransition::ClientMoved {
                window,
                x,
                y,
                width,
                height,
            } => (
                "client_moved",
                Some(*window),
                format!("{}x{}+{}+{}", width, height, x, y),
            ),
        };
        self.add_entry(event_type.to_string(), window, details);
    }

    /// Add an entry to the trace buffer
    fn add_entry(&mut self, event_type: String, window: Option<u32>, details: String) {
        // Remove oldest entry if at capacity
        if self.entries.len() >= self.max_entries {
            self.entries.pop_front();
        }

        self.sequence += 1;
        self.entries.push_back(EventLogEntry {
            sequence: self.sequence,
            timestamp_ms: self.timestamp(),
            event_type,
            window,
            details,
        });
    }

    /// Get the last N entries
    pub fn get_last(&self, n: usize) -> Vec<EventLogEntry> {
        let start = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(start).cloned().collect()
    }
}

impl Default for EventTracer {
    fn default() -> Self {
        Self::new()
    }
}
