//! Progress events for streamed generation.
//!
//! A stream emits `connected`, then `progress` and `chunk` events, and ends
//! with exactly one `complete` or `error`. [`StreamLifecycle`] enforces the
//! ordering: nothing is emitted after a terminal event.

use serde::Serialize;
use utoipa::ToSchema;

use crate::itinerary::ItineraryResponse;

/// Generation phase announced in `progress` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StreamPhase {
    /// The upstream call has started.
    Start,
    /// Upstream output is being validated and assembled.
    Organize,
}

/// One server-sent event.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// The stream is open.
    Connected {
        /// Human-readable status.
        message: String,
        /// Request identifier.
        request_id: String,
    },
    /// Phase change.
    Progress {
        /// Current phase.
        phase: StreamPhase,
        /// Human-readable status.
        message: String,
    },
    /// Raw model text, in order.
    Chunk {
        /// Text fragment.
        text: String,
    },
    /// Final itinerary.
    Complete {
        /// Human-readable status.
        message: String,
        /// The validated itinerary.
        data: Box<ItineraryResponse>,
    },
    /// Terminal failure.
    Error {
        /// Client-safe description.
        message: String,
    },
}

impl StreamEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Connected { .. } => "connected",
            StreamEvent::Progress { .. } => "progress",
            StreamEvent::Chunk { .. } => "chunk",
            StreamEvent::Complete { .. } => "complete",
            StreamEvent::Error { .. } => "error",
        }
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete { .. } | StreamEvent::Error { .. })
    }
}

/// Lifecycle state of one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Nothing emitted yet.
    Idle,
    /// `connected` was emitted.
    Streaming,
    /// `complete` was emitted.
    Completed,
    /// `error` was emitted.
    Failed,
}

/// Gatekeeper for event ordering.
#[derive(Debug)]
pub struct StreamLifecycle {
    state: StreamState,
}

impl StreamLifecycle {
    /// New lifecycle in [`StreamState::Idle`].
    pub fn new() -> Self {
        Self {
            state: StreamState::Idle,
        }
    }

    /// Current state.
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Whether a terminal event was emitted.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, StreamState::Completed | StreamState::Failed)
    }

    /// Admit an event, returning it if it may be emitted.
    ///
    /// Events after a terminal event are discarded. An error may be emitted
    /// from any non-terminal state; everything else requires `connected`
    /// first.
    pub fn advance(&mut self, event: StreamEvent) -> Option<StreamEvent> {
        let next = match (self.state, &event) {
            (StreamState::Completed | StreamState::Failed, _) => return None,
            (_, StreamEvent::Error { .. }) => StreamState::Failed,
            (StreamState::Idle, StreamEvent::Connected { .. }) => StreamState::Streaming,
            (StreamState::Idle, _) => return None,
            (StreamState::Streaming, StreamEvent::Connected { .. }) => return None,
            (StreamState::Streaming, StreamEvent::Complete { .. }) => StreamState::Completed,
            (StreamState::Streaming, _) => StreamState::Streaming,
        };

        self.state = next;
        Some(event)
    }
}

impl Default for StreamLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected() -> StreamEvent {
        StreamEvent::Connected {
            message: "ok".to_string(),
            request_id: "r1".to_string(),
        }
    }

    fn chunk() -> StreamEvent {
        StreamEvent::Chunk {
            text: "{".to_string(),
        }
    }

    fn error() -> StreamEvent {
        StreamEvent::Error {
            message: "failed".to_string(),
        }
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let value = serde_json::to_value(StreamEvent::Progress {
            phase: StreamPhase::Organize,
            message: "Organizing".to_string(),
        })
        .unwrap();
        assert_eq!(value["type"], "progress");
        assert_eq!(value["phase"], "organize");
        assert_eq!(chunk().name(), "chunk");
    }

    #[test]
    fn nothing_after_terminal_event() {
        let mut lifecycle = StreamLifecycle::new();
        assert!(lifecycle.advance(connected()).is_some());
        assert!(lifecycle.advance(chunk()).is_some());
        assert!(lifecycle.advance(error()).is_some());
        assert_eq!(lifecycle.state(), StreamState::Failed);
        assert!(lifecycle.is_finished());

        assert!(lifecycle.advance(chunk()).is_none());
        assert!(lifecycle.advance(error()).is_none());
    }

    #[test]
    fn connected_must_come_first_and_once() {
        let mut lifecycle = StreamLifecycle::new();
        assert!(lifecycle.advance(chunk()).is_none());
        assert_eq!(lifecycle.state(), StreamState::Idle);

        assert!(lifecycle.advance(connected()).is_some());
        assert!(lifecycle.advance(connected()).is_none());
        assert_eq!(lifecycle.state(), StreamState::Streaming);
    }

    #[test]
    fn error_allowed_before_connected() {
        let mut lifecycle = StreamLifecycle::new();
        assert!(lifecycle.advance(error()).is_some());
        assert_eq!(lifecycle.state(), StreamState::Failed);
    }
}
