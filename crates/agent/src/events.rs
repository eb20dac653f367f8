//! Typed event stream for one orchestration run.
//!
//! Three signal kinds (token fragments, capability lifecycle, termination)
//! are multiplexed into a single bounded channel in production order; no
//! buffering or reordering across kinds. Every run ends with exactly one
//! terminal event, after which nothing else is emitted. The consumer drives
//! cancellation: once the receiving side is dropped, `emit` fails and the
//! run aborts instead of continuing to burn backend capacity.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::AgentError;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Incremental generation output.
    Stream(String),
    /// A capability invocation is starting.
    Status { capability: String },
    /// A capability invocation finished with this result.
    Observation { capability: String, result: Value },
    /// Terminal: the run produced a final answer.
    Done(String),
    /// Terminal: the run failed or was cut off; partial progress already
    /// streamed stands.
    Failed(String),
}

impl AgentEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Failed(_))
    }
}

/// Sending half of a run's event channel. Clones share the channel; only
/// [`EventSink::finish`], which consumes the sink, may emit a terminal
/// event, so a run cannot terminate twice.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<AgentEvent>,
}

impl EventSink {
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<AgentEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }

    /// Whether the consumer has dropped the receiving side.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Emit a non-terminal event. A closed channel means the consumer went
    /// away and the run should stop.
    pub async fn emit(&self, event: AgentEvent) -> Result<(), AgentError> {
        debug_assert!(!event.is_terminal(), "terminal events go through finish()");
        self.tx.send(event).await.map_err(|_| AgentError::Cancelled)
    }

    /// Emit the single terminal event and release the channel. A send
    /// failure here only means the consumer is already gone.
    pub async fn finish(self, event: AgentEvent) {
        debug_assert!(event.is_terminal(), "finish() takes a terminal event");
        let _ = self.tx.send(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::{AgentEvent, EventSink};

    #[tokio::test]
    async fn events_arrive_in_production_order() {
        let (sink, mut rx) = EventSink::channel(16);

        sink.emit(AgentEvent::Stream("思".to_string())).await.expect("emit");
        sink.emit(AgentEvent::Status { capability: "generate_meeting_todo".to_string() })
            .await
            .expect("emit");
        sink.emit(AgentEvent::Stream("考".to_string())).await.expect("emit");
        sink.finish(AgentEvent::Done("完成".to_string())).await;

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert_eq!(events.len(), 4);
        assert_eq!(events[0], AgentEvent::Stream("思".to_string()));
        assert!(matches!(events[1], AgentEvent::Status { .. }));
        assert_eq!(events[2], AgentEvent::Stream("考".to_string()));
        assert!(events[3].is_terminal());
        assert_eq!(events.iter().filter(|event| event.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn dropped_receiver_surfaces_cancellation() {
        let (sink, rx) = EventSink::channel(1);
        drop(rx);

        let result = sink.emit(AgentEvent::Stream("x".to_string())).await;
        assert!(matches!(result, Err(crate::AgentError::Cancelled)));
    }

    #[test]
    fn serialized_events_carry_discriminant_and_payload() {
        let event = AgentEvent::Status { capability: "get_user_info".to_string() };
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["type"], "status");
        assert_eq!(json["content"]["capability"], "get_user_info");
    }
}
