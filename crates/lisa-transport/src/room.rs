//! Room transport trait and its event stream

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use lisa_core::{InboundEvent, LisaResult, OutboundMessage};
use tokio::sync::mpsc;

/// Something the transport reports without being asked
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// Data message or speaker change from the remote side
    Inbound(InboundEvent),
    /// The transport lost the room on its own
    Disconnected { reason: String },
}

/// Where a transport delivers its events.
///
/// The runtime points this at its single event queue so transport
/// callbacks are serialized with user actions and video frames.
#[derive(Clone)]
pub struct EventSink(Arc<dyn Fn(TransportEvent) + Send + Sync>);

impl EventSink {
    pub fn new(f: impl Fn(TransportEvent) + Send + Sync + 'static) -> Self {
        EventSink(Arc::new(f))
    }

    /// Sink backed by an unbounded channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(move |event| {
            let _ = tx.send(event);
        });
        (sink, rx)
    }

    /// Sink that drops everything
    pub fn discard() -> Self {
        EventSink::new(|_| {})
    }

    pub fn emit(&self, event: TransportEvent) {
        (self.0)(event)
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventSink")
    }
}

/// A real-time room shared by this client and one remote agent.
///
/// Methods take `&self` so a connect attempt can run in its own task
/// while the runtime keeps sending through the same transport.
pub trait RoomTransport: Send + Sync + 'static {
    /// Join the room at `url` using a session credential
    fn connect(&self, url: &str, token: &str) -> impl Future<Output = LisaResult<()>> + Send;

    /// Leave the room. Never fails; tearing down a dead room is a no-op.
    fn disconnect(&self) -> impl Future<Output = ()> + Send;

    /// Publish or unpublish the local microphone track
    fn set_microphone_enabled(&self, enabled: bool)
        -> impl Future<Output = LisaResult<()>> + Send;

    /// Reliable, topic-tagged send
    fn publish_data(&self, message: &OutboundMessage)
        -> impl Future<Output = LisaResult<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_delivers() {
        let (sink, mut rx) = EventSink::channel();
        sink.emit(TransportEvent::Disconnected {
            reason: "gone".into(),
        });
        assert_eq!(
            rx.try_recv().unwrap(),
            TransportEvent::Disconnected {
                reason: "gone".into()
            }
        );
    }

    #[test]
    fn test_discard_sink() {
        EventSink::discard().emit(TransportEvent::Inbound(InboundEvent::ActiveSpeakers(vec![])));
    }
}
