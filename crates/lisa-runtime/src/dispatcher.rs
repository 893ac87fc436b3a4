//! Channel dispatcher
//!
//! The single point where chat text and gesture symbols become
//! outbound messages, and where inbound agent traffic becomes UI
//! events. Nothing is constructed while the session is not connected.

use std::sync::Arc;

use lisa_core::{InboundEvent, LisaError, LisaResult, OutboundMessage, Topic};
use lisa_gesture::GestureSymbol;
use lisa_transport::RoomTransport;
use tracing::{debug, warn};

use crate::{LogKind, SessionLifecycle, UiEvent};

pub struct Dispatcher<T> {
    transport: Arc<T>,
}

impl<T: RoomTransport> Dispatcher<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Dispatcher { transport }
    }

    /// Build a chat message. Text is trimmed; empty text is
    /// `InvalidInput`, a closed session is `NotConnected`.
    pub fn prepare_chat(session: &SessionLifecycle, text: &str) -> LisaResult<OutboundMessage> {
        let text = text.trim();
        if text.is_empty() {
            return Err(LisaError::InvalidInput("empty chat message".into()));
        }
        if !session.is_connected() {
            return Err(LisaError::NotConnected);
        }
        Ok(OutboundMessage::new(Topic::ChatMessage, text))
    }

    pub fn prepare_gesture(
        session: &SessionLifecycle,
        symbol: GestureSymbol,
    ) -> LisaResult<OutboundMessage> {
        if symbol.is_none() {
            return Err(LisaError::InvalidInput("no gesture to send".into()));
        }
        if !session.is_connected() {
            return Err(LisaError::NotConnected);
        }
        Ok(OutboundMessage::new(Topic::Gesture, symbol.as_str()))
    }

    pub async fn send_chat(
        &self,
        session: &SessionLifecycle,
        text: &str,
    ) -> LisaResult<OutboundMessage> {
        let message = Self::prepare_chat(session, text)?;
        self.publish(message).await
    }

    pub async fn send_gesture(
        &self,
        session: &SessionLifecycle,
        symbol: GestureSymbol,
    ) -> LisaResult<OutboundMessage> {
        let message = Self::prepare_gesture(session, symbol)?;
        self.publish(message).await
    }

    async fn publish(&self, message: OutboundMessage) -> LisaResult<OutboundMessage> {
        self.transport
            .publish_data(&message)
            .await
            .map_err(|e| match e {
                LisaError::SendFailed(_) => e,
                other => LisaError::SendFailed(other.to_string()),
            })?;
        debug!(topic = %message.topic, "published");
        Ok(message)
    }

    /// Decode inbound traffic into a UI update
    pub fn route_inbound(event: InboundEvent) -> Option<UiEvent> {
        match event {
            InboundEvent::Data { topic, payload, .. } => match Topic::parse(&topic) {
                Some(Topic::ChatMessage) => {
                    let text = String::from_utf8_lossy(&payload).into_owned();
                    Some(UiEvent::log(LogKind::Agent, text))
                }
                Some(Topic::Gesture) => {
                    warn!("ignoring inbound gesture message");
                    None
                }
                None => {
                    debug!(%topic, "ignoring message on unknown topic");
                    None
                }
            },
            InboundEvent::ActiveSpeakers(speakers) => Some(UiEvent::Speaking(!speakers.is_empty())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lisa_transport::{EventSink, LoopbackTransport};

    type LoopbackDispatcher = Dispatcher<LoopbackTransport>;

    fn connected() -> SessionLifecycle {
        let mut session = SessionLifecycle::new();
        let attempt = session.begin_connect().unwrap();
        session.complete_connect(attempt, true);
        session
    }

    #[test]
    fn test_blank_chat_never_prepares() {
        let session = connected();
        for text in ["", "   ", "\n\t "] {
            assert!(matches!(
                LoopbackDispatcher::prepare_chat(&session, text),
                Err(LisaError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn test_chat_while_disconnected_never_prepares() {
        let session = SessionLifecycle::new();
        assert_eq!(
            LoopbackDispatcher::prepare_chat(&session, "hi"),
            Err(LisaError::NotConnected)
        );

        let mut connecting = SessionLifecycle::new();
        connecting.begin_connect().unwrap();
        assert_eq!(
            LoopbackDispatcher::prepare_chat(&connecting, "hi"),
            Err(LisaError::NotConnected)
        );
    }

    #[test]
    fn test_chat_is_trimmed() {
        let msg = LoopbackDispatcher::prepare_chat(&connected(), "  hello there \n").unwrap();
        assert_eq!(msg, OutboundMessage::new(Topic::ChatMessage, "hello there"));
    }

    #[test]
    fn test_gesture_payload() {
        let session = connected();
        let msg = LoopbackDispatcher::prepare_gesture(&session, GestureSymbol::OpenPalm).unwrap();
        assert_eq!(msg, OutboundMessage::new(Topic::Gesture, "Open_Palm"));
        assert!(LoopbackDispatcher::prepare_gesture(&session, GestureSymbol::None).is_err());
        assert_eq!(
            LoopbackDispatcher::prepare_gesture(&SessionLifecycle::new(), GestureSymbol::ThumbUp),
            Err(LisaError::NotConnected)
        );
    }

    #[test]
    fn test_route_inbound() {
        assert_eq!(
            LoopbackDispatcher::route_inbound(InboundEvent::chat("hi there")),
            Some(UiEvent::log(LogKind::Agent, "hi there"))
        );
        assert_eq!(
            LoopbackDispatcher::route_inbound(InboundEvent::chat(vec![b'o', b'k', 0xFF])),
            Some(UiEvent::log(LogKind::Agent, "ok\u{FFFD}"))
        );
        assert_eq!(
            LoopbackDispatcher::route_inbound(InboundEvent::ActiveSpeakers(vec!["ada".into()])),
            Some(UiEvent::Speaking(true))
        );
        assert_eq!(
            LoopbackDispatcher::route_inbound(InboundEvent::ActiveSpeakers(vec![])),
            Some(UiEvent::Speaking(false))
        );
        let unknown = InboundEvent::Data {
            topic: "telemetry".into(),
            payload: vec![1, 2, 3],
            sender: None,
        };
        assert_eq!(LoopbackDispatcher::route_inbound(unknown), None);
    }

    #[tokio::test]
    async fn test_send_failure_is_reported() {
        let (transport, agent) = LoopbackTransport::new(EventSink::discard());
        transport.connect("loopback://", "tok").await.unwrap();
        agent.fail_send(Some("queue full"));

        let dispatcher = Dispatcher::new(Arc::new(transport));
        let err = dispatcher.send_chat(&connected(), "hi").await.unwrap_err();
        assert_eq!(err, LisaError::SendFailed("queue full".into()));
        assert!(agent.published().is_empty());
    }

    #[tokio::test]
    async fn test_send_gesture_publishes() {
        let (transport, agent) = LoopbackTransport::new(EventSink::discard());
        transport.connect("loopback://", "tok").await.unwrap();

        let dispatcher = Dispatcher::new(Arc::new(transport));
        dispatcher
            .send_gesture(&connected(), GestureSymbol::ThumbUp)
            .await
            .unwrap();
        assert_eq!(
            agent.published(),
            vec![OutboundMessage::new(Topic::Gesture, "Thumb_Up")]
        );
    }
}
