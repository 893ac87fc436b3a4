//! In-process loopback transport
//!
//! Stands in for a real room: records what the client publishes and
//! lets the other end (`LoopbackAgent`) inject chat, speaker changes
//! and dropped connections. Failures can be scripted per operation.

use std::sync::Arc;

use lisa_core::{InboundEvent, LisaError, LisaResult, OutboundMessage};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::{EventSink, RoomTransport, TransportEvent};

#[derive(Debug, Default)]
struct LoopbackState {
    connected: bool,
    mic_enabled: bool,
    connect_attempts: u32,
    last_url: Option<String>,
    last_token: Option<String>,
    published: Vec<OutboundMessage>,
    fail_connect: Option<String>,
    fail_send: Option<String>,
    fail_mic: Option<String>,
    connect_gate: Option<Arc<Notify>>,
}

/// Client side of the loopback room
#[derive(Clone, Debug)]
pub struct LoopbackTransport {
    state: Arc<Mutex<LoopbackState>>,
    events: EventSink,
}

/// Remote side of the loopback room
#[derive(Clone, Debug)]
pub struct LoopbackAgent {
    state: Arc<Mutex<LoopbackState>>,
    events: EventSink,
}

impl LoopbackTransport {
    pub fn new(events: EventSink) -> (Self, LoopbackAgent) {
        let state = Arc::new(Mutex::new(LoopbackState::default()));
        let transport = LoopbackTransport {
            state: Arc::clone(&state),
            events: events.clone(),
        };
        let agent = LoopbackAgent { state, events };
        (transport, agent)
    }
}

impl LoopbackAgent {
    /// Agent sends a chat message
    pub fn say(&self, text: &str) {
        self.events
            .emit(TransportEvent::Inbound(InboundEvent::Data {
                topic: lisa_core::Topic::CHAT_MESSAGE.to_string(),
                payload: text.as_bytes().to_vec(),
                sender: Some("agent".to_string()),
            }));
    }

    /// Deliver an arbitrary inbound event
    pub fn inject(&self, event: InboundEvent) {
        self.events.emit(TransportEvent::Inbound(event));
    }

    pub fn set_speakers(&self, identities: &[&str]) {
        let identities = identities.iter().map(|s| s.to_string()).collect();
        self.inject(InboundEvent::ActiveSpeakers(identities));
    }

    /// Room goes away underneath the client
    pub fn drop_connection(&self, reason: &str) {
        self.state.lock().connected = false;
        self.events.emit(TransportEvent::Disconnected {
            reason: reason.to_string(),
        });
    }

    /// Everything published so far
    pub fn published(&self) -> Vec<OutboundMessage> {
        self.state.lock().published.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    pub fn mic_enabled(&self) -> bool {
        self.state.lock().mic_enabled
    }

    pub fn connect_attempts(&self) -> u32 {
        self.state.lock().connect_attempts
    }

    pub fn last_token(&self) -> Option<String> {
        self.state.lock().last_token.clone()
    }

    pub fn last_url(&self) -> Option<String> {
        self.state.lock().last_url.clone()
    }

    /// Next connects fail with `reason` (`None` clears)
    pub fn fail_connect(&self, reason: Option<&str>) {
        self.state.lock().fail_connect = reason.map(str::to_string);
    }

    pub fn fail_send(&self, reason: Option<&str>) {
        self.state.lock().fail_send = reason.map(str::to_string);
    }

    pub fn fail_mic(&self, reason: Option<&str>) {
        self.state.lock().fail_mic = reason.map(str::to_string);
    }

    /// Hold connects until the returned handle is notified
    pub fn hold_connect(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state.lock().connect_gate = Some(Arc::clone(&gate));
        gate
    }
}

impl RoomTransport for LoopbackTransport {
    async fn connect(&self, url: &str, token: &str) -> LisaResult<()> {
        let gate = {
            let mut state = self.state.lock();
            state.connect_attempts += 1;
            state.last_url = Some(url.to_string());
            state.last_token = Some(token.to_string());
            state.connect_gate.take()
        };

        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut state = self.state.lock();
        if let Some(reason) = state.fail_connect.clone() {
            return Err(LisaError::TransportConnectFailed(reason));
        }
        state.connected = true;
        Ok(())
    }

    async fn disconnect(&self) {
        let mut state = self.state.lock();
        state.connected = false;
        state.mic_enabled = false;
    }

    async fn set_microphone_enabled(&self, enabled: bool) -> LisaResult<()> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(LisaError::NotConnected);
        }
        if let Some(reason) = state.fail_mic.clone() {
            return Err(LisaError::TransportError(reason));
        }
        state.mic_enabled = enabled;
        Ok(())
    }

    async fn publish_data(&self, message: &OutboundMessage) -> LisaResult<()> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(LisaError::SendFailed("room is closed".into()));
        }
        if let Some(reason) = state.fail_send.clone() {
            return Err(LisaError::SendFailed(reason));
        }
        state.published.push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lisa_core::Topic;

    #[tokio::test]
    async fn test_publish_requires_connection() {
        let (transport, agent) = LoopbackTransport::new(EventSink::discard());
        let msg = OutboundMessage::new(Topic::ChatMessage, "hi");

        assert!(matches!(
            transport.publish_data(&msg).await,
            Err(LisaError::SendFailed(_))
        ));

        transport.connect("loopback://", "tok").await.unwrap();
        transport.publish_data(&msg).await.unwrap();
        assert_eq!(agent.published(), vec![msg]);
        assert_eq!(agent.last_token().as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_scripted_connect_failure() {
        let (transport, agent) = LoopbackTransport::new(EventSink::discard());
        agent.fail_connect(Some("refused"));

        let err = transport.connect("loopback://", "tok").await.unwrap_err();
        assert_eq!(err, LisaError::TransportConnectFailed("refused".into()));
        assert!(!agent.is_connected());
        assert_eq!(agent.connect_attempts(), 1);
    }

    #[tokio::test]
    async fn test_agent_events_reach_sink() {
        let (sink, mut rx) = EventSink::channel();
        let (_transport, agent) = LoopbackTransport::new(sink);

        agent.say("hello");
        agent.set_speakers(&["agent"]);
        agent.drop_connection("server shutdown");

        assert!(matches!(
            rx.recv().await,
            Some(TransportEvent::Inbound(InboundEvent::Data { .. }))
        ));
        assert_eq!(
            rx.recv().await,
            Some(TransportEvent::Inbound(InboundEvent::ActiveSpeakers(vec![
                "agent".to_string()
            ])))
        );
        assert_eq!(
            rx.recv().await,
            Some(TransportEvent::Disconnected {
                reason: "server shutdown".into()
            })
        );
    }

    #[tokio::test]
    async fn test_held_connect_completes_after_release() {
        let (transport, agent) = LoopbackTransport::new(EventSink::discard());
        let gate = agent.hold_connect();

        let pending = tokio::spawn({
            let transport = transport.clone();
            async move { transport.connect("loopback://", "tok").await }
        });

        tokio::task::yield_now().await;
        assert!(!agent.is_connected());

        gate.notify_one();
        pending.await.unwrap().unwrap();
        assert!(agent.is_connected());
    }
}
