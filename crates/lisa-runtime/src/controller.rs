//! Interaction controller - the single cooperative event loop
//!
//! Everything that can change session state arrives as a
//! `ControllerEvent` on one queue: video frames, chat input, button
//! presses, transport callbacks and the completion of a connect
//! attempt. `run` handles them strictly one at a time.

use std::ops::ControlFlow;
use std::sync::Arc;

use lisa_core::{LisaError, LisaResult, Timestamp};
use lisa_gesture::{classify, EmissionGate, GestureSymbol, HandsFrame};
use lisa_transport::{EventSink, RoomTransport, TokenProvider, TransportEvent};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{AttemptId, Dispatcher, LogKind, SessionLifecycle, UiEvent, UiSender};

/// Result of a successful connect attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectOutcome {
    pub mic_enabled: bool,
    /// Why the microphone could not be enabled, if it could not
    pub mic_error: Option<String>,
}

#[derive(Debug)]
pub enum ControllerEvent {
    /// Landmark source output for one video frame
    Landmarks { hands: HandsFrame, at: Timestamp },
    /// Text typed by the user
    Chat(String),
    Connect,
    Disconnect,
    ToggleMic,
    /// A spawned connect attempt finished
    ConnectFinished {
        attempt: AttemptId,
        result: LisaResult<ConnectOutcome>,
    },
    Transport(TransportEvent),
    Shutdown,
}

/// Cloneable front door to the controller queue
#[derive(Clone, Debug)]
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<ControllerEvent>,
}

impl ControllerHandle {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ControllerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ControllerHandle { tx }, rx)
    }

    /// Queue an event. Returns false once the controller has stopped.
    pub fn send(&self, event: ControllerEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Sink that feeds transport callbacks into this queue
    pub fn transport_sink(&self) -> EventSink {
        let tx = self.tx.clone();
        EventSink::new(move |event| {
            let _ = tx.send(ControllerEvent::Transport(event));
        })
    }

    pub fn submit_frame(&self, hands: HandsFrame, at: Timestamp) -> bool {
        self.send(ControllerEvent::Landmarks { hands, at })
    }

    pub fn chat(&self, text: impl Into<String>) -> bool {
        self.send(ControllerEvent::Chat(text.into()))
    }

    pub fn connect(&self) -> bool {
        self.send(ControllerEvent::Connect)
    }

    pub fn disconnect(&self) -> bool {
        self.send(ControllerEvent::Disconnect)
    }

    pub fn toggle_mic(&self) -> bool {
        self.send(ControllerEvent::ToggleMic)
    }

    pub fn shutdown(&self) -> bool {
        self.send(ControllerEvent::Shutdown)
    }
}

/// Where and as whom to join
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSettings {
    /// Room URL handed to the transport
    pub server_url: String,
    pub room_name: String,
    pub participant_name: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            server_url: "udp://127.0.0.1:7880".to_string(),
            room_name: "lisa-room".to_string(),
            participant_name: "user".to_string(),
        }
    }
}

/// Controller counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    pub frames: u64,
    pub frames_without_hands: u64,
    pub gestures_emitted: u64,
    pub gestures_suppressed: u64,
    pub gestures_sent: u64,
    pub chats_sent: u64,
    pub sends_failed: u64,
    pub inbound_messages: u64,
    pub connect_attempts: u64,
    pub connect_failures: u64,
}

/// One session's interaction controller
pub struct Controller<T, P> {
    transport: Arc<T>,
    tokens: Arc<P>,
    settings: SessionSettings,
    gate: EmissionGate,
    lifecycle: SessionLifecycle,
    dispatcher: Dispatcher<T>,
    stats: RuntimeStats,
    ui: UiSender,
    handle: ControllerHandle,
    /// Attempt whose connect task is running, current or abandoned
    in_flight: Option<AttemptId>,
    /// Attempt waiting for `in_flight` to land before it may start
    deferred: Option<AttemptId>,
}

impl<T: RoomTransport, P: TokenProvider> Controller<T, P> {
    /// `handle` must belong to the queue later passed to `run`; connect
    /// attempts report back through it.
    pub fn new(
        transport: Arc<T>,
        tokens: Arc<P>,
        settings: SessionSettings,
        gate: EmissionGate,
        ui: UiSender,
        handle: ControllerHandle,
    ) -> Self {
        Controller {
            dispatcher: Dispatcher::new(Arc::clone(&transport)),
            transport,
            tokens,
            settings,
            gate,
            lifecycle: SessionLifecycle::new(),
            stats: RuntimeStats::default(),
            ui,
            handle,
            in_flight: None,
            deferred: None,
        }
    }

    pub fn lifecycle(&self) -> &SessionLifecycle {
        &self.lifecycle
    }

    pub fn stats(&self) -> &RuntimeStats {
        &self.stats
    }

    /// Handle one event. `Break` means the loop should stop.
    pub async fn handle(&mut self, event: ControllerEvent) -> ControlFlow<()> {
        match event {
            ControllerEvent::Landmarks { hands, at } => self.on_frame(&hands, at).await,
            ControllerEvent::Chat(text) => self.on_chat(&text).await,
            ControllerEvent::Connect => self.on_connect(),
            ControllerEvent::Disconnect => self.on_disconnect().await,
            ControllerEvent::ToggleMic => self.on_toggle_mic().await,
            ControllerEvent::ConnectFinished { attempt, result } => {
                self.on_connect_finished(attempt, result).await
            }
            ControllerEvent::Transport(event) => self.on_transport(event).await,
            ControllerEvent::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    async fn on_frame(&mut self, hands: &HandsFrame, at: Timestamp) {
        self.stats.frames += 1;

        let symbol = match hands.primary() {
            Some(hand) => classify(hand),
            None => {
                self.stats.frames_without_hands += 1;
                GestureSymbol::None
            }
        };

        let Some(emitted) = self.gate.try_emit(symbol, at) else {
            if !symbol.is_none() {
                self.stats.gestures_suppressed += 1;
            }
            return;
        };

        self.stats.gestures_emitted += 1;
        debug!(gesture = %emitted, %at, "gesture emitted");
        self.emit(UiEvent::GestureResult(emitted));

        if !self.lifecycle.is_connected() {
            debug!(gesture = %emitted, "no session, gesture not sent");
            return;
        }

        match self.dispatcher.send_gesture(&self.lifecycle, emitted).await {
            Ok(_) => self.stats.gestures_sent += 1,
            Err(e) => {
                self.stats.sends_failed += 1;
                warn!(gesture = %emitted, error = %e, "gesture send failed");
                self.log(LogKind::Error, format!("{} (gesture {})", e, emitted));
            }
        }
    }

    async fn on_chat(&mut self, text: &str) {
        match self.dispatcher.send_chat(&self.lifecycle, text).await {
            Ok(message) => {
                self.stats.chats_sent += 1;
                self.log(LogKind::User, message.payload);
            }
            // blank input is dropped without a trace
            Err(LisaError::InvalidInput(_)) => {}
            Err(LisaError::NotConnected) => self.log(LogKind::Error, "Not connected"),
            Err(e) => {
                self.stats.sends_failed += 1;
                warn!(error = %e, "chat send failed");
                self.log(LogKind::Error, e.to_string());
            }
        }
    }

    fn on_connect(&mut self) {
        let attempt = match self.lifecycle.begin_connect() {
            Ok(attempt) => attempt,
            Err(e) => {
                debug!(reason = %e, "connect request ignored");
                return;
            }
        };

        self.stats.connect_attempts += 1;
        self.log(
            LogKind::System,
            format!("Connecting to {}...", self.settings.room_name),
        );
        self.publish_session();

        // one join at a time against the shared transport
        if let Some(running) = self.in_flight {
            debug!(%attempt, %running, "connect waits for abandoned attempt");
            self.deferred = Some(attempt);
            return;
        }
        self.start_attempt(attempt);
    }

    fn start_attempt(&mut self, attempt: AttemptId) {
        self.in_flight = Some(attempt);
        let transport = Arc::clone(&self.transport);
        let tokens = Arc::clone(&self.tokens);
        let settings = self.settings.clone();
        let handle = self.handle.clone();
        tokio::spawn(async move {
            let result = establish(transport.as_ref(), tokens.as_ref(), &settings).await;
            if !handle.send(ControllerEvent::ConnectFinished { attempt, result }) {
                debug!(%attempt, "controller gone before connect finished");
            }
        });
    }

    async fn on_connect_finished(&mut self, attempt: AttemptId, result: LisaResult<ConnectOutcome>) {
        if self.in_flight == Some(attempt) {
            self.in_flight = None;
        }

        match result {
            Ok(outcome) => {
                if self.lifecycle.complete_connect(attempt, outcome.mic_enabled) {
                    self.on_connected(outcome);
                } else {
                    // abandoned attempt got through; nobody wants that room
                    debug!(%attempt, "stale connect completion");
                    self.transport.disconnect().await;
                }
            }
            Err(e) => {
                if self.lifecycle.fail_connect(attempt) {
                    self.transport.disconnect().await;
                    self.stats.connect_failures += 1;
                    warn!(%attempt, error = %e, "connect failed");
                    self.log(LogKind::Error, format!("Connection failed: {}", e));
                    self.publish_session();
                } else {
                    debug!(%attempt, error = %e, "stale connect failure");
                }
            }
        }

        if let Some(next) = self.deferred.take() {
            if self.lifecycle.pending_attempt() == Some(next) {
                self.start_attempt(next);
            } else {
                debug!(attempt = %next, "deferred attempt abandoned");
            }
        }
    }

    fn on_connected(&mut self, outcome: ConnectOutcome) {
        // each session starts from a fresh GestureState; timestamps are
        // only compared within one session
        self.gate.reset();
        self.log(
            LogKind::System,
            format!("Connected to {}", self.settings.room_name),
        );
        if let Some(reason) = outcome.mic_error {
            self.log(
                LogKind::Error,
                format!("Microphone unavailable: {}", reason),
            );
        }
        self.publish_session();
    }

    async fn on_disconnect(&mut self) {
        if !self.lifecycle.disconnect() {
            return;
        }
        self.transport.disconnect().await;
        self.log(LogKind::System, "Disconnected");
        self.emit(UiEvent::Speaking(false));
        self.publish_session();
    }

    async fn on_toggle_mic(&mut self) {
        let target = match self.lifecycle.mic_toggle_target() {
            Ok(target) => target,
            Err(e) => {
                debug!(reason = %e, "mic toggle ignored");
                return;
            }
        };

        if let Err(e) = self.transport.set_microphone_enabled(target).await {
            warn!(error = %e, enabled = target, "microphone toggle failed");
            self.log(LogKind::Error, format!("Microphone toggle failed: {}", e));
            return;
        }

        if self.lifecycle.set_mic_enabled(target).is_ok() {
            let text = if target {
                "Microphone on"
            } else {
                "Microphone muted"
            };
            self.log(LogKind::System, text);
            self.publish_session();
        }
    }

    async fn on_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Inbound(inbound) => {
                if !self.lifecycle.is_connected() {
                    debug!("inbound event outside a session dropped");
                    return;
                }
                self.stats.inbound_messages += 1;
                if let Some(ui) = Dispatcher::<T>::route_inbound(inbound) {
                    self.emit(ui);
                }
            }
            TransportEvent::Disconnected { reason } => {
                if !self.lifecycle.is_connected() || !self.lifecycle.disconnect() {
                    return;
                }
                warn!(%reason, "room closed by transport");
                self.transport.disconnect().await;
                self.log(LogKind::System, format!("Disconnected: {}", reason));
                self.emit(UiEvent::Speaking(false));
                self.publish_session();
            }
        }
    }

    /// Wait for a running connect task to report back, dropping
    /// everything else, so `close` sees where it left the transport
    async fn settle(&mut self, events: &mut mpsc::UnboundedReceiver<ControllerEvent>) {
        self.deferred = None;
        while self.in_flight.is_some() {
            match events.recv().await {
                Some(ControllerEvent::ConnectFinished { attempt, result }) => {
                    self.on_connect_finished(attempt, result).await
                }
                Some(_) => {}
                None => break,
            }
        }
    }

    /// Leave the room if one is open
    pub async fn close(&mut self) {
        if self.lifecycle.disconnect() {
            self.transport.disconnect().await;
            self.publish_session();
        }
    }

    fn log(&self, kind: LogKind, text: impl Into<String>) {
        self.emit(UiEvent::log(kind, text));
    }

    fn publish_session(&self) {
        self.emit(UiEvent::SessionChanged(self.lifecycle.snapshot()));
    }

    fn emit(&self, event: UiEvent) {
        // nobody watching is fine
        let _ = self.ui.send(event);
    }
}

/// Token, room join, then microphone. Only the first two can fail
/// the attempt.
async fn establish<T: RoomTransport, P: TokenProvider>(
    transport: &T,
    tokens: &P,
    settings: &SessionSettings,
) -> LisaResult<ConnectOutcome> {
    let token = tokens
        .fetch_token(&settings.room_name, &settings.participant_name)
        .await
        .map_err(|e| connect_phase(e, LisaError::TokenAcquisitionFailed))?;

    transport
        .connect(&settings.server_url, &token)
        .await
        .map_err(|e| connect_phase(e, LisaError::TransportConnectFailed))?;

    match transport.set_microphone_enabled(true).await {
        Ok(()) => Ok(ConnectOutcome {
            mic_enabled: true,
            mic_error: None,
        }),
        Err(e) => {
            error!(error = %e, "microphone enable failed after connect");
            Ok(ConnectOutcome {
                mic_enabled: false,
                mic_error: Some(e.to_string()),
            })
        }
    }
}

/// Connect-phase errors pass through; anything else becomes `wrap`
fn connect_phase(e: LisaError, wrap: fn(String) -> LisaError) -> LisaError {
    if e.is_connect_phase() {
        e
    } else {
        wrap(e.to_string())
    }
}

/// Drive `controller` until `Shutdown`, then let a running connect
/// task land and leave any open room.
///
/// The controller keeps a handle to its own queue, so the loop does not
/// end just because every outside handle was dropped.
pub async fn run<T: RoomTransport, P: TokenProvider>(
    mut controller: Controller<T, P>,
    mut events: mpsc::UnboundedReceiver<ControllerEvent>,
) -> RuntimeStats {
    info!(room = %controller.settings.room_name, "controller started");

    while let Some(event) = events.recv().await {
        if controller.handle(event).await.is_break() {
            break;
        }
    }

    controller.settle(&mut events).await;
    controller.close().await;
    info!(stats = ?controller.stats, "controller stopped");
    controller.stats
}
