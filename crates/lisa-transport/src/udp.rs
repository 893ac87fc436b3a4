//! UDP room transport
//!
//! A minimal room over `lisa-wire` datagrams: the client sends `Join`
//! to the agent's address and waits for `Welcome` or `Reject`, then a
//! background loop turns incoming datagrams into transport events.
//! No audio media is carried; microphone state is tracked locally.
//!
//! `Data` is stop-and-wait: `publish_data` resends the same sequence
//! number until the agent acks it or the attempts run out.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lisa_core::{InboundEvent, LisaError, LisaResult, OutboundMessage};
use lisa_wire::{Packet, MAX_PACKET_SIZE};
use parking_lot::Mutex;
use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::{EventSink, RoomTransport, TransportEvent};

/// URL scheme accepted by `connect`
pub const UDP_SCHEME: &str = "udp://";

/// UDP transport settings
#[derive(Clone, Debug)]
pub struct UdpTransportOptions {
    pub room_name: String,
    pub participant_name: String,
    /// How long `connect` waits for the agent's answer
    pub join_timeout: Duration,
    /// How long one `Data` send waits for its `Ack`
    pub ack_timeout: Duration,
    /// Sends of one message before `publish_data` gives up (at least 1)
    pub send_attempts: u32,
}

impl Default for UdpTransportOptions {
    fn default() -> Self {
        UdpTransportOptions {
            room_name: "lisa-room".to_string(),
            participant_name: "user".to_string(),
            join_timeout: Duration::from_secs(5),
            ack_timeout: Duration::from_millis(250),
            send_attempts: 3,
        }
    }
}

struct UdpSession {
    id: u64,
    peer: SocketAddr,
    receiver: JoinHandle<()>,
}

/// State shared with the receive loop
#[derive(Default)]
struct RoomState {
    session: Mutex<Option<UdpSession>>,
    mic_enabled: AtomicBool,
    /// Outstanding `Data` sends by sequence number
    pending_acks: Mutex<HashMap<u32, oneshot::Sender<()>>>,
}

impl RoomState {
    fn peer(&self) -> Option<SocketAddr> {
        self.session.lock().as_ref().map(|s| s.peer)
    }

    fn take_session(&self) -> Option<UdpSession> {
        let session = self.session.lock().take();
        self.clear();
        session
    }

    /// Drop session `id` if it is still the current one
    fn end_session(&self, id: u64) -> bool {
        let mut slot = self.session.lock();
        if slot.as_ref().map(|s| s.id) != Some(id) {
            return false;
        }
        slot.take();
        drop(slot);
        self.clear();
        true
    }

    fn clear(&self) {
        self.mic_enabled.store(false, Ordering::SeqCst);
        // dropping the senders fails every waiting publish
        self.pending_acks.lock().clear();
    }

    fn acknowledge(&self, seq: u32) {
        match self.pending_acks.lock().remove(&seq) {
            Some(tx) => {
                let _ = tx.send(());
            }
            None => debug!(seq, "ack for nothing outstanding"),
        }
    }
}

/// UDP room transport
pub struct UdpRoomTransport {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    options: UdpTransportOptions,
    events: EventSink,
    room: Arc<RoomState>,
    next_session: AtomicU64,
    next_seq: AtomicU32,
}

impl UdpRoomTransport {
    /// Bind to a local address
    pub async fn bind(
        addr: SocketAddr,
        options: UdpTransportOptions,
        events: EventSink,
    ) -> LisaResult<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| LisaError::TransportError(e.to_string()))?;

        let local_addr = socket
            .local_addr()
            .map_err(|e| LisaError::TransportError(e.to_string()))?;

        Ok(UdpRoomTransport {
            socket: Arc::new(socket),
            local_addr,
            options,
            events,
            room: Arc::new(RoomState::default()),
            next_session: AtomicU64::new(0),
            next_seq: AtomicU32::new(0),
        })
    }

    /// Get local address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn mic_enabled(&self) -> bool {
        self.room.mic_enabled.load(Ordering::SeqCst)
    }

    /// Agent address of the current room, if any
    pub fn peer(&self) -> Option<SocketAddr> {
        self.room.peer()
    }

    async fn resolve(url: &str) -> LisaResult<SocketAddr> {
        let target = url.strip_prefix(UDP_SCHEME).ok_or_else(|| {
            LisaError::TransportConnectFailed(format!("unsupported room url: {}", url))
        })?;
        let target = target.trim_end_matches('/');

        lookup_host(target)
            .await
            .map_err(|e| LisaError::TransportConnectFailed(e.to_string()))?
            .next()
            .ok_or_else(|| LisaError::TransportConnectFailed(format!("no address for {}", target)))
    }

    async fn send_packet(&self, packet: &Packet, dest: SocketAddr) -> LisaResult<()> {
        let bytes = packet.encode()?;
        self.socket
            .send_to(&bytes, dest)
            .await
            .map_err(|e| LisaError::TransportError(e.to_string()))?;
        Ok(())
    }

    /// Wait for the agent's answer to a join
    async fn await_welcome(&self, peer: SocketAddr) -> LisaResult<String> {
        let deadline = Instant::now() + self.options.join_timeout;
        let mut buf = vec![0u8; MAX_PACKET_SIZE];

        loop {
            let received = timeout_at(deadline, self.socket.recv_from(&mut buf))
                .await
                .map_err(|_| LisaError::TransportConnectFailed("join timed out".into()))?;

            let (len, from) =
                received.map_err(|e| LisaError::TransportConnectFailed(e.to_string()))?;
            if from != peer {
                debug!(%from, "ignoring datagram from unknown peer during join");
                continue;
            }

            match Packet::decode(&buf[..len]) {
                Ok(Packet::Welcome { agent }) => return Ok(agent),
                Ok(Packet::Reject { reason }) => {
                    return Err(LisaError::TransportConnectFailed(reason))
                }
                Ok(other) => debug!(kind = ?other.kind(), "ignoring packet during join"),
                Err(e) => warn!("Malformed datagram during join: {}", e),
            }
        }
    }

    /// Send one encoded `Data` datagram until `acked` fires
    async fn send_until_acked(
        &self,
        datagram: &[u8],
        peer: SocketAddr,
        seq: u32,
        acked: &mut oneshot::Receiver<()>,
    ) -> LisaResult<()> {
        let attempts = self.options.send_attempts.max(1);

        for attempt in 1..=attempts {
            self.socket
                .send_to(datagram, peer)
                .await
                .map_err(|e| LisaError::SendFailed(e.to_string()))?;

            match timeout(self.options.ack_timeout, &mut *acked).await {
                Ok(Ok(())) => {
                    if attempt > 1 {
                        debug!(seq, attempt, "delivered after retransmit");
                    }
                    return Ok(());
                }
                Ok(Err(_)) => return Err(LisaError::SendFailed("room closed".into())),
                Err(_) => debug!(seq, attempt, "no ack"),
            }
        }

        warn!(seq, attempts, "giving up on unacknowledged data");
        Err(LisaError::SendFailed(format!(
            "no ack after {} attempts",
            attempts
        )))
    }
}

/// Turn datagrams from the agent into transport events until the
/// agent leaves or the task is aborted
fn start_receive_loop(
    socket: Arc<UdpSocket>,
    room: Arc<RoomState>,
    session: u64,
    peer: SocketAddr,
    agent: String,
    events: EventSink,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        // the agent resends the same seq until acked
        let mut last_delivered: Option<u32> = None;

        loop {
            let (len, from) = match socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    warn!("UDP receive error: {}", e);
                    continue;
                }
            };
            if from != peer {
                continue;
            }

            match Packet::decode(&buf[..len]) {
                Ok(Packet::Data {
                    seq,
                    topic,
                    payload,
                }) => {
                    match (Packet::Ack { seq }).encode() {
                        Ok(ack) => {
                            if let Err(e) = socket.send_to(&ack, peer).await {
                                debug!(seq, "ack not sent: {}", e);
                            }
                        }
                        Err(e) => warn!("ack encode failed: {}", e),
                    }
                    if last_delivered == Some(seq) {
                        debug!(seq, "duplicate data dropped");
                        continue;
                    }
                    last_delivered = Some(seq);
                    events.emit(TransportEvent::Inbound(InboundEvent::Data {
                        topic,
                        payload,
                        sender: Some(agent.clone()),
                    }));
                }
                Ok(Packet::Ack { seq }) => room.acknowledge(seq),
                Ok(Packet::Speakers { identities }) => {
                    events.emit(TransportEvent::Inbound(InboundEvent::ActiveSpeakers(
                        identities,
                    )));
                }
                Ok(Packet::Leave) => {
                    if room.end_session(session) {
                        info!(%peer, %agent, "agent left the room");
                    }
                    events.emit(TransportEvent::Disconnected {
                        reason: format!("{} left the room", agent),
                    });
                    break;
                }
                Ok(other) => debug!(kind = ?other.kind(), "ignoring packet"),
                Err(e) => warn!("Malformed datagram from {}: {}", from, e),
            }
        }
    })
}

impl RoomTransport for UdpRoomTransport {
    async fn connect(&self, url: &str, token: &str) -> LisaResult<()> {
        let peer = Self::resolve(url).await?;

        if self.room.peer().is_some() {
            debug!("leaving current room before joining another");
            self.disconnect().await;
        }

        let join = Packet::Join {
            room: self.options.room_name.clone(),
            participant: self.options.participant_name.clone(),
            token: token.to_string(),
        };
        self.send_packet(&join, peer)
            .await
            .map_err(|e| LisaError::TransportConnectFailed(e.to_string()))?;

        let agent = self.await_welcome(peer).await?;
        info!(%peer, %agent, "joined room");

        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        // hold the slot while spawning so an early Leave finds this session
        let mut slot = self.room.session.lock();
        let receiver = start_receive_loop(
            Arc::clone(&self.socket),
            Arc::clone(&self.room),
            id,
            peer,
            agent,
            self.events.clone(),
        );
        if let Some(old) = slot.replace(UdpSession { id, peer, receiver }) {
            old.receiver.abort();
        }
        Ok(())
    }

    async fn disconnect(&self) {
        if let Some(session) = self.room.take_session() {
            session.receiver.abort();
            if let Err(e) = self.send_packet(&Packet::Leave, session.peer).await {
                debug!("leave not delivered: {}", e);
            }
        }
    }

    async fn set_microphone_enabled(&self, enabled: bool) -> LisaResult<()> {
        if self.room.peer().is_none() {
            return Err(LisaError::NotConnected);
        }
        self.room.mic_enabled.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    async fn publish_data(&self, message: &OutboundMessage) -> LisaResult<()> {
        let peer = self
            .room
            .peer()
            .ok_or_else(|| LisaError::SendFailed("not in a room".into()))?;

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let datagram = Packet::Data {
            seq,
            topic: message.topic.as_str().to_string(),
            payload: message.payload_bytes().to_vec(),
        }
        .encode()
        .map_err(|e| LisaError::SendFailed(e.to_string()))?;

        let (tx, mut acked) = oneshot::channel();
        self.room.pending_acks.lock().insert(seq, tx);
        let result = self.send_until_acked(&datagram, peer, seq, &mut acked).await;
        self.room.pending_acks.lock().remove(&seq);
        result
    }
}

impl Drop for UdpRoomTransport {
    fn drop(&mut self) {
        if let Some(session) = self.room.take_session() {
            session.receiver.abort();
        }
    }
}
