//! `SessionEngine` — the UDP-driven state machine tying everything else
//! in this crate together.
//!
//! One engine owns exactly one socket and, once connected, exactly one
//! remote console. All mutable state lives behind individual `Mutex`es
//! rather than one big lock, since the receive loop and a caller's
//! in-flight `send_message` routinely need to touch different pieces of
//! it at once. `new` spawns the receive loop itself; callers never poll
//! the socket directly.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use uuid::Uuid;

use smartglass_crypto::ecdh::Context as CryptoContext;
use smartglass_protocol::channel::{service_uuid, ChannelRegistry};
use smartglass_protocol::enums::{
    ActiveTitleLocation, ClientType, ConnectionState, DeviceCapabilities, DisconnectReason,
    GamePadButton, MediaControlCommand, MessageType, PacketType, ServiceChannel, SGResultCode,
};
use smartglass_protocol::fragment::{BinaryFragmentAssembler, JsonFragmentAssembler};
use smartglass_protocol::message::{Message, MessageBody, MessageHeader};
use smartglass_protocol::payloads::{
    Acknowledge, Disconnect, GameDvrRecord, LocalJoin, Payload, PowerOff, StartChannelRequest, TitleLaunch,
};
use smartglass_protocol::sequence::SequenceTracker;
use smartglass_protocol::simple::{fragment_connect_auth, ConnectRequest, DiscoveryRequest, PowerOnRequest, SimplePacket};

use crate::ackwaiter::{AckOutcome, AckWaiter, WaitKey};
use crate::config::{SessionConfig, SMARTGLASS_PORT};
use crate::console::{Console, DiscoveredConsole};
use crate::events::EventEmitter;
use crate::managers::stump::StumpRequestName;
use crate::managers::{InputManager, MediaManager, StumpManager, TextManager, TitleManager};
use crate::{Result, SessionError};

#[derive(Debug, Clone, Copy, Default)]
struct ParticipantIds {
    source: u32,
    target: u32,
}

/// The session state machine: discovery, the connect handshake,
/// heartbeat-driven liveness, and message send/receive with acking,
/// fragmentation, and per-channel routing to the five managers.
pub struct SessionEngine {
    socket: Arc<UdpSocket>,
    config: SessionConfig,

    remote: Mutex<Option<SocketAddr>>,
    crypto: Mutex<Option<Arc<CryptoContext>>>,
    participant_ids: Mutex<ParticipantIds>,

    sequence: Mutex<SequenceTracker>,
    channels: Mutex<ChannelRegistry>,
    binary_fragments: Mutex<BinaryFragmentAssembler>,
    json_fragments: Mutex<JsonFragmentAssembler>,

    console: Mutex<Option<Console>>,
    discovered: Mutex<HashMap<String, Console>>,

    ack_waiter: AckWaiter<AckOutcome>,
    connect_waiter: AckWaiter<smartglass_protocol::simple::ConnectResponse>,
    channel_waiter: AckWaiter<SGResultCode>,
    json_waiter: AckWaiter<serde_json::Value>,

    input: Mutex<InputManager>,
    media: Mutex<MediaManager>,
    text: Mutex<TextManager>,
    stump: Mutex<StumpManager>,
    title: Mutex<TitleManager>,

    heartbeat: Mutex<Option<JoinHandle<()>>>,

    pub on_message: EventEmitter<Payload>,
    pub on_json: EventEmitter<serde_json::Value>,
}

impl SessionEngine {
    /// Bind an ephemeral UDP socket (broadcast-enabled) and start the
    /// background receive loop.
    pub async fn new(config: SessionConfig) -> Result<Arc<Self>> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.set_broadcast(true)?;
        tracing::info!(local_addr = %socket.local_addr()?, "session engine bound");

        let engine = Arc::new(Self {
            socket: Arc::new(socket),
            config,
            remote: Mutex::new(None),
            crypto: Mutex::new(None),
            participant_ids: Mutex::new(ParticipantIds::default()),
            sequence: Mutex::new(SequenceTracker::new()),
            channels: Mutex::new(ChannelRegistry::new()),
            binary_fragments: Mutex::new(BinaryFragmentAssembler::new()),
            json_fragments: Mutex::new(JsonFragmentAssembler::new()),
            console: Mutex::new(None),
            discovered: Mutex::new(HashMap::new()),
            ack_waiter: AckWaiter::new(),
            connect_waiter: AckWaiter::new(),
            channel_waiter: AckWaiter::new(),
            json_waiter: AckWaiter::new(),
            input: Mutex::new(InputManager::new()),
            media: Mutex::new(MediaManager::new()),
            text: Mutex::new(TextManager::new()),
            stump: Mutex::new(StumpManager::new()),
            title: Mutex::new(TitleManager::new()),
            heartbeat: Mutex::new(None),
            on_message: EventEmitter::new(),
            on_json: EventEmitter::new(),
        });

        let recv_engine = engine.clone();
        tokio::spawn(async move { recv_engine.recv_loop().await });

        Ok(engine)
    }

    async fn recv_loop(self: Arc<Self>) {
        let mut buf = vec![0u8; 4096];
        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((n, addr)) => {
                    if let Err(e) = self.handle_datagram(&buf[..n], addr).await {
                        tracing::debug!(%addr, error = %e, "dropped malformed packet");
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "udp socket recv failed");
                }
            }
        }
    }

    async fn handle_datagram(&self, raw: &[u8], addr: SocketAddr) -> Result<()> {
        if raw.len() < 2 {
            return Ok(());
        }
        let marker = u16::from_be_bytes([raw[0], raw[1]]);
        if marker == 0xD00D {
            self.handle_message_packet(raw, addr).await
        } else {
            self.handle_simple_packet(raw, addr).await
        }
    }

    async fn handle_simple_packet(&self, raw: &[u8], addr: SocketAddr) -> Result<()> {
        let marker = u16::from_be_bytes([raw[0], raw[1]]);
        let pkt_type = PacketType::try_from(marker)?;

        match pkt_type {
            PacketType::DiscoveryResponse => {
                let packet = SimplePacket::unpack(raw, None)?;
                if let SimplePacket::DiscoveryResponse(resp) = packet {
                    match Console::from_discovery(addr.ip().to_string(), &resp) {
                        Ok(console) => {
                            tracing::debug!(%addr, name = %console.name, "discovered console");
                            self.discovered
                                .lock()
                                .expect("discovered table mutex poisoned")
                                .insert(addr.ip().to_string(), console);
                        }
                        Err(e) => tracing::debug!(%addr, error = %e, "failed to parse discovery response certificate"),
                    }
                }
            }
            PacketType::ConnectResponse => {
                let crypto = self.crypto.lock().expect("crypto mutex poisoned").clone();
                let Some(crypto) = crypto else {
                    tracing::debug!(%addr, "connect response with no crypto context active, dropped");
                    return Ok(());
                };
                let packet = SimplePacket::unpack(raw, Some(&crypto))?;
                if let SimplePacket::ConnectResponse(resp) = packet {
                    self.connect_waiter.resolve(&WaitKey::Connect, resp);
                }
            }
            other => {
                tracing::debug!(%addr, ?other, "unexpected simple packet kind from peer");
            }
        }
        Ok(())
    }

    async fn handle_message_packet(&self, raw: &[u8], addr: SocketAddr) -> Result<()> {
        let crypto = self.crypto.lock().expect("crypto mutex poisoned").clone();
        let Some(crypto) = crypto else {
            tracing::debug!(%addr, "message packet received with no active crypto context, dropped");
            return Ok(());
        };
        let message = Message::unpack(raw, &crypto)?;
        let header = message.header.clone();

        self.sequence
            .lock()
            .expect("sequence tracker mutex poisoned")
            .add_received(header.sequence_number);

        match message.body {
            MessageBody::Fragment(fragment) => {
                let reassembled = self
                    .binary_fragments
                    .lock()
                    .expect("binary fragment assembler mutex poisoned")
                    .add(header.sequence_number, fragment);
                if header.need_ack {
                    self.ack_received(&header).await?;
                }
                if let Some(bytes) = reassembled {
                    match Payload::decode(header.msg_type, &bytes) {
                        Ok(payload) => self.dispatch_payload(&header, payload).await,
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to decode reassembled fragment payload");
                            self.sequence
                                .lock()
                                .expect("sequence tracker mutex poisoned")
                                .add_rejected(header.sequence_number);
                        }
                    }
                }
            }
            MessageBody::Payload(payload) => {
                if header.need_ack {
                    self.ack_received(&header).await?;
                }
                self.dispatch_payload(&header, payload).await;
            }
        }
        Ok(())
    }

    /// Reply to a `need_ack` message with a one-element `Ack` naming just
    /// this sequence number, and bump the low watermark to it.
    async fn ack_received(&self, header: &MessageHeader) -> Result<()> {
        let (low_watermark, processed) = {
            let mut seq = self.sequence.lock().expect("sequence tracker mutex poisoned");
            seq.add_processed(header.sequence_number);
            seq.set_low_watermark(header.sequence_number);
            (seq.low_watermark(), vec![header.sequence_number])
        };
        let payload = Payload::Ack(Acknowledge {
            low_watermark,
            processed,
            rejected: Vec::new(),
        });
        self.send_message(payload, MessageType::Ack, ServiceChannel::Core, false, false).await?;
        Ok(())
    }

    async fn dispatch_payload(&self, header: &MessageHeader, payload: Payload) {
        self.on_message.emit(&payload);

        match &payload {
            Payload::Ack(ack) => {
                for seq in &ack.processed {
                    self.ack_waiter.resolve(&WaitKey::ack(*seq), AckOutcome::Processed);
                }
                for seq in &ack.rejected {
                    self.ack_waiter.resolve(&WaitKey::ack(*seq), AckOutcome::Rejected);
                }
                return;
            }
            Payload::StartChannelResponse(resp) => {
                let opened = self
                    .channels
                    .lock()
                    .expect("channel registry mutex poisoned")
                    .complete_open(resp.channel_request_id, resp.target_channel_id, resp.result);
                if opened.is_some() {
                    self.channel_waiter.resolve(&WaitKey::ack(resp.channel_request_id), resp.result);
                }
                return;
            }
            Payload::Json(text) => {
                match serde_json::from_str::<serde_json::Value>(text) {
                    Ok(value) => {
                        if let Some(msgid) = value.get("msgid").and_then(|v| v.as_str()) {
                            self.json_waiter.resolve(&WaitKey::Json(msgid.to_owned()), value.clone());
                        }
                        self.stump.lock().expect("stump manager mutex poisoned").handle_json(&value);
                        self.on_json.emit(&value);
                    }
                    Err(e) => tracing::warn!(error = %e, "malformed json payload"),
                }
                return;
            }
            Payload::PairedIdentityStateChanged(change) => {
                if let Some(console) = self.console.lock().expect("console mutex poisoned").as_mut() {
                    console.set_pairing_state(change.state);
                }
                return;
            }
            Payload::ConsoleStatus(status) => {
                if let Some(console) = self.console.lock().expect("console mutex poisoned").as_mut() {
                    console.set_console_status(Some(status.clone()));
                }
                return;
            }
            Payload::Disconnect(_) => {
                tracing::info!("console sent disconnect, tearing down session");
                self.reset_after_disconnect();
                return;
            }
            Payload::ActiveSurfaceChange(surface) => {
                if let Some(console) = self.console.lock().expect("console mutex poisoned").as_mut() {
                    console.set_active_surface(Some(surface.clone()));
                }
                // falls through: Title also tracks its own active surface
            }
            _ => {}
        }

        let service = self
            .channels
            .lock()
            .expect("channel registry mutex poisoned")
            .service_for_channel(header.channel_id);

        match service {
            Some(ServiceChannel::SystemInput) => {
                self.input.lock().expect("input manager mutex poisoned").handle_message(&payload);
            }
            Some(ServiceChannel::SystemMedia) => {
                self.media.lock().expect("media manager mutex poisoned").handle_message(&payload);
            }
            Some(ServiceChannel::SystemText) => {
                if let Some(reply) = self.text.lock().expect("text manager mutex poisoned").handle_message(&payload) {
                    let msg_type = reply_message_type(&reply);
                    let _ = self.send_message(reply, msg_type, ServiceChannel::SystemText, false, false).await;
                }
            }
            Some(ServiceChannel::Title) => {
                if let Some(reply) = self.title.lock().expect("title manager mutex poisoned").handle_message(&payload) {
                    let msg_type = reply_message_type(&reply);
                    let _ = self.send_message(reply, msg_type, ServiceChannel::Title, false, false).await;
                }
            }
            Some(ServiceChannel::SystemInputTVRemote) => {
                tracing::warn!(?payload, "binary payload on Stump channel, expected Json");
            }
            _ => {
                tracing::debug!(channel_id = header.channel_id, ?payload, "message on unrouted channel");
            }
        }
    }

    /// Drop every bit of connection-scoped state back to its disconnected
    /// defaults: channels, sequence bookkeeping, fragment assemblers, the
    /// heartbeat task, every pending waiter, and the console record itself
    /// (aside from `device_status`, which a caller sets explicitly).
    fn reset_after_disconnect(&self) {
        self.channels.lock().expect("channel registry mutex poisoned").reset();
        *self.sequence.lock().expect("sequence tracker mutex poisoned") = SequenceTracker::new();
        *self.binary_fragments.lock().expect("binary fragment assembler mutex poisoned") = BinaryFragmentAssembler::new();
        *self.json_fragments.lock().expect("json fragment assembler mutex poisoned") = JsonFragmentAssembler::new();
        self.cancel_heartbeat();
        self.ack_waiter.cancel_all();
        self.connect_waiter.cancel_all();
        self.channel_waiter.cancel_all();
        self.json_waiter.cancel_all();
        if let Some(console) = self.console.lock().expect("console mutex poisoned").as_mut() {
            console.reset_state();
        }
        *self.crypto.lock().expect("crypto mutex poisoned") = None;
        *self.remote.lock().expect("remote mutex poisoned") = None;
    }

    fn remote_addr(&self) -> Result<SocketAddr> {
        self.remote.lock().expect("remote mutex poisoned").ok_or(SessionError::NotConnected)
    }

    // --- discovery / power-on -------------------------------------------

    /// Broadcast (and multicast, and optionally unicast) a
    /// `DiscoveryRequest` `discover_tries` times, then wait `discover_wait`
    /// for responses before returning the discovered table.
    pub async fn discover(&self, unicast: Option<SocketAddr>) -> Result<Vec<DiscoveredConsole>> {
        let packet = SimplePacket::DiscoveryRequest(DiscoveryRequest {
            flags: 0,
            client_type: ClientType::WindowsDesktop,
            minimum_version: 0,
            maximum_version: 2,
        });
        let bytes = packet.pack(None)?;

        for attempt in 0..self.config.discover_tries {
            self.socket.send_to(&bytes, SocketAddr::V4(self.config.broadcast_addr)).await?;
            self.socket.send_to(&bytes, SocketAddr::V4(self.config.multicast_addr)).await?;
            if let Some(addr) = unicast {
                self.socket.send_to(&bytes, addr).await?;
            }
            if attempt + 1 < self.config.discover_tries {
                tokio::time::sleep(self.config.discover_spacing).await;
            }
        }

        tokio::time::sleep(self.config.discover_wait).await;
        Ok(self.discovered())
    }

    /// Snapshot of everything `discover` has heard back from so far.
    pub fn discovered(&self) -> Vec<DiscoveredConsole> {
        self.discovered
            .lock()
            .expect("discovered table mutex poisoned")
            .values()
            .map(Console::to_discovered)
            .collect()
    }

    /// Take ownership of a previously discovered console (including its
    /// crypto context) so it can be passed to [`connect`](Self::connect).
    pub fn take_discovered(&self, address: &str) -> Option<Console> {
        self.discovered.lock().expect("discovered table mutex poisoned").remove(address)
    }

    /// Broadcast (and multicast, and optionally unicast) a `PowerOnRequest`
    /// for `liveid`, `discover_tries` times.
    pub async fn power_on(&self, liveid: &str, unicast: Option<SocketAddr>) -> Result<()> {
        let packet = SimplePacket::PowerOnRequest(PowerOnRequest { liveid: liveid.to_owned() });
        let bytes = packet.pack(None)?;

        for attempt in 0..self.config.discover_tries {
            self.socket.send_to(&bytes, SocketAddr::V4(self.config.broadcast_addr)).await?;
            self.socket.send_to(&bytes, SocketAddr::V4(self.config.multicast_addr)).await?;
            if let Some(addr) = unicast {
                self.socket.send_to(&bytes, addr).await?;
            }
            if attempt + 1 < self.config.discover_tries {
                tokio::time::sleep(self.config.power_on_spacing).await;
            }
        }
        Ok(())
    }

    // --- connect / disconnect --------------------------------------------

    /// Run the connect handshake against `console` and, on success, open
    /// the five system channels and start the heartbeat. `userhash`/`token`
    /// are both empty for an anonymous connection, which is rejected up
    /// front unless the console allows anonymous users.
    pub async fn connect(self: &Arc<Self>, mut console: Console, userhash: Option<String>, token: Option<String>) -> Result<()> {
        if self.console.lock().expect("console mutex poisoned").is_some() {
            return Err(SessionError::AlreadyConnected);
        }
        let crypto = console.crypto.clone().ok_or(SessionError::NotConnected)?;
        let anonymous = userhash.is_none() && token.is_none();
        if anonymous && !console.anonymous_connection_allowed() {
            return Err(SessionError::AnonymousConnectRefused);
        }

        let ip: std::net::IpAddr = console
            .address
            .parse()
            .map_err(|_| SessionError::NoSuchConsole(console.address.clone()))?;
        let remote = SocketAddr::new(ip, SMARTGLASS_PORT);

        console.set_connection_state(ConnectionState::Connecting);
        *self.crypto.lock().expect("crypto mutex poisoned") = Some(crypto.clone());
        *self.remote.lock().expect("remote mutex poisoned") = Some(remote);

        let userhash = userhash.unwrap_or_default();
        let token = token.unwrap_or_default();

        match self.perform_connect_handshake(&crypto, &userhash, &token).await {
            Ok(response) if response.connect_result == smartglass_protocol::enums::ConnectionResult::Success => {
                *self.participant_ids.lock().expect("participant ids mutex poisoned") = ParticipantIds {
                    source: response.participant_id,
                    target: 0,
                };
                console.set_pairing_state(response.pairing_state);
                console.set_connection_state(ConnectionState::Connected);
                *self.console.lock().expect("console mutex poisoned") = Some(console);

                if let Err(e) = self.send_local_join().await {
                    self.reset_after_disconnect();
                    return Err(e);
                }
                if let Err(e) = self.open_system_channels().await {
                    self.reset_after_disconnect();
                    return Err(e);
                }
                self.spawn_heartbeat();
                Ok(())
            }
            Ok(response) => {
                console.set_connection_state(ConnectionState::Error);
                *self.console.lock().expect("console mutex poisoned") = Some(console);
                *self.crypto.lock().expect("crypto mutex poisoned") = None;
                *self.remote.lock().expect("remote mutex poisoned") = None;
                Err(SessionError::ConnectFailed(response.connect_result))
            }
            Err(e) => {
                console.set_connection_state(ConnectionState::Error);
                *self.console.lock().expect("console mutex poisoned") = Some(console);
                *self.crypto.lock().expect("crypto mutex poisoned") = None;
                *self.remote.lock().expect("remote mutex poisoned") = None;
                Err(e)
            }
        }
    }

    async fn perform_connect_handshake(
        &self,
        crypto: &CryptoContext,
        userhash: &str,
        token: &str,
    ) -> Result<smartglass_protocol::simple::ConnectResponse> {
        let sg_uuid = Uuid::new_v4();

        let build = |uh: &str, tok: &str, num: u32, group_end: u32| ConnectRequest {
            sg_uuid,
            public_key_type: crypto.pubkey_type(),
            public_key: crypto.pubkey_bytes().to_vec(),
            iv: crypto.generate_iv(None),
            userhash: uh.to_owned(),
            jwt: tok.to_owned(),
            connect_request_num: num,
            connect_request_group_start: 0,
            connect_request_group_end: group_end,
        };

        let full_packed_len = SimplePacket::ConnectRequest(build(userhash, token, 0, 1)).pack(Some(crypto))?.len();

        let fragments = if full_packed_len <= self.config.connect_max_unfragmented_size {
            vec![(userhash.to_owned(), token.to_owned())]
        } else {
            let dummy_len = SimplePacket::ConnectRequest(build("", "", 0, 1)).pack(Some(crypto))?.len();
            let available = self.config.connect_max_unfragmented_size.saturating_sub(dummy_len);
            let fragments = fragment_connect_auth(userhash, token, available);
            if fragments.len() <= 1 {
                return Err(smartglass_protocol::FragmentError::AuthTooSmallToFragment.into());
            }
            fragments
        };
        let group_end = fragments.len() as u32;
        let remote = self.remote_addr()?;

        for attempt in 0..=self.config.connect_retries {
            for (i, (uh, tok)) in fragments.iter().enumerate() {
                let request = build(uh, tok, i as u32, group_end);
                let bytes = SimplePacket::ConnectRequest(request).pack(Some(crypto))?;
                self.socket.send_to(&bytes, remote).await?;
            }

            match self.connect_waiter.wait(WaitKey::Connect, self.config.blocking_send_timeout).await {
                Ok(response) => return Ok(response),
                Err(SessionError::Timeout(_)) if attempt < self.config.connect_retries => {
                    tracing::debug!(attempt, "connect request timed out, retrying");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        Err(SessionError::Timeout("connect".to_owned()))
    }

    async fn send_local_join(&self) -> Result<()> {
        let payload = Payload::LocalJoin(LocalJoin {
            device_type: ClientType::WindowsDesktop,
            native_width: 1920,
            native_height: 1080,
            dpi_x: 96,
            dpi_y: 96,
            device_capabilities: DeviceCapabilities::empty(),
            client_version: 0,
            os_major_version: 0,
            os_minor_version: 0,
            display_name: "smartglass-rs".to_owned(),
        });
        self.send_message(payload, MessageType::LocalJoin, ServiceChannel::Core, false, false)
            .await
            .map(|_| ())
    }

    async fn open_channel(&self, service: ServiceChannel) -> Result<()> {
        let request_id = self.channels.lock().expect("channel registry mutex poisoned").begin_open(service);
        let payload = Payload::StartChannelRequest(StartChannelRequest {
            channel_request_id: request_id,
            title_id: 0,
            service: service_uuid(service),
            activity_id: 0,
        });
        self.send_message(payload, MessageType::StartChannelRequest, ServiceChannel::Core, false, false)
            .await?;
        let result = self.channel_waiter.wait(WaitKey::ack(request_id), self.config.blocking_send_timeout).await?;
        if result != SGResultCode::Success {
            return Err(SessionError::Rejected(result));
        }
        Ok(())
    }

    async fn open_system_channels(&self) -> Result<()> {
        for service in [
            ServiceChannel::SystemInput,
            ServiceChannel::SystemInputTVRemote,
            ServiceChannel::SystemMedia,
            ServiceChannel::SystemText,
            ServiceChannel::SystemBroadcast,
        ] {
            self.open_channel(service).await?;
        }
        Ok(())
    }

    /// Best-effort `Disconnect` to the console, then a full local reset.
    pub async fn disconnect(&self, reason: DisconnectReason) -> Result<()> {
        let payload = Payload::Disconnect(Disconnect { reason, error_code: 0 });
        let _ = self.send_message(payload, MessageType::Disconnect, ServiceChannel::Core, false, false).await;
        self.reset_after_disconnect();
        Ok(())
    }

    fn spawn_heartbeat(self: &Arc<Self>) {
        let engine = self.clone();
        let handle = tokio::spawn(async move { engine.heartbeat_loop().await });
        *self.heartbeat.lock().expect("heartbeat mutex poisoned") = Some(handle);
    }

    fn cancel_heartbeat(&self) {
        if let Some(handle) = self.heartbeat.lock().expect("heartbeat mutex poisoned").take() {
            handle.abort();
        }
    }

    /// Send a needs-ack empty `Ack` on `Core` every `heartbeat_period`
    /// while connected; a timed-out heartbeat tears the session down and
    /// fires `on_timeout` on the console record.
    async fn heartbeat_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.heartbeat_period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let low_watermark = self.sequence.lock().expect("sequence tracker mutex poisoned").low_watermark();
            let payload = Payload::Ack(Acknowledge {
                low_watermark,
                processed: Vec::new(),
                rejected: Vec::new(),
            });
            if let Err(e) = self.send_message(payload, MessageType::Ack, ServiceChannel::Core, true, true).await {
                tracing::warn!(error = %e, "heartbeat ack failed, tearing down session");
                if let Some(console) = self.console.lock().expect("console mutex poisoned").as_mut() {
                    console.set_connection_state(ConnectionState::Error);
                    console.on_timeout.emit(&());
                }
                self.reset_after_disconnect();
                return;
            }
        }
    }

    // --- outbound messages ------------------------------------------------

    /// Send `payload` on `service`'s channel, using the engine's default
    /// timeout/retry count from [`SessionConfig`].
    pub async fn send_message(
        &self,
        payload: Payload,
        msg_type: MessageType,
        service: ServiceChannel,
        need_ack: bool,
        blocking: bool,
    ) -> Result<Option<AckOutcome>> {
        self.send_message_with(
            payload,
            msg_type,
            service,
            need_ack,
            blocking,
            self.config.blocking_send_timeout,
            self.config.send_retries,
        )
        .await
    }

    /// Send `payload` on `service`'s channel. If `need_ack` and `blocking`
    /// are both set, retries the identical packet (same sequence number)
    /// up to `retries` times until an `Ack` arrives or `timeout` elapses on
    /// every attempt.
    #[allow(clippy::too_many_arguments)]
    pub async fn send_message_with(
        &self,
        payload: Payload,
        msg_type: MessageType,
        service: ServiceChannel,
        need_ack: bool,
        blocking: bool,
        timeout: Duration,
        retries: u32,
    ) -> Result<Option<AckOutcome>> {
        let channel_id = self
            .channels
            .lock()
            .expect("channel registry mutex poisoned")
            .channel_id(service)
            .ok_or(SessionError::ChannelNotOpen(service))?;
        let crypto = self.crypto.lock().expect("crypto mutex poisoned").clone().ok_or(SessionError::NotConnected)?;
        let remote = self.remote_addr()?;
        let participants = *self.participant_ids.lock().expect("participant ids mutex poisoned");
        let sequence = self.sequence.lock().expect("sequence tracker mutex poisoned").next_sequence();

        let message = Message::new(msg_type, channel_id, sequence, participants.target, participants.source, need_ack, payload);
        let bytes = message.pack(&crypto)?;

        if !need_ack || !blocking {
            self.socket.send_to(&bytes, remote).await?;
            return Ok(None);
        }

        for attempt in 0..=retries {
            let wait = self.ack_waiter.wait(WaitKey::ack(sequence), timeout);
            self.socket.send_to(&bytes, remote).await?;
            match wait.await {
                Ok(outcome) => return Ok(Some(outcome)),
                Err(SessionError::Timeout(_)) if attempt < retries => {
                    tracing::debug!(sequence, attempt, "send timed out, retrying");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        Err(SessionError::Timeout(format!("ack_{sequence}")))
    }

    // --- supplemented top-level operations --------------------------------

    pub async fn power_off(&self) -> Result<()> {
        let liveid = self
            .console
            .lock()
            .expect("console mutex poisoned")
            .as_ref()
            .map(|c| c.liveid.clone())
            .ok_or(SessionError::NotConnected)?;
        let payload = Payload::PowerOff(PowerOff { liveid });
        self.send_message(payload, MessageType::PowerOff, ServiceChannel::Core, false, false).await?;
        self.reset_after_disconnect();
        Ok(())
    }

    pub async fn game_dvr_record(&self, start_time_delta: i32, end_time_delta: i32) -> Result<()> {
        let payload = Payload::GameDvrRecord(GameDvrRecord { start_time_delta, end_time_delta });
        self.send_message(payload, MessageType::GameDvrRecord, ServiceChannel::Core, false, false)
            .await
            .map(|_| ())
    }

    pub async fn launch_title(&self, uri: String, location: ActiveTitleLocation) -> Result<()> {
        let payload = Payload::TitleLaunch(TitleLaunch { location, uri });
        self.send_message(payload, MessageType::TitleLaunch, ServiceChannel::Core, false, false)
            .await
            .map(|_| ())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn gamepad_input(
        &self,
        timestamp: u64,
        buttons: GamePadButton,
        left_trigger: f32,
        right_trigger: f32,
        left_thumbstick_x: f32,
        left_thumbstick_y: f32,
        right_thumbstick_x: f32,
        right_thumbstick_y: f32,
    ) -> Result<()> {
        let payload = self.input.lock().expect("input manager mutex poisoned").gamepad_input(
            timestamp,
            buttons,
            left_trigger,
            right_trigger,
            left_thumbstick_x,
            left_thumbstick_y,
            right_thumbstick_x,
            right_thumbstick_y,
        );
        self.send_message(payload, MessageType::Gamepad, ServiceChannel::SystemInput, false, false)
            .await
            .map(|_| ())
    }

    pub async fn media_command(
        &self,
        title_id: u32,
        command: MediaControlCommand,
        request_id: u64,
        seek_position: Option<u64>,
    ) -> Result<()> {
        let payload = self
            .media
            .lock()
            .expect("media manager mutex poisoned")
            .media_command(title_id, command, request_id, seek_position);
        self.send_message(payload, MessageType::MediaCommand, ServiceChannel::SystemMedia, false, false)
            .await
            .map(|_| ())
    }

    pub async fn send_systemtext_input(&self, text: String) -> Result<()> {
        let payload = self.text.lock().expect("text manager mutex poisoned").send_systemtext_input(text)?;
        self.send_message(payload, MessageType::SystemTextInput, ServiceChannel::SystemText, true, true)
            .await
            .map(|_| ())
    }

    pub async fn finish_text_input(&self) -> Result<()> {
        let payload = self.text.lock().expect("text manager mutex poisoned").finish_text_input()?;
        self.send_message(payload, MessageType::SystemTextDone, ServiceChannel::SystemText, true, true)
            .await
            .map(|_| ())
    }

    /// Fire-and-forget a Stump JSON-RPC request; the response, once it
    /// arrives, only updates the manager's cache and fires its events.
    pub async fn stump_request(&self, name: StumpRequestName, params: serde_json::Value) -> Result<String> {
        let (msgid, text) = self.stump.lock().expect("stump manager mutex poisoned").build_request(name, params);
        self.send_message(Payload::Json(text), MessageType::Json, ServiceChannel::SystemInputTVRemote, false, false)
            .await?;
        Ok(msgid)
    }

    /// Same as [`stump_request`](Self::stump_request) but waits for the
    /// correlated `{response}`/`{error}` envelope and returns it directly.
    pub async fn stump_request_blocking(&self, name: StumpRequestName, params: serde_json::Value) -> Result<serde_json::Value> {
        let (msgid, text) = self.stump.lock().expect("stump manager mutex poisoned").build_request(name, params);
        let wait = self.json_waiter.wait(WaitKey::Json(msgid), self.config.blocking_send_timeout);
        self.send_message(Payload::Json(text), MessageType::Json, ServiceChannel::SystemInputTVRemote, false, false)
            .await?;
        wait.await
    }

    /// Open a title's own auxiliary channel, lazily, once the title asks
    /// for it.
    pub async fn start_title_channel(&self, title_id: u32) -> Result<()> {
        let request_id = self.channels.lock().expect("channel registry mutex poisoned").begin_open(ServiceChannel::Title);
        let payload = self.title.lock().expect("title manager mutex poisoned").start_title_channel(request_id, title_id);
        self.send_message(payload, MessageType::StartChannelRequest, ServiceChannel::Core, false, false)
            .await?;
        let result = self.channel_waiter.wait(WaitKey::ack(request_id), self.config.blocking_send_timeout).await?;
        if result != SGResultCode::Success {
            return Err(SessionError::Rejected(result));
        }
        Ok(())
    }

    // --- accessors ---------------------------------------------------------

    pub fn console(&self) -> std::sync::MutexGuard<'_, Option<Console>> {
        self.console.lock().expect("console mutex poisoned")
    }

    pub fn input(&self) -> std::sync::MutexGuard<'_, InputManager> {
        self.input.lock().expect("input manager mutex poisoned")
    }

    pub fn media(&self) -> std::sync::MutexGuard<'_, MediaManager> {
        self.media.lock().expect("media manager mutex poisoned")
    }

    pub fn text(&self) -> std::sync::MutexGuard<'_, TextManager> {
        self.text.lock().expect("text manager mutex poisoned")
    }

    pub fn stump(&self) -> std::sync::MutexGuard<'_, StumpManager> {
        self.stump.lock().expect("stump manager mutex poisoned")
    }

    pub fn title(&self) -> std::sync::MutexGuard<'_, TitleManager> {
        self.title.lock().expect("title manager mutex poisoned")
    }
}

/// The `MessageType` a reply payload built by one of the managers should
/// be sent as. Only covers the handful of reply shapes the managers ever
/// hand back to the engine.
fn reply_message_type(payload: &Payload) -> MessageType {
    match payload {
        Payload::SystemTextAck(_) => MessageType::SystemTextAck,
        Payload::SystemTextDone(_) => MessageType::SystemTextDone,
        Payload::AuxiliaryStream(_) => MessageType::AuxilaryStream,
        other => {
            tracing::warn!(?other, "unexpected manager reply payload, sending as AuxilaryStream");
            MessageType::AuxilaryStream
        }
    }
}
