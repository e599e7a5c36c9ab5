//! Every typed `Message` sub-payload and its wire layout.
//!
//! [`Payload::decode`] dispatches on [`MessageType`]; message types with
//! no body (`Group`, `StopActivity`, `Navigate`, `Tunnel`, `System`,
//! `MirroringRequest`, `Null`) all decode to [`Payload::Empty`].

use uuid::Uuid;

use crate::binio::{Reader, Writer};
use crate::enums::{
    ActiveSurfaceType, ActiveTitleLocation, ClientType, DeviceCapabilities, DisconnectReason,
    GamePadButton, MediaControlCommand, MediaPlaybackStatus, MediaType, MessageType,
    PairedIdentityState, SGResultCode, SoundLevel, TextInputScope, TextOption, TextResult,
    TouchAction,
};
use crate::Result;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Acknowledge {
    pub low_watermark: u32,
    pub processed: Vec<u32>,
    pub rejected: Vec<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalJoin {
    pub device_type: ClientType,
    pub native_width: u16,
    pub native_height: u16,
    pub dpi_x: u16,
    pub dpi_y: u16,
    pub device_capabilities: DeviceCapabilities,
    pub client_version: u32,
    pub os_major_version: u32,
    pub os_minor_version: u32,
    pub display_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuxEndpoint {
    pub ip: String,
    pub port: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuxConnectionInfo {
    pub crypto_key: Vec<u8>,
    pub server_iv: Vec<u8>,
    pub client_iv: Vec<u8>,
    pub sign_hash: Vec<u8>,
    pub endpoints: Vec<AuxEndpoint>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuxiliaryStream {
    /// `None` when `connection_info_flag == 0` (the client is requesting
    /// the console open an auxiliary stream); `Some` when the console is
    /// handing over the connection details (`flag == 1`).
    pub connection_info: Option<AuxConnectionInfo>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveSurfaceChange {
    pub surface_type: ActiveSurfaceType,
    pub server_tcp_port: u16,
    pub server_udp_port: u16,
    pub session_id: Uuid,
    pub render_width: u16,
    pub render_height: u16,
    pub master_session_key: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveTitle {
    pub title_id: u32,
    pub has_focus: bool,
    pub title_location: ActiveTitleLocation,
    pub product_id: Uuid,
    pub sandbox_id: Uuid,
    pub aum: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsoleStatus {
    pub live_tv_provider: u32,
    pub major_version: u32,
    pub minor_version: u32,
    pub build_number: u32,
    pub locale: String,
    pub active_titles: Vec<ActiveTitle>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextConfiguration {
    pub text_session_id: u64,
    pub text_buffer_version: u32,
    pub text_options: TextOption,
    pub input_scope: TextInputScope,
    pub max_text_length: u32,
    pub locale: String,
    pub prompt: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TitleTextInput {
    pub text_session_id: u64,
    pub text_buffer_version: u32,
    pub result: TextResult,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TitleTextSelection {
    pub text_session_id: u64,
    pub text_buffer_version: u32,
    pub start: u32,
    pub length: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TitleLaunch {
    pub location: ActiveTitleLocation,
    pub uri: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartChannelRequest {
    pub channel_request_id: u32,
    pub title_id: u32,
    pub service: Uuid,
    pub activity_id: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartChannelResponse {
    pub channel_request_id: u32,
    pub target_channel_id: u64,
    pub result: SGResultCode,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StopChannel {
    pub target_channel_id: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Disconnect {
    pub reason: DisconnectReason,
    pub error_code: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TouchPoint {
    pub touchpoint_id: u32,
    pub touchpoint_action: TouchAction,
    pub touchpoint_x: u32,
    pub touchpoint_y: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Touch {
    pub touch_msg_timestamp: u32,
    pub touchpoints: Vec<TouchPoint>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Accelerometer {
    pub timestamp: u64,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Gyrometer {
    pub timestamp: u64,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Inclinometer {
    pub timestamp: u64,
    pub pitch: f32,
    pub roll: f32,
    pub yaw: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Compass {
    pub timestamp: u64,
    pub magnetic_north: f32,
    pub true_north: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Orientation {
    pub timestamp: u64,
    pub rotation_matrix_value: f32,
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PairedIdentityStateChanged {
    pub state: PairedIdentityState,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameDvrRecord {
    pub start_time_delta: i32,
    pub end_time_delta: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PowerOff {
    pub liveid: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaControllerRemoved {
    pub title_id: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaCommandResult {
    pub request_id: u64,
    pub result: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaCommand {
    pub request_id: u64,
    pub title_id: u32,
    pub command: MediaControlCommand,
    /// Only present when `command == MediaControlCommand::SEEK` — see
    /// `SPEC_FULL.md` §10(b).
    pub seek_position: Option<u64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MediaMetadataEntry {
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MediaState {
    pub title_id: u32,
    pub aum_id: String,
    pub asset_id: String,
    pub media_type: MediaType,
    pub sound_level: SoundLevel,
    pub enabled_commands: MediaControlCommand,
    pub playback_status: MediaPlaybackStatus,
    pub rate: f32,
    pub position: u64,
    pub media_start: u64,
    pub media_end: u64,
    pub min_seek: u64,
    pub max_seek: u64,
    pub metadata: Vec<MediaMetadataEntry>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Gamepad {
    pub timestamp: u64,
    pub buttons: GamePadButton,
    pub left_trigger: f32,
    pub right_trigger: f32,
    pub left_thumbstick_x: f32,
    pub left_thumbstick_y: f32,
    pub right_thumbstick_x: f32,
    pub right_thumbstick_y: f32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SystemTextAcknowledge {
    pub text_session_id: u32,
    pub text_version_ack: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SystemTextDone {
    pub text_session_id: u32,
    pub text_version: u32,
    pub flags: u32,
    pub result: TextResult,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextInputDelta {
    pub offset: u32,
    pub delete_count: u32,
    pub insert_content: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SystemTextInput {
    pub text_session_id: u32,
    pub base_version: u32,
    pub submitted_version: u32,
    pub total_text_byte_len: u32,
    pub selection_start: i32,
    pub selection_length: i32,
    pub flags: u16,
    pub text_chunk_byte_start: u32,
    pub text_chunk: String,
    /// Left unpopulated unless a caller explicitly constructs deltas —
    /// see `SPEC_FULL.md` §10(a).
    pub delta: Option<Vec<TextInputDelta>>,
}

/// Any decoded `Message` sub-payload.
#[derive(Clone, Debug)]
pub enum Payload {
    /// `Group`, `StopActivity`, `Navigate`, `Tunnel`, `System`,
    /// `MirroringRequest`, and `Null` all carry no body.
    Empty,
    Json(String),
    Ack(Acknowledge),
    LocalJoin(LocalJoin),
    AuxiliaryStream(AuxiliaryStream),
    ActiveSurfaceChange(ActiveSurfaceChange),
    ConsoleStatus(ConsoleStatus),
    TextConfiguration(TextConfiguration),
    TitleTextInput(TitleTextInput),
    TitleTextSelection(TitleTextSelection),
    TitleLaunch(TitleLaunch),
    StartChannelRequest(StartChannelRequest),
    StartChannelResponse(StartChannelResponse),
    StopChannel(StopChannel),
    Disconnect(Disconnect),
    Touch(Touch),
    Accelerometer(Accelerometer),
    Gyrometer(Gyrometer),
    Inclinometer(Inclinometer),
    Compass(Compass),
    Orientation(Orientation),
    PairedIdentityStateChanged(PairedIdentityStateChanged),
    Unsnap(u8),
    GameDvrRecord(GameDvrRecord),
    PowerOff(PowerOff),
    MediaControllerRemoved(MediaControllerRemoved),
    MediaCommand(MediaCommand),
    MediaCommandResult(MediaCommandResult),
    MediaState(MediaState),
    Gamepad(Gamepad),
    SystemTextAck(SystemTextAcknowledge),
    SystemTextDone(SystemTextDone),
    SystemTextInput(SystemTextInput),
}

impl Payload {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        match self {
            Payload::Empty => {}
            Payload::Json(text) => {
                w.sgstring(text);
            }
            Payload::Ack(a) => {
                w.u32(a.low_watermark);
                w.prefixed_array_u32(&a.processed, |w, v| {
                    w.u32(*v);
                });
                w.prefixed_array_u32(&a.rejected, |w, v| {
                    w.u32(*v);
                });
            }
            Payload::LocalJoin(l) => {
                w.u16(l.device_type.into());
                w.u16(l.native_width);
                w.u16(l.native_height);
                w.u16(l.dpi_x);
                w.u16(l.dpi_y);
                w.u64(l.device_capabilities.bits());
                w.u32(l.client_version);
                w.u32(l.os_major_version);
                w.u32(l.os_minor_version);
                w.sgstring(&l.display_name);
            }
            Payload::AuxiliaryStream(a) => match &a.connection_info {
                None => {
                    w.u8(0);
                }
                Some(info) => {
                    w.u8(1);
                    w.u16(info.crypto_key.len() as u16);
                    w.bytes(&info.crypto_key);
                    w.u16(info.server_iv.len() as u16);
                    w.bytes(&info.server_iv);
                    w.u16(info.client_iv.len() as u16);
                    w.bytes(&info.client_iv);
                    w.u16(info.sign_hash.len() as u16);
                    w.bytes(&info.sign_hash);
                    w.prefixed_array_u16(&info.endpoints, |w, e| {
                        w.sgstring(&e.ip);
                        w.sgstring(&e.port);
                    });
                }
            },
            Payload::ActiveSurfaceChange(a) => {
                w.u16(a.surface_type.into());
                w.u16(a.server_tcp_port);
                w.u16(a.server_udp_port);
                w.uuid(&a.session_id);
                w.u16(a.render_width);
                w.u16(a.render_height);
                w.bytes(&a.master_session_key);
            }
            Payload::ConsoleStatus(c) => {
                w.u32(c.live_tv_provider);
                w.u32(c.major_version);
                w.u32(c.minor_version);
                w.u32(c.build_number);
                w.sgstring(&c.locale);
                w.prefixed_array_u16(&c.active_titles, |w, t| {
                    w.u32(t.title_id);
                    let location: u16 = t.title_location.into();
                    let disposition = ((t.has_focus as u16) << 15) | (location & 0x7FFF);
                    w.u16(disposition);
                    w.uuid(&t.product_id);
                    w.uuid(&t.sandbox_id);
                    w.sgstring(&t.aum);
                });
            }
            Payload::TextConfiguration(t) => {
                w.u64(t.text_session_id);
                w.u32(t.text_buffer_version);
                w.u32(t.text_options.bits());
                w.u32(t.input_scope.into());
                w.u32(t.max_text_length);
                w.sgstring(&t.locale);
                w.sgstring(&t.prompt);
            }
            Payload::TitleTextInput(t) => {
                w.u64(t.text_session_id);
                w.u32(t.text_buffer_version);
                w.u16(t.result.into());
                w.sgstring(&t.text);
            }
            Payload::TitleTextSelection(t) => {
                w.u64(t.text_session_id);
                w.u32(t.text_buffer_version);
                w.u32(t.start);
                w.u32(t.length);
            }
            Payload::TitleLaunch(t) => {
                w.u16(t.location.into());
                w.sgstring(&t.uri);
            }
            Payload::StartChannelRequest(s) => {
                w.u32(s.channel_request_id);
                w.u32(s.title_id);
                w.uuid(&s.service);
                w.u32(s.activity_id);
            }
            Payload::StartChannelResponse(s) => {
                w.u32(s.channel_request_id);
                w.u64(s.target_channel_id);
                w.u32(s.result.into());
            }
            Payload::StopChannel(s) => {
                w.u64(s.target_channel_id);
            }
            Payload::Disconnect(d) => {
                w.u32(d.reason.into());
                w.u32(d.error_code);
            }
            Payload::Touch(t) => {
                w.u32(t.touch_msg_timestamp);
                w.prefixed_array_u16(&t.touchpoints, |w, p| {
                    w.u32(p.touchpoint_id);
                    w.u16(p.touchpoint_action.into());
                    w.u32(p.touchpoint_x);
                    w.u32(p.touchpoint_y);
                });
            }
            Payload::Accelerometer(a) => {
                w.u64(a.timestamp);
                w.f32(a.x);
                w.f32(a.y);
                w.f32(a.z);
            }
            Payload::Gyrometer(g) => {
                w.u64(g.timestamp);
                w.f32(g.x);
                w.f32(g.y);
                w.f32(g.z);
            }
            Payload::Inclinometer(i) => {
                w.u64(i.timestamp);
                w.f32(i.pitch);
                w.f32(i.roll);
                w.f32(i.yaw);
            }
            Payload::Compass(c) => {
                w.u64(c.timestamp);
                w.f32(c.magnetic_north);
                w.f32(c.true_north);
            }
            Payload::Orientation(o) => {
                w.u64(o.timestamp);
                w.f32(o.rotation_matrix_value);
                w.f32(o.w);
                w.f32(o.x);
                w.f32(o.y);
                w.f32(o.z);
            }
            Payload::PairedIdentityStateChanged(p) => {
                w.u16(p.state.into());
            }
            Payload::Unsnap(b) => {
                w.u8(*b);
            }
            Payload::GameDvrRecord(g) => {
                w.i32(g.start_time_delta);
                w.i32(g.end_time_delta);
            }
            Payload::PowerOff(p) => {
                w.sgstring(&p.liveid);
            }
            Payload::MediaControllerRemoved(m) => {
                w.u32(m.title_id);
            }
            Payload::MediaCommandResult(m) => {
                w.u64(m.request_id);
                w.u32(m.result);
            }
            Payload::MediaCommand(m) => {
                w.u64(m.request_id);
                w.u32(m.title_id);
                w.u32(m.command.bits());
                if m.command.contains(MediaControlCommand::SEEK) {
                    w.u64(m.seek_position.unwrap_or(0));
                }
            }
            Payload::MediaState(m) => {
                w.u32(m.title_id);
                w.sgstring(&m.aum_id);
                w.sgstring(&m.asset_id);
                w.u16(m.media_type.into());
                w.u16(m.sound_level.into());
                w.u32(m.enabled_commands.bits());
                w.u16(m.playback_status.into());
                w.f32(m.rate);
                w.u64(m.position);
                w.u64(m.media_start);
                w.u64(m.media_end);
                w.u64(m.min_seek);
                w.u64(m.max_seek);
                w.prefixed_array_u16(&m.metadata, |w, e| {
                    w.sgstring(&e.name);
                    w.sgstring(&e.value);
                });
            }
            Payload::Gamepad(g) => {
                w.u64(g.timestamp);
                w.u16(g.buttons.bits());
                w.f32(g.left_trigger);
                w.f32(g.right_trigger);
                w.f32(g.left_thumbstick_x);
                w.f32(g.left_thumbstick_y);
                w.f32(g.right_thumbstick_x);
                w.f32(g.right_thumbstick_y);
            }
            Payload::SystemTextAck(s) => {
                w.u32(s.text_session_id);
                w.u32(s.text_version_ack);
            }
            Payload::SystemTextDone(s) => {
                w.u32(s.text_session_id);
                w.u32(s.text_version);
                w.u32(s.flags);
                let result: u16 = s.result.into();
                w.u16(result);
            }
            Payload::SystemTextInput(s) => {
                w.u32(s.text_session_id);
                w.u32(s.base_version);
                w.u32(s.submitted_version);
                w.u32(s.total_text_byte_len);
                w.i32(s.selection_start);
                w.i32(s.selection_length);
                w.u16(s.flags);
                w.u32(s.text_chunk_byte_start);
                w.sgstring(&s.text_chunk);
                if let Some(deltas) = &s.delta {
                    w.prefixed_array_u16(deltas, |w, d| {
                        w.u32(d.offset);
                        w.u32(d.delete_count);
                        w.sgstring(&d.insert_content);
                    });
                }
            }
        }
        w.into_bytes()
    }

    pub fn decode(msg_type: MessageType, bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        let payload = match msg_type {
            MessageType::Null
            | MessageType::Group
            | MessageType::StopActivity
            | MessageType::Navigate
            | MessageType::Tunnel
            | MessageType::System
            | MessageType::MirroringRequest => Payload::Empty,
            MessageType::Json => Payload::Json(r.sgstring()?),
            MessageType::Ack => Payload::Ack(Acknowledge {
                low_watermark: r.u32()?,
                processed: r.prefixed_array_u32(|r| r.u32())?,
                rejected: r.prefixed_array_u32(|r| r.u32())?,
            }),
            MessageType::LocalJoin => Payload::LocalJoin(LocalJoin {
                device_type: ClientType::try_from(r.u16()?)?,
                native_width: r.u16()?,
                native_height: r.u16()?,
                dpi_x: r.u16()?,
                dpi_y: r.u16()?,
                device_capabilities: DeviceCapabilities::from_bits_truncate(r.u64()?),
                client_version: r.u32()?,
                os_major_version: r.u32()?,
                os_minor_version: r.u32()?,
                display_name: r.sgstring()?,
            }),
            MessageType::AuxilaryStream => {
                let flag = r.u8()?;
                let connection_info = if flag == 1 {
                    let crypto_key_len = r.u16()? as usize;
                    let crypto_key = r.bytes(crypto_key_len)?;
                    let server_iv_len = r.u16()? as usize;
                    let server_iv = r.bytes(server_iv_len)?;
                    let client_iv_len = r.u16()? as usize;
                    let client_iv = r.bytes(client_iv_len)?;
                    let sign_hash_len = r.u16()? as usize;
                    let sign_hash = r.bytes(sign_hash_len)?;
                    let endpoints = r.prefixed_array_u16(|r| {
                        Ok(AuxEndpoint {
                            ip: r.sgstring()?,
                            port: r.sgstring()?,
                        })
                    })?;
                    Some(AuxConnectionInfo {
                        crypto_key,
                        server_iv,
                        client_iv,
                        sign_hash,
                        endpoints,
                    })
                } else {
                    None
                };
                Payload::AuxiliaryStream(AuxiliaryStream { connection_info })
            }
            MessageType::ActiveSurfaceChange => Payload::ActiveSurfaceChange(ActiveSurfaceChange {
                surface_type: ActiveSurfaceType::try_from(r.u16()?)?,
                server_tcp_port: r.u16()?,
                server_udp_port: r.u16()?,
                session_id: r.uuid()?,
                render_width: r.u16()?,
                render_height: r.u16()?,
                master_session_key: r.bytes(0x20)?,
            }),
            MessageType::ConsoleStatus => Payload::ConsoleStatus(ConsoleStatus {
                live_tv_provider: r.u32()?,
                major_version: r.u32()?,
                minor_version: r.u32()?,
                build_number: r.u32()?,
                locale: r.sgstring()?,
                active_titles: r.prefixed_array_u16(|r| {
                    let title_id = r.u32()?;
                    let disposition = r.u16()?;
                    Ok(ActiveTitle {
                        title_id,
                        has_focus: (disposition >> 15) & 0x1 != 0,
                        title_location: ActiveTitleLocation::try_from(disposition & 0x7FFF)?,
                        product_id: r.uuid()?,
                        sandbox_id: r.uuid()?,
                        aum: r.sgstring()?,
                    })
                })?,
            }),
            MessageType::TitleTextConfiguration | MessageType::SystemTextConfiguration => {
                Payload::TextConfiguration(TextConfiguration {
                    text_session_id: r.u64()?,
                    text_buffer_version: r.u32()?,
                    text_options: TextOption::from_bits_truncate(r.u32()?),
                    input_scope: TextInputScope::try_from(r.u32()?)?,
                    max_text_length: r.u32()?,
                    locale: r.sgstring()?,
                    prompt: r.sgstring()?,
                })
            }
            MessageType::TitleTextInput => Payload::TitleTextInput(TitleTextInput {
                text_session_id: r.u64()?,
                text_buffer_version: r.u32()?,
                result: TextResult::try_from(r.u16()?)?,
                text: r.sgstring()?,
            }),
            MessageType::TitleTextSelection => Payload::TitleTextSelection(TitleTextSelection {
                text_session_id: r.u64()?,
                text_buffer_version: r.u32()?,
                start: r.u32()?,
                length: r.u32()?,
            }),
            MessageType::TitleLaunch => Payload::TitleLaunch(TitleLaunch {
                location: ActiveTitleLocation::try_from(r.u16()?)?,
                uri: r.sgstring()?,
            }),
            MessageType::StartChannelRequest => Payload::StartChannelRequest(StartChannelRequest {
                channel_request_id: r.u32()?,
                title_id: r.u32()?,
                service: r.uuid()?,
                activity_id: r.u32()?,
            }),
            MessageType::StartChannelResponse => Payload::StartChannelResponse(StartChannelResponse {
                channel_request_id: r.u32()?,
                target_channel_id: r.u64()?,
                result: SGResultCode::try_from(r.u32()?)?,
            }),
            MessageType::StopChannel => Payload::StopChannel(StopChannel {
                target_channel_id: r.u64()?,
            }),
            MessageType::Disconnect => Payload::Disconnect(Disconnect {
                reason: DisconnectReason::try_from(r.u32()?)?,
                error_code: r.u32()?,
            }),
            MessageType::TitleTouch | MessageType::SystemTouch => Payload::Touch(Touch {
                touch_msg_timestamp: r.u32()?,
                touchpoints: r.prefixed_array_u16(|r| {
                    Ok(TouchPoint {
                        touchpoint_id: r.u32()?,
                        touchpoint_action: TouchAction::try_from(r.u16()?)?,
                        touchpoint_x: r.u32()?,
                        touchpoint_y: r.u32()?,
                    })
                })?,
            }),
            MessageType::Accelerometer => Payload::Accelerometer(Accelerometer {
                timestamp: r.u64()?,
                x: r.f32()?,
                y: r.f32()?,
                z: r.f32()?,
            }),
            MessageType::Gyrometer => Payload::Gyrometer(Gyrometer {
                timestamp: r.u64()?,
                x: r.f32()?,
                y: r.f32()?,
                z: r.f32()?,
            }),
            MessageType::Inclinometer => Payload::Inclinometer(Inclinometer {
                timestamp: r.u64()?,
                pitch: r.f32()?,
                roll: r.f32()?,
                yaw: r.f32()?,
            }),
            MessageType::Compass => Payload::Compass(Compass {
                timestamp: r.u64()?,
                magnetic_north: r.f32()?,
                true_north: r.f32()?,
            }),
            MessageType::Orientation => Payload::Orientation(Orientation {
                timestamp: r.u64()?,
                rotation_matrix_value: r.f32()?,
                w: r.f32()?,
                x: r.f32()?,
                y: r.f32()?,
                z: r.f32()?,
            }),
            MessageType::PairedIdentityStateChanged => {
                Payload::PairedIdentityStateChanged(PairedIdentityStateChanged {
                    state: PairedIdentityState::try_from(r.u16()?)?,
                })
            }
            MessageType::Unsnap => Payload::Unsnap(r.u8()?),
            MessageType::GameDvrRecord => Payload::GameDvrRecord(GameDvrRecord {
                start_time_delta: r.i32()?,
                end_time_delta: r.i32()?,
            }),
            MessageType::PowerOff => Payload::PowerOff(PowerOff { liveid: r.sgstring()? }),
            MessageType::MediaControllerRemoved => {
                Payload::MediaControllerRemoved(MediaControllerRemoved { title_id: r.u32()? })
            }
            MessageType::MediaCommandResult => Payload::MediaCommandResult(MediaCommandResult {
                request_id: r.u64()?,
                result: r.u32()?,
            }),
            MessageType::MediaCommand => {
                let request_id = r.u64()?;
                let title_id = r.u32()?;
                let command = MediaControlCommand::from_bits_truncate(r.u32()?);
                let seek_position = if command.contains(MediaControlCommand::SEEK) {
                    Some(r.u64()?)
                } else {
                    None
                };
                Payload::MediaCommand(MediaCommand {
                    request_id,
                    title_id,
                    command,
                    seek_position,
                })
            }
            MessageType::MediaState => Payload::MediaState(MediaState {
                title_id: r.u32()?,
                aum_id: r.sgstring()?,
                asset_id: r.sgstring()?,
                media_type: MediaType::try_from(r.u16()?)?,
                sound_level: SoundLevel::try_from(r.u16()?)?,
                enabled_commands: MediaControlCommand::from_bits_truncate(r.u32()?),
                playback_status: MediaPlaybackStatus::try_from(r.u16()?)?,
                rate: r.f32()?,
                position: r.u64()?,
                media_start: r.u64()?,
                media_end: r.u64()?,
                min_seek: r.u64()?,
                max_seek: r.u64()?,
                metadata: r.prefixed_array_u16(|r| {
                    Ok(MediaMetadataEntry {
                        name: r.sgstring()?,
                        value: r.sgstring()?,
                    })
                })?,
            }),
            MessageType::Gamepad => Payload::Gamepad(Gamepad {
                timestamp: r.u64()?,
                buttons: GamePadButton::from_bits_truncate(r.u16()?),
                left_trigger: r.f32()?,
                right_trigger: r.f32()?,
                left_thumbstick_x: r.f32()?,
                left_thumbstick_y: r.f32()?,
                right_thumbstick_x: r.f32()?,
                right_thumbstick_y: r.f32()?,
            }),
            MessageType::SystemTextAck => Payload::SystemTextAck(SystemTextAcknowledge {
                text_session_id: r.u32()?,
                text_version_ack: r.u32()?,
            }),
            MessageType::SystemTextDone => Payload::SystemTextDone(SystemTextDone {
                text_session_id: r.u32()?,
                text_version: r.u32()?,
                flags: r.u32()?,
                result: TextResult::try_from(r.u16()?)?,
            }),
            MessageType::SystemTextInput => {
                let text_session_id = r.u32()?;
                let base_version = r.u32()?;
                let submitted_version = r.u32()?;
                let total_text_byte_len = r.u32()?;
                let selection_start = r.i32()?;
                let selection_length = r.i32()?;
                let flags = r.u16()?;
                let text_chunk_byte_start = r.u32()?;
                let text_chunk = r.sgstring()?;
                let delta = if r.remaining() > 0 {
                    Some(r.prefixed_array_u16(|r| {
                        Ok(TextInputDelta {
                            offset: r.u32()?,
                            delete_count: r.u32()?,
                            insert_content: r.sgstring()?,
                        })
                    })?)
                } else {
                    None
                };
                Payload::SystemTextInput(SystemTextInput {
                    text_session_id,
                    base_version,
                    submitted_version,
                    total_text_byte_len,
                    selection_start,
                    selection_length,
                    flags,
                    text_chunk_byte_start,
                    text_chunk,
                    delta,
                })
            }
        };
        Ok(payload)
    }
}
