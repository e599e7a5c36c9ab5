//! `Title` — the per-title auxiliary video surface.
//!
//! Unlike the other service channels, `Title` is opened per-title after
//! the title itself requests it (via `StartChannelRequest` targeting the
//! title's own UUID), not eagerly at connect time. This manager tracks
//! the currently active surface and, once the console has handed over
//! connection details, the auxiliary-stream crypto/endpoint info those
//! details carry.

use smartglass_protocol::channel::service_uuid;
use smartglass_protocol::enums::ServiceChannel;
use smartglass_protocol::payloads::{ActiveSurfaceChange, AuxConnectionInfo, AuxiliaryStream, Payload, StartChannelRequest};

use crate::events::EventEmitter;

#[derive(Default)]
pub struct TitleManager {
    active_surface: Option<ActiveSurfaceChange>,
    connection_info: Option<AuxConnectionInfo>,

    pub on_surface_change: EventEmitter<ActiveSurfaceChange>,
    pub on_connection_info: EventEmitter<AuxConnectionInfo>,
}

impl TitleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an inbound message. Returns a reply payload the engine
    /// should send — specifically, the client's auxiliary-stream
    /// connection request that's re-issued until the console responds
    /// with actual connection info.
    pub fn handle_message(&mut self, payload: &Payload) -> Option<Payload> {
        match payload {
            Payload::AuxiliaryStream(stream) => match &stream.connection_info {
                None => {
                    tracing::debug!("console requesting auxiliary stream connection info");
                    Some(self.request_connection_info())
                }
                Some(info) => {
                    self.connection_info = Some(info.clone());
                    self.on_connection_info.emit(info);
                    None
                }
            },
            Payload::ActiveSurfaceChange(surface) => {
                self.active_surface = Some(surface.clone());
                self.on_surface_change.emit(surface);
                None
            }
            other => {
                tracing::warn!(?other, "unexpected message on Title channel");
                None
            }
        }
    }

    /// Build the `StartChannelRequest` that opens a title's own auxiliary
    /// channel. Unlike the five system channels, this one is opened lazily
    /// once a title asks for it rather than eagerly at connect time, so
    /// the request carries the title's id rather than `0`.
    pub fn start_title_channel(&self, channel_request_id: u32, title_id: u32) -> Payload {
        Payload::StartChannelRequest(StartChannelRequest {
            channel_request_id,
            title_id,
            service: service_uuid(ServiceChannel::Title),
            activity_id: 0,
        })
    }

    fn request_connection_info(&self) -> Payload {
        Payload::AuxiliaryStream(AuxiliaryStream { connection_info: None })
    }

    pub fn active_surface(&self) -> Option<&ActiveSurfaceChange> {
        self.active_surface.as_ref()
    }

    pub fn connection_info(&self) -> Option<&AuxConnectionInfo> {
        self.connection_info.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartglass_protocol::enums::ActiveSurfaceType;

    #[test]
    fn surface_change_is_cached_and_fired() {
        let mut mgr = TitleManager::new();
        let surface = ActiveSurfaceChange {
            surface_type: ActiveSurfaceType::Direct,
            server_tcp_port: 1,
            server_udp_port: 2,
            session_id: uuid::Uuid::nil(),
            render_width: 1920,
            render_height: 1080,
            master_session_key: vec![0; 16],
        };
        let reply = mgr.handle_message(&Payload::ActiveSurfaceChange(surface.clone()));
        assert!(reply.is_none());
        assert_eq!(mgr.active_surface(), Some(&surface));
    }

    #[test]
    fn start_title_channel_targets_the_title_service_uuid() {
        let mgr = TitleManager::new();
        match mgr.start_title_channel(3, 42) {
            Payload::StartChannelRequest(req) => {
                assert_eq!(req.channel_request_id, 3);
                assert_eq!(req.title_id, 42);
                assert_eq!(req.service, smartglass_protocol::channel::service_uuid(smartglass_protocol::enums::ServiceChannel::Title));
            }
            other => panic!("expected StartChannelRequest, got {other:?}"),
        }
    }

    #[test]
    fn connection_info_request_re_sent_until_console_replies() {
        let mut mgr = TitleManager::new();
        let reply = mgr.handle_message(&Payload::AuxiliaryStream(AuxiliaryStream { connection_info: None }));
        assert!(matches!(reply, Some(Payload::AuxiliaryStream(AuxiliaryStream { connection_info: None }))));
        assert!(mgr.connection_info().is_none());

        let info = AuxConnectionInfo {
            crypto_key: vec![1, 2, 3],
            server_iv: vec![4, 5, 6],
            client_iv: vec![7, 8, 9],
            sign_hash: vec![0],
            endpoints: Vec::new(),
        };
        let reply = mgr.handle_message(&Payload::AuxiliaryStream(AuxiliaryStream { connection_info: Some(info.clone()) }));
        assert!(reply.is_none());
        assert_eq!(mgr.connection_info(), Some(&info));
    }
}
