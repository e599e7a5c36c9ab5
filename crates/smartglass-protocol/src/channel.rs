//! Logical service-channel registry.
//!
//! `Core` and `Ack` are always open on fixed channel ids. Every other
//! service — input, media, text, broadcast, title — is opened on demand
//! by sending a `StartChannelRequest` and is only usable once the peer's
//! matching `StartChannelResponse` reports `SGResultCode::Success`.

use std::collections::HashMap;

use uuid::{uuid, Uuid};

use crate::enums::{ServiceChannel, SGResultCode};
use crate::message::{CHANNEL_ACK, CHANNEL_CORE};

pub const SERVICE_UUID_SYSTEM_INPUT: Uuid = uuid!("fa20b8ca-66fb-46e0-adb6-0b978a59d35f");
pub const SERVICE_UUID_SYSTEM_INPUT_TV_REMOTE: Uuid = uuid!("d451e3b3-60bb-4c71-b3db-f994b1aca3a7");
pub const SERVICE_UUID_SYSTEM_MEDIA: Uuid = uuid!("48a9ca24-eb6d-4e12-8c43-d57469edd3cd");
pub const SERVICE_UUID_SYSTEM_TEXT: Uuid = uuid!("7af3e6a2-488b-40cb-a931-79c04b7da3a0");
pub const SERVICE_UUID_SYSTEM_BROADCAST: Uuid = uuid!("b6a117d8-f5e2-45d7-862e-8fd8e3156476");
pub const SERVICE_UUID_TITLE: Uuid = Uuid::nil();

/// Map a logical service to the UUID carried in its `StartChannelRequest`.
pub fn service_uuid(service: ServiceChannel) -> Uuid {
    match service {
        ServiceChannel::Core => Uuid::nil(),
        ServiceChannel::Ack => Uuid::nil(),
        ServiceChannel::SystemInput => SERVICE_UUID_SYSTEM_INPUT,
        ServiceChannel::SystemInputTVRemote => SERVICE_UUID_SYSTEM_INPUT_TV_REMOTE,
        ServiceChannel::SystemMedia => SERVICE_UUID_SYSTEM_MEDIA,
        ServiceChannel::SystemText => SERVICE_UUID_SYSTEM_TEXT,
        ServiceChannel::SystemBroadcast => SERVICE_UUID_SYSTEM_BROADCAST,
        ServiceChannel::Title => SERVICE_UUID_TITLE,
    }
}

/// Tracks fixed and dynamically-opened channel ids.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    open: HashMap<ServiceChannel, u64>,
    pending: HashMap<ServiceChannel, u32>,
    next_request_id: u32,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        let mut open = HashMap::new();
        open.insert(ServiceChannel::Core, CHANNEL_CORE);
        open.insert(ServiceChannel::Ack, CHANNEL_ACK);
        Self {
            open,
            pending: HashMap::new(),
            next_request_id: 1,
        }
    }

    pub fn channel_id(&self, service: ServiceChannel) -> Option<u64> {
        self.open.get(&service).copied()
    }

    /// Reverse lookup: which service, if any, is currently bound to
    /// `channel_id`. Used to demultiplex inbound traffic by its wire
    /// channel id.
    pub fn service_for_channel(&self, channel_id: u64) -> Option<ServiceChannel> {
        self.open
            .iter()
            .find(|(_, &id)| id == channel_id)
            .map(|(&service, _)| service)
    }

    /// Begin opening `service`, returning the `request_id` to stamp on the
    /// outbound `StartChannelRequest`. A prior pending request for the
    /// same service is overwritten so retries never leak an entry.
    pub fn begin_open(&mut self, service: ServiceChannel) -> u32 {
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        self.pending.insert(service, request_id);
        request_id
    }

    /// Apply a `StartChannelResponse`. Returns the service this response
    /// completes, if its `request_id` matches a still-pending request.
    pub fn complete_open(
        &mut self,
        request_id: u32,
        target_channel_id: u64,
        result: SGResultCode,
    ) -> Option<ServiceChannel> {
        let service = self
            .pending
            .iter()
            .find(|(_, &pending_id)| pending_id == request_id)
            .map(|(&service, _)| service)?;

        self.pending.remove(&service);
        if result == SGResultCode::Success {
            self.open.insert(service, target_channel_id);
        }
        Some(service)
    }

    pub fn close(&mut self, service: ServiceChannel) {
        self.open.remove(&service);
    }

    pub fn is_open(&self, service: ServiceChannel) -> bool {
        self.open.contains_key(&service)
    }

    /// Erase all dynamically-opened channels and pending requests, leaving
    /// only `Core` and `Ack`.
    pub fn reset(&mut self) {
        self.open.clear();
        self.open.insert(ServiceChannel::Core, CHANNEL_CORE);
        self.open.insert(ServiceChannel::Ack, CHANNEL_ACK);
        self.pending.clear();
        self.next_request_id = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_and_ack_are_always_open() {
        let reg = ChannelRegistry::new();
        assert_eq!(reg.channel_id(ServiceChannel::Core), Some(CHANNEL_CORE));
        assert_eq!(reg.channel_id(ServiceChannel::Ack), Some(CHANNEL_ACK));
    }

    #[test]
    fn dynamic_channel_opens_on_matching_response() {
        let mut reg = ChannelRegistry::new();
        let req_id = reg.begin_open(ServiceChannel::SystemMedia);
        assert!(!reg.is_open(ServiceChannel::SystemMedia));

        let service = reg.complete_open(req_id, 0x42, SGResultCode::Success);
        assert_eq!(service, Some(ServiceChannel::SystemMedia));
        assert_eq!(reg.channel_id(ServiceChannel::SystemMedia), Some(0x42));
    }

    #[test]
    fn failed_open_leaves_channel_closed() {
        let mut reg = ChannelRegistry::new();
        let req_id = reg.begin_open(ServiceChannel::SystemText);
        reg.complete_open(req_id, 0, SGResultCode::ChannelFailedToStart);
        assert!(!reg.is_open(ServiceChannel::SystemText));
    }

    #[test]
    fn retry_overwrites_prior_pending_request() {
        let mut reg = ChannelRegistry::new();
        let first = reg.begin_open(ServiceChannel::SystemInput);
        let second = reg.begin_open(ServiceChannel::SystemInput);
        assert_ne!(first, second);
        // the stale first request_id no longer matches anything pending
        assert_eq!(reg.complete_open(first, 1, SGResultCode::Success), None);
        assert_eq!(
            reg.complete_open(second, 1, SGResultCode::Success),
            Some(ServiceChannel::SystemInput)
        );
    }

    #[test]
    fn service_for_channel_reverses_channel_id() {
        let mut reg = ChannelRegistry::new();
        assert_eq!(reg.service_for_channel(CHANNEL_CORE), Some(ServiceChannel::Core));
        assert_eq!(reg.service_for_channel(0x42), None);

        let req_id = reg.begin_open(ServiceChannel::SystemMedia);
        reg.complete_open(req_id, 0x42, SGResultCode::Success);
        assert_eq!(reg.service_for_channel(0x42), Some(ServiceChannel::SystemMedia));
    }

    #[test]
    fn reset_keeps_only_core_and_ack() {
        let mut reg = ChannelRegistry::new();
        let req_id = reg.begin_open(ServiceChannel::SystemMedia);
        reg.complete_open(req_id, 0x42, SGResultCode::Success);
        assert!(reg.is_open(ServiceChannel::SystemMedia));

        let pending_req = reg.begin_open(ServiceChannel::SystemText);
        reg.reset();

        assert!(!reg.is_open(ServiceChannel::SystemMedia));
        assert!(!reg.is_open(ServiceChannel::SystemText));
        assert_eq!(reg.channel_id(ServiceChannel::Core), Some(CHANNEL_CORE));
        assert_eq!(reg.channel_id(ServiceChannel::Ack), Some(CHANNEL_ACK));
        // stale pending request from before reset no longer resolves
        assert_eq!(reg.complete_open(pending_req, 1, SGResultCode::Success), None);
    }
}
