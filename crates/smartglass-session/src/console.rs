//! The discovered/connected console record.
//!
//! `Console` is a passive record of what we know about one box: its
//! address, its identity, and the handful of state fields (device
//! status, connection state, pairing state, console status, active
//! surface) that change as messages arrive. It owns no socket and sends
//! nothing itself — [`crate::engine::SessionEngine`] drives the wire and
//! calls the setters below as inbound messages land, each of which
//! fires the matching [`crate::events::EventEmitter`] after assigning.

use std::sync::Arc;

use smartglass_crypto::ecdh::Context as CryptoContext;
use smartglass_protocol::certificate::ConsoleCertificate;
use smartglass_protocol::enums::{
    ConnectionState, DeviceStatus, PairedIdentityState, PrimaryDeviceFlag,
};
use smartglass_protocol::payloads::{ActiveSurfaceChange, ConsoleStatus};
use smartglass_protocol::simple::DiscoveryResponse;

use crate::events::EventEmitter;

/// Minimal, serializable record of a console, suitable for caching a
/// discovery result to disk between runs.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DiscoveredConsole {
    pub address: String,
    pub name: String,
    pub uuid: uuid::Uuid,
    pub liveid: String,
}

/// A console we've discovered or are connected to.
///
/// Most fields are plain and mutable; the five that matter to callers
/// watching for state transitions (`device_status`, `connection_state`,
/// `pairing_state`, `console_status`, `active_surface`) are kept private
/// behind getter/setter pairs so every change also fires its event.
pub struct Console {
    pub address: String,
    pub name: String,
    pub uuid: uuid::Uuid,
    pub liveid: String,
    pub flags: PrimaryDeviceFlag,
    pub last_error: u32,

    /// Set once a public key has been supplied, either via discovery or
    /// manual construction. Holds the ECDH context used for the connect
    /// handshake and all subsequent `Message` encryption. Shared (not
    /// cloned) with the engine's receive path, which needs its own handle
    /// to the same keys without taking the state lock that guards the
    /// rest of this struct.
    pub crypto: Option<Arc<CryptoContext>>,

    device_status: DeviceStatus,
    connection_state: ConnectionState,
    pairing_state: PairedIdentityState,
    console_status: Option<ConsoleStatus>,
    active_surface: Option<ActiveSurfaceChange>,

    pub on_device_status: EventEmitter<DeviceStatus>,
    pub on_connection_state: EventEmitter<ConnectionState>,
    pub on_pairing_state: EventEmitter<PairedIdentityState>,
    pub on_console_status: EventEmitter<Option<ConsoleStatus>>,
    pub on_active_surface: EventEmitter<Option<ActiveSurfaceChange>>,
    pub on_timeout: EventEmitter<()>,
}

impl Console {
    pub fn new(
        address: impl Into<String>,
        name: impl Into<String>,
        uuid: uuid::Uuid,
        liveid: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
            uuid,
            liveid: liveid.into(),
            flags: PrimaryDeviceFlag::empty(),
            last_error: 0,
            crypto: None,
            device_status: DeviceStatus::Unavailable,
            connection_state: ConnectionState::Disconnected,
            pairing_state: PairedIdentityState::NotPaired,
            console_status: None,
            active_surface: None,
            on_device_status: EventEmitter::new(),
            on_connection_state: EventEmitter::new(),
            on_pairing_state: EventEmitter::new(),
            on_console_status: EventEmitter::new(),
            on_active_surface: EventEmitter::new(),
            on_timeout: EventEmitter::new(),
        }
    }

    /// Build a `Console` from a `DiscoveryResponse` and the address it
    /// arrived from, parsing the console's certificate for its Live ID
    /// and public key and immediately marking it `Available`.
    pub fn from_discovery(
        address: impl Into<String>,
        response: &DiscoveryResponse,
    ) -> smartglass_protocol::Result<Self> {
        let cert = ConsoleCertificate::parse(&response.certificate_der)?;
        let crypto = CryptoContext::from_foreign_bytes(&cert.public_key)?;

        let mut console = Self::new(address, response.name.clone(), response.uuid, cert.live_id);
        console.flags = response.flags;
        console.last_error = response.last_error;
        console.crypto = Some(Arc::new(crypto));
        console.device_status = DeviceStatus::Available;
        Ok(console)
    }

    pub fn to_discovered(&self) -> DiscoveredConsole {
        DiscoveredConsole {
            address: self.address.clone(),
            name: self.name.clone(),
            uuid: self.uuid,
            liveid: self.liveid.clone(),
        }
    }

    pub fn from_discovered(d: &DiscoveredConsole) -> Self {
        Self::new(d.address.clone(), d.name.clone(), d.uuid, d.liveid.clone())
    }

    pub fn device_status(&self) -> DeviceStatus {
        self.device_status
    }

    pub fn set_device_status(&mut self, status: DeviceStatus) {
        self.device_status = status;
        self.on_device_status.emit(&status);
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    pub fn set_connection_state(&mut self, state: ConnectionState) {
        self.connection_state = state;
        self.on_connection_state.emit(&state);
    }

    pub fn pairing_state(&self) -> PairedIdentityState {
        self.pairing_state
    }

    pub fn set_pairing_state(&mut self, state: PairedIdentityState) {
        self.pairing_state = state;
        self.on_pairing_state.emit(&state);
    }

    pub fn console_status(&self) -> Option<&ConsoleStatus> {
        self.console_status.as_ref()
    }

    pub fn set_console_status(&mut self, status: Option<ConsoleStatus>) {
        self.console_status = status.clone();
        self.on_console_status.emit(&status);
    }

    pub fn active_surface(&self) -> Option<&ActiveSurfaceChange> {
        self.active_surface.as_ref()
    }

    pub fn set_active_surface(&mut self, surface: Option<ActiveSurfaceChange>) {
        self.active_surface = surface.clone();
        self.on_active_surface.emit(&surface);
    }

    /// Reset connection-, pairing-state, active surface, and console
    /// status back to their disconnected defaults. Device status is
    /// untouched — callers that also need `Unavailable` (power-off, a
    /// timeout) set it explicitly afterwards.
    pub fn reset_state(&mut self) {
        self.set_connection_state(ConnectionState::Disconnected);
        self.set_pairing_state(PairedIdentityState::NotPaired);
        self.set_active_surface(None);
        self.set_console_status(None);
    }

    pub fn available(&self) -> bool {
        self.device_status == DeviceStatus::Available
    }

    pub fn paired(&self) -> bool {
        self.pairing_state == PairedIdentityState::Paired
    }

    pub fn connected(&self) -> bool {
        self.connection_state == ConnectionState::Connected
    }

    pub fn authenticated_users_allowed(&self) -> bool {
        self.flags.contains(PrimaryDeviceFlag::ALLOW_AUTHENTICATED_USERS)
    }

    pub fn console_users_allowed(&self) -> bool {
        self.flags.contains(PrimaryDeviceFlag::ALLOW_CONSOLE_USERS)
    }

    pub fn anonymous_connection_allowed(&self) -> bool {
        self.flags.contains(PrimaryDeviceFlag::ALLOW_ANONYMOUS_USERS)
    }

    pub fn is_certificate_pending(&self) -> bool {
        self.flags.contains(PrimaryDeviceFlag::CERTIFICATE_PENDING)
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("address", &self.address)
            .field("name", &self.name)
            .field("uuid", &self.uuid)
            .field("liveid", &self.liveid)
            .field("flags", &self.flags)
            .field("last_error", &self.last_error)
            .field("device_status", &self.device_status)
            .field("connection_state", &self.connection_state)
            .field("pairing_state", &self.pairing_state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_console() -> Console {
        Console::new("10.0.0.5", "Test Console", uuid::Uuid::nil(), "deadbeef")
    }

    #[test]
    fn fresh_console_is_unavailable_and_disconnected() {
        let c = test_console();
        assert!(!c.available());
        assert!(!c.paired());
        assert!(!c.connected());
    }

    #[test]
    fn setters_fire_events() {
        let mut c = test_console();
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let s = seen.clone();
        c.on_connection_state.subscribe(move |state| {
            s.lock().unwrap().push(*state);
        });

        c.set_connection_state(ConnectionState::Connecting);
        c.set_connection_state(ConnectionState::Connected);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![ConnectionState::Connecting, ConnectionState::Connected]
        );
        assert!(c.connected());
    }

    #[test]
    fn flags_derive_booleans_independently_of_state() {
        let mut c = test_console();
        c.flags = PrimaryDeviceFlag::ALLOW_ANONYMOUS_USERS | PrimaryDeviceFlag::CERTIFICATE_PENDING;
        assert!(c.anonymous_connection_allowed());
        assert!(c.is_certificate_pending());
        assert!(!c.console_users_allowed());
        assert!(!c.authenticated_users_allowed());
    }

    #[test]
    fn reset_state_clears_everything_but_device_status() {
        let mut c = test_console();
        c.set_device_status(DeviceStatus::Available);
        c.set_connection_state(ConnectionState::Connected);
        c.set_pairing_state(PairedIdentityState::Paired);

        c.reset_state();

        assert_eq!(c.connection_state(), ConnectionState::Disconnected);
        assert_eq!(c.pairing_state(), PairedIdentityState::NotPaired);
        assert!(c.active_surface().is_none());
        assert!(c.console_status().is_none());
        assert!(c.available());
    }

    #[test]
    fn discovered_round_trips_through_the_persistence_record() {
        let c = test_console();
        let d = c.to_discovered();
        let restored = Console::from_discovered(&d);
        assert_eq!(restored.address, c.address);
        assert_eq!(restored.liveid, c.liveid);
        assert_eq!(restored.uuid, c.uuid);
    }
}
