//! # smartglass-session
//!
//! The session state machine sitting on top of `smartglass-protocol`:
//! discovery, the connect handshake, heartbeat-driven liveness, the
//! ack-waiting retry loop, and the five service-channel managers
//! (Input, Media, Text, Stump, Title).
//!
//! ## Modules
//!
//! - [`ackwaiter`] — futures keyed by sequence number or correlation id
//! - [`config`] — timeouts, retry counts, and addresses `SessionEngine` uses
//! - [`events`] — the session's broadcast event bus
//! - [`console`] — the discovered/connected console record
//! - [`engine`] — `SessionEngine`, the UDP-driven state machine
//! - [`managers`] — per-service-channel high-level operations

pub mod ackwaiter;
pub mod config;
pub mod console;
pub mod engine;
pub mod events;
pub mod managers;

/// Errors surfaced by the session layer.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Protocol(#[from] smartglass_protocol::ProtocolError),

    #[error(transparent)]
    Codec(#[from] smartglass_protocol::CodecError),

    #[error(transparent)]
    Fragment(#[from] smartglass_protocol::FragmentError),

    #[error(transparent)]
    Manager(#[from] ManagerError),

    #[error(transparent)]
    Crypto(#[from] smartglass_crypto::CryptoError),

    #[error("network error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("cancelled waiting for {0}")]
    Cancelled(String),

    #[error("not connected to a console")]
    NotConnected,

    #[error("anonymous connect refused: console requires authentication")]
    AnonymousConnectRefused,

    #[error("no console discovered at {0}")]
    NoSuchConsole(String),

    #[error("channel not open: {0:?}")]
    ChannelNotOpen(smartglass_protocol::enums::ServiceChannel),

    #[error("console rejected the request: {0:?}")]
    Rejected(smartglass_protocol::enums::SGResultCode),

    #[error("connect handshake failed: {0:?}")]
    ConnectFailed(smartglass_protocol::enums::ConnectionResult),

    #[error("already connected to a console")]
    AlreadyConnected,
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors raised by individual service-channel managers (Input, Media,
/// Text, Stump, Title) distinct from session/engine-level conditions.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("no active text session to respond to")]
    NoActiveTextSession,

    #[error("unexpected message received on {channel:?} channel")]
    UnexpectedMessageOnChannel { channel: smartglass_protocol::enums::ServiceChannel },
}
