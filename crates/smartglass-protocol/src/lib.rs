//! # smartglass-protocol
//!
//! Wire codec and session bookkeeping for the SmartGlass UDP protocol:
//! the unprotected discovery/connect packets, the protected `Message`
//! envelope and its ~40 typed sub-payloads, sequence/ack tracking,
//! fragment reassembly, and the dynamic service-channel registry.
//!
//! ## Modules
//!
//! - [`enums`] — every protocol enum and flag bitmask
//! - [`binio`] — big-endian primitive, `SGString`, and UUID wire helpers
//! - [`certificate`] — console certificate parsing (Live ID, public key)
//! - [`simple`] — unprotected packets (discovery, power-on, connect)
//! - [`message`] — the protected `Message` header, fragment header, and
//!   dispatch over [`payloads`]
//! - [`payloads`] — every `Message` sub-payload's wire layout
//! - [`sequence`] — outbound sequence counter and inbound ack bookkeeping
//! - [`fragment`] — binary and JSON fragment reassembly
//! - [`channel`] — service-channel id registry

pub mod binio;
pub mod certificate;
pub mod channel;
pub mod enums;
pub mod fragment;
pub mod message;
pub mod payloads;
pub mod sequence;
pub mod simple;

/// Low-level wire-format errors: malformed bytes, unrecognized
/// discriminants, truncated reads. Never tears down a session — callers
/// log and drop the offending packet.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("unexpected end of input, needed {needed} more byte(s)")]
    Truncated { needed: usize },

    #[error("string field not NUL-terminated")]
    StringNotTerminated,

    #[error("string field is not valid UTF-8")]
    InvalidUtf8,

    #[error("unknown packet type: {0:#06x}")]
    UnknownPacketType(u16),

    #[error("unknown message type: {0:#06x}")]
    UnknownMessageType(u16),

    #[error("unknown {type_name} value: {value:#x}")]
    UnknownEnumValue { type_name: &'static str, value: u32 },

    #[error("trailing bytes after decoding a fixed-size payload: {0}")]
    TrailingBytes(usize),

    #[error(transparent)]
    Crypto(#[from] smartglass_crypto::CryptoError),
}

pub type CodecResult<T> = std::result::Result<T, CodecError>;

/// Fragment reassembly and connect-auth fragmentation errors.
#[derive(Debug, thiserror::Error)]
pub enum FragmentError {
    #[error("fragment sequence range invalid: begin {begin} > end {end}")]
    InvalidFragmentRange { begin: u32, end: u32 },

    #[error("invalid base64 in json fragment: {0}")]
    InvalidBase64(String),

    #[error("json fragment serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("authentication data too small to fragment")]
    AuthTooSmallToFragment,

    #[error("unknown fragmented message type: {0:#06x}")]
    UnknownFragmentedMessageType(u16),
}

pub type FragmentResult<T> = std::result::Result<T, FragmentError>;

/// Error types for wire encoding/decoding and session bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Fragment(#[from] FragmentError),

    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
