//! # smartglass-aux
//!
//! The auxiliary-stream relay: a title can ask the console to open a
//! side TCP channel (game streaming, companion telemetry, whatever the
//! title wants), and the console hands back an endpoint plus its own
//! AES-128-CBC/HMAC-SHA-256 key material over the main session. This
//! crate speaks that side channel's wire format — distinct framing and
//! a distinct key schedule from the UDP session in `smartglass-protocol`
//! — and bridges it to a local TCP listener so a caller on this host can
//! just connect to a local port and see plaintext.
//!
//! ## Modules
//!
//! - [`codec`] — the `{magic, payload_size, ciphertext, hmac}` frame
//!   format and the two independent CBC chains (client→server,
//!   server→client).
//! - [`relay`] — the bidirectional TCP bridge between a local listener
//!   and the console's advertised endpoint.

pub mod codec;
pub mod relay;

/// Error types for the auxiliary-stream relay.
#[derive(Debug, thiserror::Error)]
pub enum AuxError {
    #[error("frame too short: needed at least {needed} bytes, got {got}")]
    ShortFrame { needed: usize, got: usize },

    #[error("invalid frame magic: {0:#06x}")]
    InvalidMagic(u16),

    #[error("HMAC verification failed")]
    HmacMismatch,

    #[error("crypto error: {0}")]
    Crypto(#[from] smartglass_crypto::CryptoError),

    #[error("payload_size {declared} exceeds decrypted length {actual}")]
    PayloadSizeOutOfRange { declared: usize, actual: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AuxError>;
