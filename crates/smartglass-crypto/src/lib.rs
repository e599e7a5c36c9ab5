//! # smartglass-crypto
//!
//! Cryptographic primitives for the SmartGlass session protocol.
//!
//! Console and client negotiate a shared secret via ECDH over one of three
//! NIST curves (selected by the console's certificate public key), derive
//! an AES-128-CBC key, an IV-derivation key, and an HMAC-SHA-256 key from
//! it, then authenticate-then-encrypt every `Message` packet. No algorithm
//! negotiation happens beyond picking the curve that matches the console's
//! key length.
//!
//! ## Modules
//!
//! - [`ecdh`] — ECDH key agreement across P-256/P-384/P-521 plus the
//!   SHA-512 key-derivation function
//! - [`cipher`] — AES-128-CBC encryption/decryption and HMAC-SHA-256
//! - [`padding`] — PKCS#7 and ANSI X.923 block padding

pub mod cipher;
pub mod ecdh;
pub mod padding;

/// Error types for cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// The foreign public key's length doesn't match any known curve.
    #[error("invalid public key length: {0}")]
    InvalidKeyLength(usize),

    /// The foreign public key's bytes don't decode to a valid curve point.
    #[error("invalid public key encoding")]
    InvalidKeyEncoding,

    /// A shared secret supplied directly wasn't 64 bytes long.
    #[error("invalid shared secret length: expected 64, got {0}")]
    InvalidSharedSecretLength(usize),

    /// HMAC verification failed.
    #[error("HMAC verification failed")]
    HmacMismatch,

    /// Ciphertext length wasn't a multiple of the AES block size.
    #[error("ciphertext not block-aligned: {0} bytes")]
    NotBlockAligned(usize),

    /// Padding was malformed (pad count out of range, or zero-length input).
    #[error("invalid padding")]
    InvalidPadding,
}

pub type Result<T> = std::result::Result<T, CryptoError>;
