//! ECDH key agreement (P-256/P-384/P-521) and the shared-secret KDF.
//!
//! On discovery, the console returns a certificate holding its public key.
//! The curve is selected from the length of that key; client and console
//! then run ECDH over it, salt the raw shared secret, hash it with
//! SHA-512, and split the 64-byte digest into an encryption key, an IV
//! key, and a hashing key.

use elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256, Sha512};
use zeroize::Zeroize;

use crate::{CryptoError, Result};

/// Salt prepended to the raw ECDH shared secret before hashing.
const KDF_SALT_PREPEND: [u8; 8] = [0xD6, 0x37, 0xF1, 0xAA, 0xE2, 0xF0, 0x41, 0x8C];
/// Salt appended to the raw ECDH shared secret before hashing.
const KDF_SALT_APPEND: [u8; 8] = [0xA8, 0xF8, 0x1A, 0x57, 0x4E, 0x22, 0x8A, 0xB7];

/// Dummy foreign public key used to bootstrap a [`Context`] from an
/// already-known shared secret (e.g. a captured test vector), matching the
/// `from_shared_secret` escape hatch in the console's own session layer.
const DUMMY_P256_POINT: [u8; 65] = [
    0x04, 0x1d, 0xb1, 0xe7, 0x94, 0x38, 0x78, 0xb2, 0x8c, 0x77, 0x32, 0x28, 0xeb, 0xdc, 0xfb, 0x05,
    0xb9, 0x85, 0xbe, 0x4a, 0x38, 0x6a, 0x55, 0xf5, 0x00, 0x66, 0x23, 0x13, 0x60, 0x78, 0x5f, 0x61,
    0xb6, 0x00, 0x38, 0xca, 0xf1, 0x82, 0xd7, 0x12, 0xd8, 0x6c, 0x8a, 0x28, 0xa0, 0xe7, 0x27, 0x33,
    0xa0, 0x39, 0x1b, 0x11, 0x69, 0xef, 0x29, 0x05, 0xe4, 0xe2, 0x15, 0x55, 0xb4, 0x32, 0xb2, 0x62,
    0xd0,
];

/// Which curve a [`Context`] was negotiated over, keyed by the console's
/// advertised public key type (`ConnectRequest.public_key_type`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublicKeyType {
    EcDhP256 = 0x00,
    EcDhP384 = 0x01,
    EcDhP521 = 0x02,
}

impl PublicKeyType {
    /// Infer the curve from the length of a SEC1-encoded public key that
    /// includes its leading point-type byte (0x41/0x61/0x85), as found in
    /// the console's discovery-response certificate.
    pub fn from_encoded_len(len: usize) -> Result<Self> {
        match len {
            0x41 => Ok(Self::EcDhP256),
            0x61 => Ok(Self::EcDhP384),
            0x85 => Ok(Self::EcDhP521),
            other => Err(CryptoError::InvalidKeyLength(other)),
        }
    }

    /// Length, in bytes, of the raw (tag-stripped) public key body as
    /// carried in `ConnectRequest.public_key`.
    pub fn body_len(self) -> usize {
        match self {
            Self::EcDhP256 => 0x40,
            Self::EcDhP384 => 0x60,
            Self::EcDhP521 => 0x84,
        }
    }
}

/// Derived key material plus the negotiated keypair for one session.
pub struct Context {
    pubkey_type: PublicKeyType,
    /// Raw (tag-stripped) bytes of our own ephemeral public key, sent to
    /// the console in `ConnectRequest`.
    pubkey_bytes: Vec<u8>,
    encrypt_key: [u8; 16],
    iv_key: [u8; 16],
    hash_key: [u8; 32],
}

impl Drop for Context {
    fn drop(&mut self) {
        self.encrypt_key.zeroize();
        self.iv_key.zeroize();
        self.hash_key.zeroize();
    }
}

fn kdf(raw_secret: &[u8]) -> [u8; 64] {
    let mut salted = Vec::with_capacity(KDF_SALT_PREPEND.len() + raw_secret.len() + KDF_SALT_APPEND.len());
    salted.extend_from_slice(&KDF_SALT_PREPEND);
    salted.extend_from_slice(raw_secret);
    salted.extend_from_slice(&KDF_SALT_APPEND);
    let digest = Sha512::digest(&salted);
    let mut out = [0u8; 64];
    out.copy_from_slice(&digest);
    out
}

macro_rules! ecdh_impl {
    ($module:ident) => {{
        let secret = $module::ecdh::EphemeralSecret::random(&mut OsRng);
        let our_public = secret.public_key();
        let encoded = our_public.to_encoded_point(false);
        let pubkey_bytes = encoded.as_bytes()[1..].to_vec();

        let foreign_point =
            $module::EncodedPoint::from_bytes(foreign_public_key).map_err(|_| CryptoError::InvalidKeyEncoding)?;
        let foreign_public = Option::<$module::PublicKey>::from($module::PublicKey::from_encoded_point(&foreign_point))
            .ok_or(CryptoError::InvalidKeyEncoding)?;

        let shared = secret.diffie_hellman(&foreign_public);
        (pubkey_bytes, shared.raw_secret_bytes().to_vec())
    }};
}

impl Context {
    /// Negotiate a fresh ECDH keypair against the console's public key and
    /// derive session key material from it.
    ///
    /// `foreign_public_key` must be the raw SEC1-encoded point (including
    /// the leading `0x04` tag byte), as extracted from the console's
    /// certificate.
    pub fn new(foreign_public_key: &[u8], pubkey_type: PublicKeyType) -> Result<Self> {
        let (pubkey_bytes, raw_secret) = match pubkey_type {
            PublicKeyType::EcDhP256 => ecdh_impl!(p256),
            PublicKeyType::EcDhP384 => ecdh_impl!(p384),
            PublicKeyType::EcDhP521 => ecdh_impl!(p521),
        };
        Ok(Self::from_raw_secret(&raw_secret, pubkey_bytes, pubkey_type))
    }

    /// Convenience constructor that infers the curve from the foreign
    /// key's length (including its leading tag byte).
    pub fn from_foreign_bytes(foreign_public_key: &[u8]) -> Result<Self> {
        let pubkey_type = PublicKeyType::from_encoded_len(foreign_public_key.len())?;
        Self::new(foreign_public_key, pubkey_type)
    }

    /// Build a context directly from an already-expanded 64-byte shared
    /// secret (e.g. replaying a captured session). The own-keypair fields
    /// are populated from a fixed dummy P-256 point since they're never
    /// used again once the secret is fixed.
    pub fn from_shared_secret(shared_secret: &[u8]) -> Result<Self> {
        if shared_secret.len() != 64 {
            return Err(CryptoError::InvalidSharedSecretLength(shared_secret.len()));
        }
        let mut ctx = Self::new(&DUMMY_P256_POINT, PublicKeyType::EcDhP256)?;
        ctx.encrypt_key.copy_from_slice(&shared_secret[0..16]);
        ctx.iv_key.copy_from_slice(&shared_secret[16..32]);
        ctx.hash_key.copy_from_slice(&shared_secret[32..64]);
        Ok(ctx)
    }

    fn from_raw_secret(raw_secret: &[u8], pubkey_bytes: Vec<u8>, pubkey_type: PublicKeyType) -> Self {
        let expanded = kdf(raw_secret);
        let mut encrypt_key = [0u8; 16];
        let mut iv_key = [0u8; 16];
        let mut hash_key = [0u8; 32];
        encrypt_key.copy_from_slice(&expanded[0..16]);
        iv_key.copy_from_slice(&expanded[16..32]);
        hash_key.copy_from_slice(&expanded[32..64]);
        Self {
            pubkey_type,
            pubkey_bytes,
            encrypt_key,
            iv_key,
            hash_key,
        }
    }

    pub fn pubkey_type(&self) -> PublicKeyType {
        self.pubkey_type
    }

    /// Our own public key bytes (tag-stripped), for `ConnectRequest.public_key`.
    pub fn pubkey_bytes(&self) -> &[u8] {
        &self.pubkey_bytes
    }

    pub fn encrypt_key(&self) -> &[u8; 16] {
        &self.encrypt_key
    }

    pub fn iv_key(&self) -> &[u8; 16] {
        &self.iv_key
    }

    pub fn hash_key(&self) -> &[u8; 32] {
        &self.hash_key
    }

    /// Derive an IV from a 16-byte seed by "encrypting" it with the IV key
    /// under AES-ECB (a single-block CBC pass with a zero IV). When no
    /// seed is given, a fresh random IV is returned instead.
    pub fn generate_iv(&self, seed: Option<&[u8; 16]>) -> [u8; 16] {
        match seed {
            Some(seed) => crate::cipher::ecb_encrypt_block(&self.iv_key, seed),
            None => {
                use rand::RngCore;
                let mut iv = [0u8; 16];
                OsRng.fill_bytes(&mut iv);
                iv
            }
        }
    }

    /// Compute the HMAC-SHA-256 authentication tag over `data`.
    pub fn hash(&self, data: &[u8]) -> [u8; 32] {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.hash_key).expect("HMAC accepts any key length");
        mac.update(data);
        let result = mac.finalize().into_bytes();
        let mut out = [0u8; 32];
        out.copy_from_slice(&result);
        out
    }

    /// Verify `data` against a previously computed HMAC-SHA-256 tag.
    pub fn verify(&self, data: &[u8], tag: &[u8]) -> bool {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.hash_key).expect("HMAC accepts any key length");
        mac.update(data);
        mac.verify_slice(tag).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pubkey_type_from_encoded_len() {
        assert_eq!(PublicKeyType::from_encoded_len(0x41).unwrap(), PublicKeyType::EcDhP256);
        assert_eq!(PublicKeyType::from_encoded_len(0x61).unwrap(), PublicKeyType::EcDhP384);
        assert_eq!(PublicKeyType::from_encoded_len(0x85).unwrap(), PublicKeyType::EcDhP521);
        assert!(PublicKeyType::from_encoded_len(0x20).is_err());
    }

    #[test]
    fn ecdh_agreement_both_sides_match() {
        let console_secret = p256::ecdh::EphemeralSecret::random(&mut OsRng);
        let console_public = console_secret.public_key();
        let console_encoded = console_public.to_encoded_point(false);

        let client_ctx = Context::new(console_encoded.as_bytes(), PublicKeyType::EcDhP256).unwrap();

        let client_point = p256::EncodedPoint::from_bytes(
            &[&[0x04][..], client_ctx.pubkey_bytes()].concat(),
        )
        .unwrap();
        let client_public = p256::PublicKey::from_encoded_point(&client_point).unwrap();
        let console_shared = console_secret.diffie_hellman(&client_public);

        let console_ctx = Context::from_raw_secret(
            console_shared.raw_secret_bytes(),
            vec![],
            PublicKeyType::EcDhP256,
        );

        assert_eq!(client_ctx.encrypt_key(), console_ctx.encrypt_key());
        assert_eq!(client_ctx.iv_key(), console_ctx.iv_key());
        assert_eq!(client_ctx.hash_key(), console_ctx.hash_key());
    }

    #[test]
    fn from_shared_secret_splits_correctly() {
        let secret: Vec<u8> = (0..64u8).collect();
        let ctx = Context::from_shared_secret(&secret).unwrap();
        assert_eq!(ctx.encrypt_key(), &secret[0..16]);
        assert_eq!(ctx.iv_key(), &secret[16..32]);
        assert_eq!(ctx.hash_key(), &secret[32..64]);
    }

    #[test]
    fn from_shared_secret_rejects_wrong_length() {
        assert!(Context::from_shared_secret(&[0u8; 32]).is_err());
    }

    #[test]
    fn hmac_roundtrip() {
        let ctx = Context::from_shared_secret(&(0..64u8).collect::<Vec<_>>()).unwrap();
        let tag = ctx.hash(b"hello console");
        assert!(ctx.verify(b"hello console", &tag));
        assert!(!ctx.verify(b"hello console!", &tag));
    }
}
