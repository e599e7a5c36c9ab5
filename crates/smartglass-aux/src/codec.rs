//! Frame format and keying for the auxiliary-stream TCP side channel.
//!
//! ```text
//! magic: u16 = 0xDEAD
//! payload_size: u16          (length of the plaintext, before padding)
//! ciphertext: [u8]           (PKCS#7-padded to 16 bytes, AES-128-CBC)
//! hmac: [u8; 32]             (HMAC-SHA-256 over magic || payload_size || ciphertext)
//! ```
//!
//! Unlike the main session codec, the two directions of a connection use
//! independent CBC chains: the client-to-server stream's IV evolves from
//! `client_iv`, the server-to-client stream's from `server_iv`. Each
//! chain's running IV is the final ciphertext block of the previous frame
//! on that stream — frames MUST be processed in arrival order, or the
//! chain desyncs and every subsequent frame fails its HMAC or decrypts to
//! garbage.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::sync::Mutex;

use smartglass_crypto::{cipher, padding};

use crate::{AuxError, Result};

const FRAME_MAGIC: u16 = 0xDEAD;
const FRAME_HEADER_LEN: usize = 4;
const HMAC_LEN: usize = 32;

/// One direction's running CBC state: the encrypt/hmac keys are shared
/// across both directions, but the chained IV is private to this stream.
struct CipherStream {
    iv: Mutex<[u8; 16]>,
}

impl CipherStream {
    fn new(initial_iv: [u8; 16]) -> Self {
        Self { iv: Mutex::new(initial_iv) }
    }
}

/// Key material and per-direction chaining state for one auxiliary
/// connection, derived from the `AuxConnectionInfo` the console hands
/// over on the main session.
pub struct AuxCrypto {
    encrypt_key: [u8; 16],
    hash_key: Vec<u8>,
    outbound: CipherStream,
    inbound: CipherStream,
}

impl AuxCrypto {
    /// `crypto_key` is the AES-128 key; `sign_hash` is the HMAC-SHA-256
    /// key; `client_iv` seeds the client-to-server chain (used by
    /// [`encode`](Self::encode)) and `server_iv` seeds the
    /// server-to-client chain (used by [`decode`](Self::decode)).
    pub fn new(crypto_key: &[u8], sign_hash: &[u8], client_iv: &[u8], server_iv: &[u8]) -> Result<Self> {
        let encrypt_key: [u8; 16] = crypto_key
            .try_into()
            .map_err(|_| smartglass_crypto::CryptoError::InvalidSharedSecretLength(crypto_key.len()))?;
        let client_iv: [u8; 16] = client_iv
            .try_into()
            .map_err(|_| smartglass_crypto::CryptoError::InvalidSharedSecretLength(client_iv.len()))?;
        let server_iv: [u8; 16] = server_iv
            .try_into()
            .map_err(|_| smartglass_crypto::CryptoError::InvalidSharedSecretLength(server_iv.len()))?;
        Ok(Self {
            encrypt_key,
            hash_key: sign_hash.to_vec(),
            outbound: CipherStream::new(client_iv),
            inbound: CipherStream::new(server_iv),
        })
    }

    fn hmac(&self, data: &[u8]) -> [u8; 32] {
        use hmac::{Hmac, Mac};
        use sha2::Sha256;
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.hash_key).expect("HMAC accepts any key length");
        mac.update(data);
        let mut out = [0u8; 32];
        out.copy_from_slice(&mac.finalize().into_bytes());
        out
    }

    fn verify(&self, data: &[u8], tag: &[u8]) -> bool {
        use hmac::{Hmac, Mac};
        use sha2::Sha256;
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.hash_key).expect("HMAC accepts any key length");
        mac.update(data);
        mac.verify_slice(tag).is_ok()
    }

    /// Encrypt and frame `plaintext` for the client-to-server stream,
    /// advancing that stream's chained IV.
    pub fn encode(&self, plaintext: &[u8]) -> Vec<u8> {
        let mut iv_guard = self.outbound.iv.lock().expect("outbound iv mutex poisoned");
        let padded = padding::pkcs7_pad(plaintext, 16);
        let ciphertext = cipher::encrypt(&self.encrypt_key, &iv_guard, &padded).expect("already block-aligned by pkcs7_pad");
        if let Some(last_block) = ciphertext.chunks(16).last() {
            iv_guard.copy_from_slice(last_block);
        }
        drop(iv_guard);

        let mut out = Vec::with_capacity(FRAME_HEADER_LEN + ciphertext.len() + HMAC_LEN);
        out.write_u16::<BigEndian>(FRAME_MAGIC).expect("vec write cannot fail");
        out.write_u16::<BigEndian>(plaintext.len() as u16).expect("vec write cannot fail");
        out.extend_from_slice(&ciphertext);
        let tag = self.hmac(&out);
        out.extend_from_slice(&tag);
        out
    }

    /// Verify, decrypt, and truncate one server-to-client frame,
    /// advancing that stream's chained IV. Frames must be fed in the
    /// order they arrived on the socket.
    pub fn decode(&self, frame: &[u8]) -> Result<Vec<u8>> {
        if frame.len() < FRAME_HEADER_LEN + HMAC_LEN {
            return Err(AuxError::ShortFrame {
                needed: FRAME_HEADER_LEN + HMAC_LEN,
                got: frame.len(),
            });
        }
        let mut header = &frame[0..FRAME_HEADER_LEN];
        let magic = header.read_u16::<BigEndian>().expect("length checked above");
        if magic != FRAME_MAGIC {
            return Err(AuxError::InvalidMagic(magic));
        }
        let payload_size = header.read_u16::<BigEndian>().expect("length checked above") as usize;

        let body = &frame[..frame.len() - HMAC_LEN];
        let tag = &frame[frame.len() - HMAC_LEN..];
        if !self.verify(body, tag) {
            return Err(AuxError::HmacMismatch);
        }

        let ciphertext = &frame[FRAME_HEADER_LEN..frame.len() - HMAC_LEN];
        let mut iv_guard = self.inbound.iv.lock().expect("inbound iv mutex poisoned");
        let padded = cipher::decrypt(&self.encrypt_key, &iv_guard, ciphertext)?;
        if let Some(last_block) = ciphertext.chunks(16).last() {
            iv_guard.copy_from_slice(last_block);
        }
        drop(iv_guard);

        if payload_size > padded.len() {
            return Err(AuxError::PayloadSizeOutOfRange {
                declared: payload_size,
                actual: padded.len(),
            });
        }
        Ok(padded[..payload_size].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CRYPTO_KEY: [u8; 16] = [0x11u8; 16];
    const SIGN_HASH: [u8; 32] = [0x22u8; 32];
    const CLIENT_IV: [u8; 16] = [0x33u8; 16];
    const SERVER_IV: [u8; 16] = [0x44u8; 16];

    /// Our side of the relay: encodes outbound frames on `client_iv`,
    /// decodes inbound frames on `server_iv`.
    fn our_side() -> AuxCrypto {
        AuxCrypto::new(&CRYPTO_KEY, &SIGN_HASH, &CLIENT_IV, &SERVER_IV).unwrap()
    }

    /// The console's mirrored context: it encodes what it sends to us
    /// (which we decode as inbound) on `server_iv`, and decodes what we
    /// send it (our outbound) on `client_iv` — the IV roles are swapped
    /// relative to [`our_side`].
    fn console_side() -> AuxCrypto {
        AuxCrypto::new(&CRYPTO_KEY, &SIGN_HASH, &SERVER_IV, &CLIENT_IV).unwrap()
    }

    #[test]
    fn encode_decode_roundtrip_single_frame() {
        let us = our_side();
        let frame = us.encode(b"hello console");
        let console = console_side();
        let plaintext = console.decode(&frame).unwrap();
        assert_eq!(plaintext, b"hello console");
    }

    #[test]
    fn chain_requires_in_order_processing() {
        let us = our_side();
        let frame1 = us.encode(b"frame one payload!!");
        let frame2 = us.encode(b"frame two");

        let console = console_side();
        // feed frame2 before frame1: frame2's HMAC still checks out (it
        // doesn't depend on chain state) but the decrypted bytes are
        // garbage because the IV used doesn't match what encoded it.
        let garbled = console.decode(&frame2).unwrap();
        assert_ne!(garbled, b"frame two");

        // processing in order on a fresh context recovers both correctly
        let console = console_side();
        assert_eq!(console.decode(&frame1).unwrap(), b"frame one payload!!");
        assert_eq!(console.decode(&frame2).unwrap(), b"frame two");
    }

    #[test]
    fn tampered_frame_fails_hmac() {
        let us = our_side();
        let mut frame = us.encode(b"hello console");
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        let console = console_side();
        assert!(matches!(console.decode(&frame), Err(AuxError::HmacMismatch)));
    }

    #[test]
    fn rejects_short_frame() {
        let console = console_side();
        assert!(matches!(console.decode(&[0u8; 10]), Err(AuxError::ShortFrame { .. })));
    }

    #[test]
    fn rejects_bad_magic() {
        let us = our_side();
        let mut frame = us.encode(b"hi");
        frame[0] = 0x00;
        frame[1] = 0x00;
        let console = console_side();
        assert!(matches!(console.decode(&frame), Err(AuxError::InvalidMagic(0))));
    }

    #[test]
    fn independent_streams_do_not_share_chain_state() {
        // encoding on the outbound stream never perturbs the inbound
        // stream's iv, and vice versa: decoding several console frames in
        // a row works even if we've also encoded our own frames in between.
        let us = our_side();
        let console = console_side();

        let c1 = us.encode(b"client says hi");
        let s1 = console.encode(b"server says hi");
        let c2 = us.encode(b"client again");

        assert_eq!(console.decode(&c1).unwrap(), b"client says hi");
        assert_eq!(us.decode(&s1).unwrap(), b"server says hi");
        assert_eq!(console.decode(&c2).unwrap(), b"client again");
    }
}
