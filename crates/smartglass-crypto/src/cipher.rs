//! AES-128-CBC encryption/decryption.
//!
//! No padding is added or removed here — callers hand in block-aligned
//! data (see [`crate::padding`]) and get block-aligned data back.

use aes::Aes128;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::{CryptoError, Result};

type Enc = cbc::Encryptor<Aes128>;
type Dec = cbc::Decryptor<Aes128>;

/// Encrypt `plaintext` (which must already be a multiple of 16 bytes) with
/// AES-128-CBC under `key` and `iv`.
pub fn encrypt(key: &[u8; 16], iv: &[u8; 16], plaintext: &[u8]) -> Result<Vec<u8>> {
    if plaintext.len() % 16 != 0 {
        return Err(CryptoError::NotBlockAligned(plaintext.len()));
    }
    let cipher = Enc::new(key.into(), iv.into());
    Ok(cipher.encrypt_padded_vec_mut::<NoPadding>(plaintext))
}

/// Decrypt `ciphertext` (which must already be a multiple of 16 bytes)
/// with AES-128-CBC under `key` and `iv`. No padding is stripped.
pub fn decrypt(key: &[u8; 16], iv: &[u8; 16], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() % 16 != 0 {
        return Err(CryptoError::NotBlockAligned(ciphertext.len()));
    }
    let cipher = Dec::new(key.into(), iv.into());
    cipher
        .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
        .map_err(|_| CryptoError::NotBlockAligned(ciphertext.len()))
}

/// Encrypt a single 16-byte block under a zero IV — used by
/// [`crate::ecdh::Context::generate_iv`] to turn a seed into a derived IV.
/// Equivalent to AES-ECB of one block.
pub fn ecb_encrypt_block(key: &[u8; 16], block: &[u8; 16]) -> [u8; 16] {
    let cipher = Enc::new(key.into(), &[0u8; 16].into());
    let out = cipher.encrypt_padded_vec_mut::<NoPadding>(block);
    let mut result = [0u8; 16];
    result.copy_from_slice(&out);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = [0x11u8; 16];
        let iv = [0x22u8; 16];
        let plaintext = b"sixteen byte msg".to_vec();
        let ciphertext = encrypt(&key, &iv, &plaintext).unwrap();
        assert_eq!(ciphertext.len(), plaintext.len());
        let decrypted = decrypt(&key, &iv, &ciphertext).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn rejects_unaligned_input() {
        let key = [0u8; 16];
        let iv = [0u8; 16];
        assert!(encrypt(&key, &iv, b"not aligned").is_err());
    }

    #[test]
    fn ecb_single_block_deterministic() {
        let key = [0x33u8; 16];
        let seed = [0x44u8; 16];
        let a = ecb_encrypt_block(&key, &seed);
        let b = ecb_encrypt_block(&key, &seed);
        assert_eq!(a, b);
    }
}
