//! PKCS#7 and ANSI X.923 block padding.
//!
//! Both schemes leave block-aligned input untouched — they never append a
//! full block of padding just to re-signal the original length, unlike
//! the textbook definitions.

use crate::{CryptoError, Result};

/// Number of padding bytes needed to align `length` to `alignment`. Zero
/// when `length` is already aligned.
pub fn size(length: usize, alignment: usize) -> usize {
    let overlap = length % alignment;
    if overlap == 0 {
        0
    } else {
        alignment - overlap
    }
}

/// Pad `payload` to `alignment` bytes using PKCS#7 (every padding byte
/// equals the pad count). No-op if already aligned.
pub fn pkcs7_pad(payload: &[u8], alignment: usize) -> Vec<u8> {
    let pad_len = size(payload.len(), alignment);
    if pad_len == 0 {
        return payload.to_vec();
    }
    let mut out = Vec::with_capacity(payload.len() + pad_len);
    out.extend_from_slice(payload);
    out.extend(std::iter::repeat(pad_len as u8).take(pad_len));
    out
}

/// Pad `payload` to `alignment` bytes using ANSI X.923 (zero bytes, then a
/// final byte holding the pad count). No-op if already aligned.
pub fn ansi_x923_pad(payload: &[u8], alignment: usize) -> Vec<u8> {
    let pad_len = size(payload.len(), alignment);
    if pad_len == 0 {
        return payload.to_vec();
    }
    let mut out = Vec::with_capacity(payload.len() + pad_len);
    out.extend_from_slice(payload);
    out.extend(std::iter::repeat(0u8).take(pad_len - 1));
    out.push(pad_len as u8);
    out
}

/// Remove padding previously applied by either [`pkcs7_pad`] or
/// [`ansi_x923_pad`] — both schemes agree on the trailing pad-count byte,
/// so a single routine strips either. An empty payload is already aligned
/// and unchanged by either `pad` function, so it's returned as-is rather
/// than treated as a missing pad byte.
pub fn remove(payload: &[u8]) -> Result<Vec<u8>> {
    if payload.is_empty() {
        return Ok(Vec::new());
    }
    let pad_count = *payload.last().ok_or(CryptoError::InvalidPadding)? as usize;
    if pad_count == 0 || pad_count > payload.len() {
        return Err(CryptoError::InvalidPadding);
    }
    Ok(payload[..payload.len() - pad_count].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pkcs7_pads_short_input() {
        let padded = pkcs7_pad(b"hello", 16);
        assert_eq!(padded.len(), 16);
        assert_eq!(padded[15], 11);
        assert_eq!(remove(&padded).unwrap(), b"hello");
    }

    #[test]
    fn pkcs7_leaves_aligned_input_untouched() {
        let payload = vec![0xAB; 32];
        let padded = pkcs7_pad(&payload, 16);
        assert_eq!(padded, payload);
    }

    #[test]
    fn ansi_x923_pads_with_zeros_then_count() {
        let padded = ansi_x923_pad(b"hi", 16);
        assert_eq!(padded.len(), 16);
        assert_eq!(&padded[2..15], &[0u8; 13]);
        assert_eq!(padded[15], 14);
        assert_eq!(remove(&padded).unwrap(), b"hi");
    }

    #[test]
    fn ansi_x923_leaves_aligned_input_untouched() {
        let payload = vec![0x01; 16];
        let padded = ansi_x923_pad(&payload, 16);
        assert_eq!(padded, payload);
    }

    #[test]
    fn remove_of_empty_input_is_a_no_op() {
        assert_eq!(remove(&[]).unwrap(), Vec::<u8>::new());
    }
}
