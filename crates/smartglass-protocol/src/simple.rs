//! Unprotected discovery/power-on packets and the mixed unprotected +
//! protected `Connect*` handshake packets.
//!
//! Unlike `Message`, only `ConnectRequest`/`ConnectResponse` carry a
//! protected (encrypted + HMAC'd) section, and that section uses a
//! literal IV carried in the unprotected payload rather than one derived
//! from a header seed — the client doesn't yet have a reason to rotate an
//! IV against a header that barely changes between retries, so it just
//! mints a fresh one per packet instead.

use smartglass_crypto::ecdh::Context as CryptoContext;
use smartglass_crypto::{cipher, padding};
use uuid::Uuid;

use crate::binio::{Reader, Writer};
use crate::enums::{ClientType, ConnectionResult, PacketType, PairedIdentityState, PrimaryDeviceFlag};
use crate::{CodecError, ProtocolError, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PowerOnRequest {
    pub liveid: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveryRequest {
    pub flags: u32,
    pub client_type: ClientType,
    pub minimum_version: u16,
    pub maximum_version: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveryResponse {
    pub flags: PrimaryDeviceFlag,
    pub device_type: ClientType,
    pub name: String,
    pub uuid: Uuid,
    pub last_error: u32,
    /// Raw X.509 DER bytes; parse with [`crate::certificate::ConsoleCertificate::parse`].
    pub certificate_der: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectRequest {
    pub sg_uuid: Uuid,
    pub public_key_type: smartglass_crypto::ecdh::PublicKeyType,
    pub public_key: Vec<u8>,
    pub iv: [u8; 16],
    pub userhash: String,
    pub jwt: String,
    pub connect_request_num: u32,
    pub connect_request_group_start: u32,
    pub connect_request_group_end: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectResponse {
    pub iv: [u8; 16],
    pub connect_result: ConnectionResult,
    pub pairing_state: PairedIdentityState,
    pub participant_id: u32,
}

#[derive(Clone, Debug)]
pub enum SimplePacket {
    PowerOnRequest(PowerOnRequest),
    DiscoveryRequest(DiscoveryRequest),
    DiscoveryResponse(DiscoveryResponse),
    ConnectRequest(ConnectRequest),
    ConnectResponse(ConnectResponse),
}

impl SimplePacket {
    fn pkt_type(&self) -> PacketType {
        match self {
            SimplePacket::PowerOnRequest(_) => PacketType::PowerOnRequest,
            SimplePacket::DiscoveryRequest(_) => PacketType::DiscoveryRequest,
            SimplePacket::DiscoveryResponse(_) => PacketType::DiscoveryResponse,
            SimplePacket::ConnectRequest(_) => PacketType::ConnectRequest,
            SimplePacket::ConnectResponse(_) => PacketType::ConnectResponse,
        }
    }

    fn encode_unprotected(&self) -> Vec<u8> {
        let mut w = Writer::new();
        match self {
            SimplePacket::PowerOnRequest(p) => {
                w.sgstring(&p.liveid);
            }
            SimplePacket::DiscoveryRequest(d) => {
                w.u32(d.flags);
                let ct: u16 = d.client_type.into();
                w.u16(ct);
                w.u16(d.minimum_version);
                w.u16(d.maximum_version);
            }
            SimplePacket::DiscoveryResponse(d) => {
                w.u32(d.flags.bits());
                let ct: u16 = d.device_type.into();
                w.u16(ct);
                w.sgstring(&d.name);
                w.sgstring(&d.uuid.as_hyphenated().to_string().to_uppercase());
                w.u32(d.last_error);
                w.u16(d.certificate_der.len() as u16);
                w.bytes(&d.certificate_der);
            }
            SimplePacket::ConnectRequest(c) => {
                w.uuid(&c.sg_uuid);
                w.u16(c.public_key_type as u16);
                w.bytes(&c.public_key);
                w.bytes(&c.iv);
            }
            SimplePacket::ConnectResponse(c) => {
                w.bytes(&c.iv);
            }
        }
        w.into_bytes()
    }

    fn encode_protected(&self) -> Option<Vec<u8>> {
        let mut w = Writer::new();
        match self {
            SimplePacket::ConnectRequest(c) => {
                w.sgstring(&c.userhash);
                w.sgstring(&c.jwt);
                w.u32(c.connect_request_num);
                w.u32(c.connect_request_group_start);
                w.u32(c.connect_request_group_end);
                Some(w.into_bytes())
            }
            SimplePacket::ConnectResponse(c) => {
                let result: u16 = c.connect_result.into();
                w.u16(result);
                let pairing: u16 = c.pairing_state.into();
                w.u16(pairing);
                w.u32(c.participant_id);
                Some(w.into_bytes())
            }
            _ => None,
        }
    }

    fn iv(&self) -> Option<[u8; 16]> {
        match self {
            SimplePacket::ConnectRequest(c) => Some(c.iv),
            SimplePacket::ConnectResponse(c) => Some(c.iv),
            _ => None,
        }
    }

    /// Encode this packet. `crypto` is required for `ConnectRequest`/
    /// `ConnectResponse`; it's unused (and may be omitted) for the purely
    /// unprotected packet kinds.
    pub fn pack(&self, crypto: Option<&CryptoContext>) -> Result<Vec<u8>> {
        let unprotected = self.encode_unprotected();
        let protected_plaintext = self.encode_protected();

        let pkt_type: u16 = self.pkt_type().into();
        let has_protected = protected_plaintext.is_some();

        let protected_ciphertext = match (&protected_plaintext, crypto, self.iv()) {
            (Some(plaintext), Some(crypto), Some(iv)) => {
                let padded = padding::ansi_x923_pad(plaintext, 16);
                Some(cipher::encrypt(crypto.encrypt_key(), &iv, &padded).map_err(CodecError::Crypto)?)
            }
            (Some(_), _, _) => {
                return Err(ProtocolError::InvalidCertificate(
                    "connect packet requires a crypto context and iv".to_owned(),
                ))
            }
            (None, _, _) => None,
        };

        let mut header = Writer::new();
        header.u16(pkt_type);
        header.u16(unprotected.len() as u16);
        if has_protected {
            header.u16(protected_ciphertext.as_ref().map(|c| c.len()).unwrap_or(0) as u16);
        }
        header.u16(2); // version
        let header_bytes = header.into_bytes();

        let mut out = Vec::new();
        out.extend_from_slice(&header_bytes);
        out.extend_from_slice(&unprotected);

        if let Some(ciphertext) = protected_ciphertext {
            let crypto = crypto.expect("checked above");
            let mut hmac_input = Vec::with_capacity(header_bytes.len() + unprotected.len() + ciphertext.len());
            hmac_input.extend_from_slice(&header_bytes);
            hmac_input.extend_from_slice(&unprotected);
            hmac_input.extend_from_slice(&ciphertext);
            let hmac = crypto.hash(&hmac_input);
            out.extend_from_slice(&ciphertext);
            out.extend_from_slice(&hmac);
        }

        Ok(out)
    }

    pub fn unpack(bytes: &[u8], crypto: Option<&CryptoContext>) -> Result<Self> {
        let mut r = Reader::new(bytes);
        let pkt_type = PacketType::try_from(r.u16()?)?;
        let unprotected_payload_length = r.u16()? as usize;
        let protected_payload_length = match pkt_type {
            PacketType::ConnectRequest | PacketType::ConnectResponse => Some(r.u16()? as usize),
            _ => None,
        };
        let _version = r.u16()?;

        let header_len = 2 + 2 + if protected_payload_length.is_some() { 2 } else { 0 } + 2;
        let unprotected_bytes = r.bytes(unprotected_payload_length)?;

        let packet = match pkt_type {
            PacketType::PowerOnRequest => {
                let mut ur = Reader::new(&unprotected_bytes);
                SimplePacket::PowerOnRequest(PowerOnRequest { liveid: ur.sgstring()? })
            }
            PacketType::DiscoveryRequest => {
                let mut ur = Reader::new(&unprotected_bytes);
                SimplePacket::DiscoveryRequest(DiscoveryRequest {
                    flags: ur.u32()?,
                    client_type: ClientType::try_from(ur.u16()?)?,
                    minimum_version: ur.u16()?,
                    maximum_version: ur.u16()?,
                })
            }
            PacketType::DiscoveryResponse => {
                let mut ur = Reader::new(&unprotected_bytes);
                let flags = PrimaryDeviceFlag::from_bits_truncate(ur.u32()?);
                let device_type = ClientType::try_from(ur.u16()?)?;
                let name = ur.sgstring()?;
                let uuid_str = ur.sgstring()?;
                let uuid = Uuid::parse_str(&uuid_str)
                    .map_err(|e| ProtocolError::InvalidCertificate(format!("bad discovery uuid: {e}")))?;
                let last_error = ur.u32()?;
                let cert_len = ur.u16()? as usize;
                let certificate_der = ur.bytes(cert_len)?;
                SimplePacket::DiscoveryResponse(DiscoveryResponse {
                    flags,
                    device_type,
                    name,
                    uuid,
                    last_error,
                    certificate_der,
                })
            }
            PacketType::ConnectRequest => {
                let mut ur = Reader::new(&unprotected_bytes);
                let sg_uuid = ur.uuid()?;
                let public_key_type = match ur.u16()? {
                    0x00 => smartglass_crypto::ecdh::PublicKeyType::EcDhP256,
                    0x01 => smartglass_crypto::ecdh::PublicKeyType::EcDhP384,
                    0x02 => smartglass_crypto::ecdh::PublicKeyType::EcDhP521,
                    other => return Err(CodecError::UnknownMessageType(other).into()),
                };
                let public_key = ur.bytes(public_key_type.body_len())?;
                let iv: [u8; 16] = ur.array()?;

                let ciphertext = r.bytes(protected_payload_length.unwrap_or(0))?;
                let hmac = r.bytes(32)?;
                let crypto = crypto.ok_or_else(|| {
                    ProtocolError::InvalidCertificate("ConnectRequest needs a crypto context to decode".to_owned())
                })?;

                let mut hmac_input = Vec::new();
                hmac_input.extend_from_slice(&bytes[0..header_len]);
                hmac_input.extend_from_slice(&unprotected_bytes);
                hmac_input.extend_from_slice(&ciphertext);
                if !crypto.verify(&hmac_input, &hmac) {
                    return Err(CodecError::Crypto(smartglass_crypto::CryptoError::HmacMismatch).into());
                }
                let padded = cipher::decrypt(crypto.encrypt_key(), &iv, &ciphertext).map_err(CodecError::Crypto)?;
                let plaintext = padding::remove(&padded).map_err(CodecError::Crypto)?;
                let mut pr = Reader::new(&plaintext);
                SimplePacket::ConnectRequest(ConnectRequest {
                    sg_uuid,
                    public_key_type,
                    public_key,
                    iv,
                    userhash: pr.sgstring()?,
                    jwt: pr.sgstring()?,
                    connect_request_num: pr.u32()?,
                    connect_request_group_start: pr.u32()?,
                    connect_request_group_end: pr.u32()?,
                })
            }
            PacketType::ConnectResponse => {
                let mut ur = Reader::new(&unprotected_bytes);
                let iv: [u8; 16] = ur.array()?;

                let ciphertext = r.bytes(protected_payload_length.unwrap_or(0))?;
                let hmac = r.bytes(32)?;
                let crypto = crypto.ok_or_else(|| {
                    ProtocolError::InvalidCertificate("ConnectResponse needs a crypto context to decode".to_owned())
                })?;

                let mut hmac_input = Vec::new();
                hmac_input.extend_from_slice(&bytes[0..header_len]);
                hmac_input.extend_from_slice(&unprotected_bytes);
                hmac_input.extend_from_slice(&ciphertext);
                if !crypto.verify(&hmac_input, &hmac) {
                    return Err(CodecError::Crypto(smartglass_crypto::CryptoError::HmacMismatch).into());
                }
                let padded = cipher::decrypt(crypto.encrypt_key(), &iv, &ciphertext).map_err(CodecError::Crypto)?;
                let plaintext = padding::remove(&padded).map_err(CodecError::Crypto)?;
                let mut pr = Reader::new(&plaintext);
                SimplePacket::ConnectResponse(ConnectResponse {
                    iv,
                    connect_result: ConnectionResult::try_from(pr.u16()?)?,
                    pairing_state: PairedIdentityState::try_from(pr.u16()?)?,
                    participant_id: pr.u32()?,
                })
            }
            PacketType::Message => return Err(CodecError::UnknownPacketType(0xD00D).into()),
        };
        Ok(packet)
    }
}

/// Split an auth string (userhash, only on the first fragment, plus the
/// full token) across N fragments of at most `chunk_size` bytes each,
/// mirroring the console's own fragmentation of an oversized `ConnectRequest`.
///
/// Returns one `(userhash_chunk, token_chunk)` pair per fragment.
pub fn fragment_connect_auth(userhash: &str, token: &str, chunk_size: usize) -> Vec<(String, String)> {
    if chunk_size == 0 {
        return vec![(userhash.to_owned(), token.to_owned())];
    }
    let mut combined = String::with_capacity(userhash.len() + token.len());
    combined.push_str(userhash);
    combined.push_str(token);

    let bytes = combined.as_bytes();
    let mut fragments = Vec::new();
    let mut offset = 0;
    let userhash_len = userhash.len();
    while offset < bytes.len() {
        let end = (offset + chunk_size).min(bytes.len());
        let chunk = &bytes[offset..end];
        let chunk_str = String::from_utf8_lossy(chunk).into_owned();

        let (uh, tok) = if offset >= userhash_len {
            (String::new(), chunk_str)
        } else if end <= userhash_len {
            (chunk_str, String::new())
        } else {
            let split_at = userhash_len - offset;
            (chunk_str[..split_at].to_owned(), chunk_str[split_at..].to_owned())
        };
        fragments.push((uh, tok));
        offset = end;
    }
    if fragments.is_empty() {
        fragments.push((String::new(), String::new()));
    }
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartglass_crypto::ecdh::PublicKeyType;

    fn test_crypto() -> CryptoContext {
        CryptoContext::from_shared_secret(&(0..64u8).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn power_on_request_roundtrip() {
        let packet = SimplePacket::PowerOnRequest(PowerOnRequest {
            liveid: "FFFFFFFFFFFFFFFF".to_owned(),
        });
        let bytes = packet.pack(None).unwrap();
        match SimplePacket::unpack(&bytes, None).unwrap() {
            SimplePacket::PowerOnRequest(p) => assert_eq!(p.liveid, "FFFFFFFFFFFFFFFF"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn discovery_request_roundtrip() {
        let packet = SimplePacket::DiscoveryRequest(DiscoveryRequest {
            flags: 0,
            client_type: ClientType::WindowsDesktop,
            minimum_version: 0,
            maximum_version: 2,
        });
        let bytes = packet.pack(None).unwrap();
        match SimplePacket::unpack(&bytes, None).unwrap() {
            SimplePacket::DiscoveryRequest(d) => {
                assert_eq!(d.client_type, ClientType::WindowsDesktop);
                assert_eq!(d.maximum_version, 2);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn connect_request_roundtrip_with_crypto() {
        let crypto = test_crypto();
        let packet = SimplePacket::ConnectRequest(ConnectRequest {
            sg_uuid: Uuid::from_bytes([0x11; 16]),
            public_key_type: PublicKeyType::EcDhP256,
            public_key: vec![0x22; 0x40],
            iv: [0x33; 16],
            userhash: "deadbeefdeadbeefde".to_owned(),
            jwt: "dummy_token".to_owned(),
            connect_request_num: 0,
            connect_request_group_start: 0,
            connect_request_group_end: 1,
        });
        let bytes = packet.pack(Some(&crypto)).unwrap();
        match SimplePacket::unpack(&bytes, Some(&crypto)).unwrap() {
            SimplePacket::ConnectRequest(c) => {
                assert_eq!(c.userhash, "deadbeefdeadbeefde");
                assert_eq!(c.jwt, "dummy_token");
                assert_eq!(c.connect_request_group_end, 1);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn connect_request_tampered_hmac_rejected() {
        let crypto = test_crypto();
        let packet = SimplePacket::ConnectRequest(ConnectRequest {
            sg_uuid: Uuid::nil(),
            public_key_type: PublicKeyType::EcDhP256,
            public_key: vec![0; 0x40],
            iv: [0x01; 16],
            userhash: "uh".to_owned(),
            jwt: "tok".to_owned(),
            connect_request_num: 0,
            connect_request_group_start: 0,
            connect_request_group_end: 1,
        });
        let mut bytes = packet.pack(Some(&crypto)).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(SimplePacket::unpack(&bytes, Some(&crypto)).is_err());
    }

    #[test]
    fn fragment_auth_splits_userhash_then_token() {
        let userhash = "0123456789";
        let token = "a".repeat(1398);
        let fragments = fragment_connect_auth(userhash, &token, 700);
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].0, userhash);
        assert_eq!(fragments[1].0, "");
        assert_eq!(fragments[0].1.len() + fragments[1].1.len(), token.len());
    }
}
