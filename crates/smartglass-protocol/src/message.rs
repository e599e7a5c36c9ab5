//! The protected `Message` packet: a 26-byte plaintext header followed by
//! an AES-128-CBC/HMAC-SHA-256-protected payload that is either a
//! fragment, an `Ack`, or one of the typed sub-payloads in
//! [`crate::payloads`].

use smartglass_crypto::ecdh::Context as CryptoContext;
use smartglass_crypto::{cipher, padding};

use crate::binio::{Reader, Writer};
use crate::enums::MessageType;
use crate::payloads::Payload;
use crate::{CodecError, Result};

/// Plaintext header preceding every `Message` packet's encrypted body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageHeader {
    pub protected_payload_length: u16,
    pub sequence_number: u32,
    pub target_participant_id: u32,
    pub source_participant_id: u32,
    pub version: u8,
    pub need_ack: bool,
    pub is_fragment: bool,
    pub msg_type: MessageType,
    pub channel_id: u64,
}

const HEADER_LEN: usize = 26;
/// Reserved channel id for the always-open control channel.
pub const CHANNEL_CORE: u64 = 0;
/// Reserved channel id the console uses to send back `Ack` messages.
pub const CHANNEL_ACK: u64 = 0x1000_0000_0000_0000;

impl MessageHeader {
    fn flags_u16(&self) -> u16 {
        let version = (self.version as u16 & 0x3) << 14;
        let need_ack = (self.need_ack as u16) << 13;
        let is_fragment = (self.is_fragment as u16) << 12;
        let msg_type: u16 = self.msg_type.into();
        version | need_ack | is_fragment | (msg_type & 0x0FFF)
    }

    fn write_plaintext(&self) -> [u8; HEADER_LEN] {
        let mut w = Writer::new();
        w.u16(0xD00D); // PacketType::Message
        w.u16(self.protected_payload_length);
        w.u32(self.sequence_number);
        w.u32(self.target_participant_id);
        w.u32(self.source_participant_id);
        w.u16(self.flags_u16());
        w.u64(self.channel_id);
        let bytes = w.into_bytes();
        let mut out = [0u8; HEADER_LEN];
        out.copy_from_slice(&bytes);
        out
    }

    fn parse(bytes: &[u8; HEADER_LEN]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        let pkt_type = r.u16()?;
        if pkt_type != 0xD00D {
            return Err(CodecError::UnknownPacketType(pkt_type).into());
        }
        let protected_payload_length = r.u16()?;
        let sequence_number = r.u32()?;
        let target_participant_id = r.u32()?;
        let source_participant_id = r.u32()?;
        let flags = r.u16()?;
        let channel_id = r.u64()?;

        let version = ((flags >> 14) & 0x3) as u8;
        let need_ack = (flags >> 13) & 0x1 != 0;
        let is_fragment = (flags >> 12) & 0x1 != 0;
        let msg_type = MessageType::try_from(flags & 0x0FFF)?;

        Ok(Self {
            protected_payload_length,
            sequence_number,
            target_participant_id,
            source_participant_id,
            version,
            need_ack,
            is_fragment,
            msg_type,
            channel_id,
        })
    }
}

/// A binary fragment of an oversized `Message` payload, reassembled by
/// [`crate::fragment::BinaryFragmentAssembler`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fragment {
    pub sequence_begin: u32,
    pub sequence_end: u32,
    pub data: Vec<u8>,
}

impl Fragment {
    fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.u32(self.sequence_begin);
        w.u32(self.sequence_end);
        w.u16(self.data.len() as u16);
        w.bytes(&self.data);
        w.into_bytes()
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        let sequence_begin = r.u32()?;
        let sequence_end = r.u32()?;
        let len = r.u16()? as usize;
        let data = r.bytes(len)?;
        Ok(Self {
            sequence_begin,
            sequence_end,
            data,
        })
    }
}

/// A fully decoded `Message` packet: header plus either a fragment body
/// still awaiting reassembly or a typed payload.
#[derive(Clone, Debug)]
pub enum MessageBody {
    Fragment(Fragment),
    Payload(Payload),
}

#[derive(Clone, Debug)]
pub struct Message {
    pub header: MessageHeader,
    pub body: MessageBody,
}

impl Message {
    /// Construct a non-fragmented message carrying `payload` on
    /// `channel_id`, with `sequence_number` and ack bookkeeping to be
    /// filled in by the caller (normally `SequenceTracker`).
    pub fn new(
        msg_type: MessageType,
        channel_id: u64,
        sequence_number: u32,
        target_participant_id: u32,
        source_participant_id: u32,
        need_ack: bool,
        payload: Payload,
    ) -> Self {
        Self {
            header: MessageHeader {
                protected_payload_length: 0,
                sequence_number,
                target_participant_id,
                source_participant_id,
                version: 2,
                need_ack,
                is_fragment: false,
                msg_type,
                channel_id,
            },
            body: MessageBody::Payload(payload),
        }
    }

    /// Encrypt and frame this message for transmission.
    ///
    /// The IV is derived by AES-ECB-"encrypting" the header's first 16
    /// bytes with `iv_key`, so every packet gets a fresh IV without
    /// needing its own random field — the sequence number alone changes
    /// those bytes from packet to packet.
    pub fn pack(&self, crypto: &CryptoContext) -> Result<Vec<u8>> {
        let plaintext = match &self.body {
            MessageBody::Fragment(f) => f.encode(),
            MessageBody::Payload(p) => p.encode(),
        };
        let padded = padding::ansi_x923_pad(&plaintext, 16);

        let mut header = self.header.clone();
        header.protected_payload_length = padded.len() as u16;
        let header_bytes = header.write_plaintext();

        let seed: [u8; 16] = header_bytes[0..16].try_into().expect("header is 26 bytes");
        let iv = crypto.generate_iv(Some(&seed));
        let ciphertext = cipher::encrypt(crypto.encrypt_key(), &iv, &padded).map_err(CodecError::Crypto)?;

        let mut hmac_input = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        hmac_input.extend_from_slice(&header_bytes);
        hmac_input.extend_from_slice(&ciphertext);
        let hmac = crypto.hash(&hmac_input);

        let mut out = Vec::with_capacity(HEADER_LEN + ciphertext.len() + 32);
        out.extend_from_slice(&header_bytes);
        out.extend_from_slice(&ciphertext);
        out.extend_from_slice(&hmac);
        Ok(out)
    }

    /// Verify the HMAC, decrypt, strip padding, and dispatch to either
    /// [`Fragment::decode`] or [`Payload::decode`] depending on the
    /// header's `is_fragment` bit.
    pub fn unpack(raw: &[u8], crypto: &CryptoContext) -> Result<Self> {
        if raw.len() < HEADER_LEN + 32 {
            return Err(CodecError::Truncated {
                needed: HEADER_LEN + 32 - raw.len(),
            }
            .into());
        }
        let header_bytes: [u8; HEADER_LEN] = raw[0..HEADER_LEN].try_into().expect("length checked above");
        let header = MessageHeader::parse(&header_bytes)?;

        let ciphertext = &raw[HEADER_LEN..raw.len() - 32];
        let tag = &raw[raw.len() - 32..];

        let mut hmac_input = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        hmac_input.extend_from_slice(&header_bytes);
        hmac_input.extend_from_slice(ciphertext);
        if !crypto.verify(&hmac_input, tag) {
            return Err(CodecError::Crypto(smartglass_crypto::CryptoError::HmacMismatch).into());
        }

        let seed: [u8; 16] = header_bytes[0..16].try_into().expect("header is 26 bytes");
        let iv = crypto.generate_iv(Some(&seed));
        let padded = cipher::decrypt(crypto.encrypt_key(), &iv, ciphertext).map_err(CodecError::Crypto)?;
        let plaintext = smartglass_crypto::padding::remove(&padded).map_err(CodecError::Crypto)?;

        let body = if header.is_fragment {
            MessageBody::Fragment(Fragment::decode(&plaintext)?)
        } else {
            MessageBody::Payload(Payload::decode(header.msg_type, &plaintext)?)
        };

        Ok(Self { header, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payloads::Payload;
    use smartglass_crypto::ecdh::Context;

    fn test_crypto() -> Context {
        Context::from_shared_secret(&(0..64u8).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn message_roundtrip_stop_activity() {
        let crypto = test_crypto();
        let msg = Message::new(MessageType::StopActivity, CHANNEL_CORE, 1, 0, 0, false, Payload::Empty);
        let packed = msg.pack(&crypto).unwrap();
        let unpacked = Message::unpack(&packed, &crypto).unwrap();
        assert_eq!(unpacked.header.sequence_number, 1);
        assert!(matches!(unpacked.body, MessageBody::Payload(Payload::Empty)));
    }

    #[test]
    fn tampered_ciphertext_fails_hmac() {
        let crypto = test_crypto();
        let msg = Message::new(MessageType::StopActivity, CHANNEL_CORE, 1, 0, 0, false, Payload::Empty);
        let mut packed = msg.pack(&crypto).unwrap();
        let last = packed.len() - 33;
        packed[last] ^= 0xFF;
        assert!(Message::unpack(&packed, &crypto).is_err());
    }

    #[test]
    fn fragment_roundtrip() {
        let crypto = test_crypto();
        let frag = Fragment {
            sequence_begin: 10,
            sequence_end: 12,
            data: vec![1, 2, 3, 4, 5],
        };
        let msg = Message {
            header: MessageHeader {
                protected_payload_length: 0,
                sequence_number: 10,
                target_participant_id: 1,
                source_participant_id: 1,
                version: 2,
                need_ack: true,
                is_fragment: true,
                msg_type: MessageType::Json,
                channel_id: CHANNEL_CORE,
            },
            body: MessageBody::Fragment(frag.clone()),
        };
        let packed = msg.pack(&crypto).unwrap();
        let unpacked = Message::unpack(&packed, &crypto).unwrap();
        match unpacked.body {
            MessageBody::Fragment(f) => assert_eq!(f, frag),
            _ => panic!("expected fragment"),
        }
    }
}
