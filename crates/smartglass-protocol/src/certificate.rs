//! Console certificate parsing.
//!
//! `DiscoveryResponse` carries the console's X.509 certificate DER-encoded
//! and length-prefixed. Two fields matter to the session layer: the
//! `commonName` (the console's Live ID) and the raw SEC1-encoded ECDH
//! public key from `SubjectPublicKeyInfo`.

use der::asn1::Any;
use der::Decode;
use spki::ObjectIdentifier;
use x509_cert::Certificate;

use crate::{ProtocolError, Result};

/// Fields extracted from a console's discovery-response certificate.
#[derive(Clone, Debug)]
pub struct ConsoleCertificate {
    /// The console's Live ID, from the certificate's `commonName`.
    pub live_id: String,
    /// The raw SEC1-encoded public key, including its leading tag byte
    /// (length 0x41/0x61/0x85 depending on curve).
    pub public_key: Vec<u8>,
}

const COMMON_NAME_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");

impl ConsoleCertificate {
    /// Parse a DER-encoded certificate.
    pub fn parse(der_bytes: &[u8]) -> Result<Self> {
        let cert = Certificate::from_der(der_bytes)
            .map_err(|e| ProtocolError::InvalidCertificate(e.to_string()))?;

        let mut live_id = None;
        for rdn in cert.tbs_certificate.subject.0.iter() {
            for atv in rdn.0.iter() {
                if atv.oid == COMMON_NAME_OID {
                    let any = Any::from(atv.value.clone());
                    if let Ok(s) = any.decode_as::<der::asn1::Utf8StringRef>() {
                        live_id = Some(s.as_str().to_owned());
                    } else if let Ok(s) = any.decode_as::<der::asn1::PrintableStringRef>() {
                        live_id = Some(s.as_str().to_owned());
                    }
                }
            }
        }
        let live_id = live_id.ok_or_else(|| {
            ProtocolError::InvalidCertificate("missing commonName".to_owned())
        })?;

        let public_key = cert
            .tbs_certificate
            .subject_public_key_info
            .subject_public_key
            .as_bytes()
            .ok_or_else(|| ProtocolError::InvalidCertificate("unaligned public key bit string".to_owned()))?
            .to_vec();

        Ok(Self { live_id, public_key })
    }
}
