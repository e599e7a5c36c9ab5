//! Two independent reassembly schemes, one for each kind of fragmented
//! payload the protocol uses: binary `Message` fragments (the `is_fragment`
//! header bit) and base64-chunked JSON fragments (carried as ordinary
//! `Json` payloads whose text is itself one chunk of a larger document).
//!
//! Both tables evict a datagram's entry the instant it completes.

use std::collections::{BTreeMap, HashMap};

use crate::message::Fragment;
use crate::{FragmentError, FragmentResult as Result};

/// Reassembles binary `Message` fragments. Fragments are keyed by the
/// `sequence_number` of the packet that carried them; a group is complete
/// once every sequence number in `[sequence_begin, sequence_end)` has
/// arrived, regardless of order.
#[derive(Debug, Default)]
pub struct BinaryFragmentAssembler {
    chunks: HashMap<u32, Vec<u8>>,
}

impl BinaryFragmentAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment, carried on packet `sequence_number`. Returns the
    /// concatenated plaintext once its group is complete.
    pub fn add(&mut self, sequence_number: u32, fragment: Fragment) -> Option<Vec<u8>> {
        self.chunks.insert(sequence_number, fragment.data);

        let complete = (fragment.sequence_begin..fragment.sequence_end).all(|seq| self.chunks.contains_key(&seq));
        if !complete {
            return None;
        }

        let mut out = Vec::new();
        for seq in fragment.sequence_begin..fragment.sequence_end {
            out.extend(self.chunks.remove(&seq).expect("completeness checked above"));
        }
        Some(out)
    }
}

struct PendingDatagram {
    datagram_size: u32,
    received_len: u32,
    chunks: BTreeMap<u32, String>,
}

/// Reassembles JSON documents split across multiple base64-chunked
/// fragments, keyed by `datagram_id`.
#[derive(Default)]
pub struct JsonFragmentAssembler {
    pending: HashMap<u64, PendingDatagram>,
}

impl JsonFragmentAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment of `datagram_id`. Duplicate fragments for an
    /// offset already seen are silently dropped. Returns the parsed JSON
    /// value once every byte of the datagram has arrived.
    pub fn add(
        &mut self,
        datagram_id: u64,
        datagram_size: u32,
        fragment_offset: u32,
        fragment_length: u32,
        fragment_data: &str,
    ) -> Result<Option<serde_json::Value>> {
        let entry = self.pending.entry(datagram_id).or_insert_with(|| PendingDatagram {
            datagram_size,
            received_len: 0,
            chunks: BTreeMap::new(),
        });

        if entry.chunks.contains_key(&fragment_offset) {
            return Ok(None);
        }
        entry.chunks.insert(fragment_offset, fragment_data.to_owned());
        entry.received_len += fragment_length;

        if entry.received_len < entry.datagram_size {
            return Ok(None);
        }

        let complete = self.pending.remove(&datagram_id).expect("just inserted above");
        let encoded: String = complete.chunks.into_values().collect();
        let decoded = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &encoded)
            .map_err(|e| FragmentError::InvalidBase64(e.to_string()))?;
        let value = serde_json::from_slice(&decoded)?;
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_fragments_reassemble_out_of_order() {
        let mut a = BinaryFragmentAssembler::new();
        let f0 = Fragment {
            sequence_begin: 10,
            sequence_end: 13,
            data: vec![1, 2],
        };
        let f2 = Fragment {
            sequence_begin: 10,
            sequence_end: 13,
            data: vec![5, 6],
        };
        let f1 = Fragment {
            sequence_begin: 10,
            sequence_end: 13,
            data: vec![3, 4],
        };
        assert_eq!(a.add(12, f2), None);
        assert_eq!(a.add(10, f0), None);
        assert_eq!(a.add(11, f1), Some(vec![1, 2, 3, 4, 5, 6]));
    }

    #[test]
    fn json_fragments_reassemble_and_dedup_offsets() {
        let mut a = JsonFragmentAssembler::new();
        let payload = serde_json::json!({"hello": "world"});
        let full = serde_json::to_vec(&payload).unwrap();
        let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &full);
        let mid = encoded.len() / 2;
        let (first, second) = encoded.split_at(mid);

        assert!(a
            .add(1, encoded.len() as u32, 0, first.len() as u32, first)
            .unwrap()
            .is_none());
        // duplicate of the first chunk is a no-op
        assert!(a
            .add(1, encoded.len() as u32, 0, first.len() as u32, first)
            .unwrap()
            .is_none());
        let result = a
            .add(1, encoded.len() as u32, mid as u32, second.len() as u32, second)
            .unwrap();
        assert_eq!(result, Some(payload));
    }
}
