//! Big-endian primitive, `SGString`, and UUID helpers shared by every
//! packet codec in this crate.
//!
//! `SGString` is a length-prefixed, NUL-terminated UTF-8 string: a
//! 16-bit big-endian length that counts the terminator, followed by
//! `length - 1` bytes of UTF-8, followed by the NUL byte itself. UUIDs
//! are 16 raw big-endian bytes on the wire but render as upper-case
//! hyphenated strings in the JSON/text payloads that also carry them.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Write};
use uuid::Uuid;

use crate::{CodecError, CodecResult as Result};

/// A cursor over a byte slice with big-endian primitive readers that
/// return typed [`CodecError`]s instead of panicking on short input.
pub struct Reader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    pub fn remaining(&self) -> usize {
        let pos = self.cursor.position() as usize;
        self.cursor.get_ref().len().saturating_sub(pos)
    }

    fn need(&self, n: usize) -> Result<()> {
        if self.remaining() < n {
            Err(CodecError::Truncated {
                needed: n - self.remaining(),
            })
        } else {
            Ok(())
        }
    }

    pub fn u8(&mut self) -> Result<u8> {
        self.need(1)?;
        Ok(self.cursor.read_u8().expect("length checked above"))
    }

    pub fn i8(&mut self) -> Result<i8> {
        self.need(1)?;
        Ok(self.cursor.read_i8().expect("length checked above"))
    }

    pub fn u16(&mut self) -> Result<u16> {
        self.need(2)?;
        Ok(self.cursor.read_u16::<BigEndian>().expect("length checked above"))
    }

    pub fn i16(&mut self) -> Result<i16> {
        self.need(2)?;
        Ok(self.cursor.read_i16::<BigEndian>().expect("length checked above"))
    }

    pub fn u32(&mut self) -> Result<u32> {
        self.need(4)?;
        Ok(self.cursor.read_u32::<BigEndian>().expect("length checked above"))
    }

    pub fn i32(&mut self) -> Result<i32> {
        self.need(4)?;
        Ok(self.cursor.read_i32::<BigEndian>().expect("length checked above"))
    }

    pub fn u64(&mut self) -> Result<u64> {
        self.need(8)?;
        Ok(self.cursor.read_u64::<BigEndian>().expect("length checked above"))
    }

    pub fn f32(&mut self) -> Result<f32> {
        self.need(4)?;
        Ok(self.cursor.read_f32::<BigEndian>().expect("length checked above"))
    }

    pub fn bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        self.need(n)?;
        let mut buf = vec![0u8; n];
        std::io::Read::read_exact(&mut self.cursor, &mut buf).expect("length checked above");
        Ok(buf)
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.need(N)?;
        let mut buf = [0u8; N];
        std::io::Read::read_exact(&mut self.cursor, &mut buf).expect("length checked above");
        Ok(buf)
    }

    pub fn rest(&mut self) -> Vec<u8> {
        let n = self.remaining();
        self.bytes(n).expect("remaining bytes always readable")
    }

    /// Read an `SGString`: u16 length (including the NUL terminator),
    /// `length - 1` bytes of UTF-8, then the NUL byte.
    pub fn sgstring(&mut self) -> Result<String> {
        let len = self.u16()? as usize;
        if len == 0 {
            return Err(CodecError::StringNotTerminated);
        }
        let body = self.bytes(len - 1)?;
        let terminator = self.u8()?;
        if terminator != 0 {
            return Err(CodecError::StringNotTerminated);
        }
        String::from_utf8(body).map_err(|_| CodecError::InvalidUtf8)
    }

    /// Read a UUID as 16 raw big-endian bytes.
    pub fn uuid(&mut self) -> Result<Uuid> {
        let bytes: [u8; 16] = self.array()?;
        Ok(Uuid::from_bytes(bytes))
    }

    /// Read a `u16`-prefixed array of elements via `read_elem`.
    pub fn prefixed_array_u16<T>(&mut self, mut read_elem: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        let count = self.u16()? as usize;
        (0..count).map(|_| read_elem(self)).collect()
    }

    /// Read a `u32`-prefixed array of elements via `read_elem`.
    pub fn prefixed_array_u32<T>(&mut self, mut read_elem: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        let count = self.u32()? as usize;
        (0..count).map(|_| read_elem(self)).collect()
    }

    /// Fail if any bytes remain — used for fixed-shape payloads that
    /// should exactly exhaust their input.
    pub fn expect_exhausted(&self) -> Result<()> {
        let n = self.remaining();
        if n != 0 {
            Err(CodecError::TrailingBytes(n))
        } else {
            Ok(())
        }
    }
}

/// An append-only, big-endian byte writer.
#[derive(Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.write_u8(v).expect("Vec<u8> writes are infallible");
        self
    }

    pub fn i8(&mut self, v: i8) -> &mut Self {
        self.buf.write_i8(v).expect("Vec<u8> writes are infallible");
        self
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.buf.write_u16::<BigEndian>(v).expect("Vec<u8> writes are infallible");
        self
    }

    pub fn i16(&mut self, v: i16) -> &mut Self {
        self.buf.write_i16::<BigEndian>(v).expect("Vec<u8> writes are infallible");
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.buf.write_u32::<BigEndian>(v).expect("Vec<u8> writes are infallible");
        self
    }

    pub fn i32(&mut self, v: i32) -> &mut Self {
        self.buf.write_i32::<BigEndian>(v).expect("Vec<u8> writes are infallible");
        self
    }

    pub fn u64(&mut self, v: u64) -> &mut Self {
        self.buf.write_u64::<BigEndian>(v).expect("Vec<u8> writes are infallible");
        self
    }

    pub fn f32(&mut self, v: f32) -> &mut Self {
        self.buf.write_f32::<BigEndian>(v).expect("Vec<u8> writes are infallible");
        self
    }

    pub fn bytes(&mut self, v: &[u8]) -> &mut Self {
        self.buf.write_all(v).expect("Vec<u8> writes are infallible");
        self
    }

    /// Write `s` as an `SGString`: u16 length (including NUL), UTF-8
    /// bytes, then a NUL terminator.
    pub fn sgstring(&mut self, s: &str) -> &mut Self {
        let body = s.as_bytes();
        self.u16((body.len() + 1) as u16);
        self.bytes(body);
        self.u8(0);
        self
    }

    /// Write a UUID as 16 raw big-endian bytes.
    pub fn uuid(&mut self, id: &Uuid) -> &mut Self {
        self.bytes(id.as_bytes());
        self
    }

    /// Write a `u16`-prefixed array, invoking `write_elem` once per item.
    pub fn prefixed_array_u16<T>(&mut self, items: &[T], mut write_elem: impl FnMut(&mut Self, &T)) -> &mut Self {
        self.u16(items.len() as u16);
        for item in items {
            write_elem(self, item);
        }
        self
    }

    /// Write a `u32`-prefixed array, invoking `write_elem` once per item.
    pub fn prefixed_array_u32<T>(&mut self, items: &[T], mut write_elem: impl FnMut(&mut Self, &T)) -> &mut Self {
        self.u32(items.len() as u32);
        for item in items {
            write_elem(self, item);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sgstring_roundtrip() {
        let mut w = Writer::new();
        w.sgstring("hello");
        let bytes = w.into_bytes();
        assert_eq!(bytes, [0x00, 0x06, b'h', b'e', b'l', b'l', b'o', 0x00]);
        let mut r = Reader::new(&bytes);
        assert_eq!(r.sgstring().unwrap(), "hello");
        r.expect_exhausted().unwrap();
    }

    #[test]
    fn sgstring_empty_is_just_terminator() {
        let mut w = Writer::new();
        w.sgstring("");
        let bytes = w.into_bytes();
        assert_eq!(bytes, [0x00, 0x01, 0x00]);
        let mut r = Reader::new(&bytes);
        assert_eq!(r.sgstring().unwrap(), "");
    }

    #[test]
    fn sgstring_rejects_missing_terminator() {
        let bytes = [0x00, 0x02, b'x', 0x01];
        let mut r = Reader::new(&bytes);
        assert!(r.sgstring().is_err());
    }

    #[test]
    fn uuid_roundtrip() {
        let id = Uuid::from_bytes([0x42; 16]);
        let mut w = Writer::new();
        w.uuid(&id);
        let bytes = w.into_bytes();
        assert_eq!(bytes.len(), 16);
        let mut r = Reader::new(&bytes);
        assert_eq!(r.uuid().unwrap(), id);
    }

    #[test]
    fn truncated_read_reports_needed_bytes() {
        let bytes = [0x00u8];
        let mut r = Reader::new(&bytes);
        let err = r.u16().unwrap_err();
        assert!(matches!(err, CodecError::Truncated { needed: 1 }));
    }

    #[test]
    fn prefixed_array_roundtrip() {
        let mut w = Writer::new();
        w.prefixed_array_u16(&[1u32, 2, 3], |w, v| {
            w.u32(*v);
        });
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        let items: Vec<u32> = r.prefixed_array_u16(|r| r.u32()).unwrap();
        assert_eq!(items, vec![1, 2, 3]);
    }
}
