//! Cell values

use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;

/// Raw value of a cell
///
/// An empty value reads as null, which is why the lock writes a one byte
/// sentinel rather than an empty buffer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CellValue(Bytes);

impl CellValue {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }

    /// The "present" marker written to entering and ticket cells
    pub fn sentinel() -> Self {
        Self(Bytes::from_static(&[1]))
    }

    pub fn from_u32(value: u32) -> Self {
        let mut buf = [0u8; 4];
        BigEndian::write_u32(&mut buf, value);
        Self(Bytes::copy_from_slice(&buf))
    }

    /// Big-endian u32 stored in the first four bytes, if any
    pub fn as_u32(&self) -> Option<u32> {
        if self.0.len() < 4 {
            return None;
        }
        Some(BigEndian::read_u32(&self.0[..4]))
    }

    pub fn is_null(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl From<&'static str> for CellValue {
    fn from(value: &'static str) -> Self {
        Self(Bytes::from_static(value.as_bytes()))
    }
}

impl From<Vec<u8>> for CellValue {
    fn from(value: Vec<u8>) -> Self {
        Self(Bytes::from(value))
    }
}
