//! Binary state writer.

use super::Persist;

/// Append-only buffer that operators write their state into.
#[derive(Clone, Debug, Default)]
pub struct StateWriter {
    buf: Vec<u8>,
}

impl StateWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode one value.
    pub fn write<T: Persist>(&mut self, value: &T) {
        value.persist(self);
    }

    /// Length-prefixed UTF-8 string.
    pub fn write_str(&mut self, value: &str) {
        self.write_len(value.len());
        self.write_raw(value.as_bytes());
    }

    /// Length-prefixed opaque bytes.
    pub fn write_bytes(&mut self, value: &[u8]) {
        self.write_len(value.len());
        self.write_raw(value);
    }

    /// `u32` length/count prefix.
    pub fn write_len(&mut self, len: usize) {
        debug_assert!(len <= u32::MAX as usize, "length {} exceeds u32", len);
        self.write_raw(&(len as u32).to_le_bytes());
    }

    /// Unframed bytes.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
