//! Binary state reader.

use super::Persist;
use crate::error::{Result, RxError};

/// Cursor over state bytes, read in the same order they were written.
#[derive(Clone, Debug)]
pub struct StateReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> StateReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Decode one value.
    pub fn read<T: Persist>(&mut self) -> Result<T> {
        T::restore(self)
    }

    /// Length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_len()?;
        let bytes = self.read_raw(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| RxError::InvalidFormat(format!("string is not UTF-8: {}", e)))
    }

    /// Length-prefixed opaque bytes.
    pub fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_len()?;
        self.read_raw(len)
    }

    /// `u32` length/count prefix.
    pub fn read_len(&mut self) -> Result<usize> {
        let bytes = self.read_array::<4>()?;
        Ok(u32::from_le_bytes(bytes) as usize)
    }

    /// Exactly `len` unframed bytes.
    pub fn read_raw(&mut self, len: usize) -> Result<&'a [u8]> {
        let remaining = self.remaining();
        if len > remaining {
            return Err(RxError::UnexpectedEnd {
                needed: len,
                remaining,
            });
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Fixed-size array of unframed bytes.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_raw(N)?);
        Ok(out)
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    pub fn position(&self) -> usize {
        self.pos
    }
}
