//! Checkpoint envelope framing.

use crate::codec::{StateReader, StateWriter};
use crate::error::{Result, RxError};
use crate::types::Version;

/// Magic bytes at the start of every checkpoint.
const CHECKPOINT_MAGIC: &[u8; 4] = b"RXC\0";

/// Current envelope format.
const CHECKPOINT_FORMAT: u8 = 1;

/// Block flag: the operator was disposed when the checkpoint was taken.
const FLAG_DISPOSED: u8 = 0b0000_0001;

/// Smallest valid envelope: magic, format, block count, crc.
const MIN_LEN: usize = 4 + 1 + 4 + 4;

/// Name and version at the start of every operator block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorHeader {
    pub name: String,
    pub version: Version,
}

impl OperatorHeader {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

/// Builds a checkpoint one operator block at a time.
#[derive(Debug, Default)]
pub struct CheckpointWriter {
    blocks: StateWriter,
    count: u32,
}

impl CheckpointWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block. `fields` writes the operator state; it is not called
    /// for disposed operators.
    pub fn write_block<F>(&mut self, header: &OperatorHeader, disposed: bool, fields: F)
    where
        F: FnOnce(&mut StateWriter),
    {
        let mut block = StateWriter::new();
        block.write(&if disposed { FLAG_DISPOSED } else { 0u8 });
        block.write_str(&header.name);
        block.write(&header.version);
        if !disposed {
            fields(&mut block);
        }

        tracing::trace!(
            operator = %header.name,
            version = %header.version,
            disposed,
            bytes = block.len(),
            "wrote checkpoint block"
        );
        self.blocks.write_bytes(block.as_bytes());
        self.count += 1;
    }

    pub fn block_count(&self) -> usize {
        self.count as usize
    }

    /// Seal the envelope.
    pub fn finish(self) -> Vec<u8> {
        let mut body = StateWriter::new();
        body.write(&CHECKPOINT_FORMAT);
        body.write(&self.count);
        body.write_raw(self.blocks.as_bytes());
        let checksum = crc32fast::hash(body.as_bytes());

        let mut out = Vec::with_capacity(CHECKPOINT_MAGIC.len() + body.len() + 4);
        out.extend_from_slice(CHECKPOINT_MAGIC);
        out.extend_from_slice(body.as_bytes());
        out.extend_from_slice(&checksum.to_le_bytes());
        out
    }
}

/// One decoded operator block.
#[derive(Debug)]
pub struct CheckpointBlock<'a> {
    pub header: OperatorHeader,
    pub disposed: bool,
    fields: &'a [u8],
}

impl<'a> CheckpointBlock<'a> {
    /// Reader over the operator's fields.
    pub fn fields(&self) -> StateReader<'a> {
        StateReader::new(self.fields)
    }
}

/// Validates an envelope and iterates its blocks.
#[derive(Debug)]
pub struct CheckpointReader<'a> {
    body: StateReader<'a>,
    count: usize,
    read: usize,
}

impl<'a> CheckpointReader<'a> {
    /// Check magic, checksum and format.
    pub fn open(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < MIN_LEN {
            return Err(RxError::InvalidFormat(format!(
                "checkpoint is {} bytes, shorter than the {} byte minimum",
                bytes.len(),
                MIN_LEN
            )));
        }
        if &bytes[..4] != CHECKPOINT_MAGIC {
            return Err(RxError::InvalidFormat("bad checkpoint magic".to_string()));
        }

        let (body, crc) = bytes[4..].split_at(bytes.len() - 8);
        let mut crc_bytes = [0u8; 4];
        crc_bytes.copy_from_slice(crc);
        let expected = u32::from_le_bytes(crc_bytes);
        let got = crc32fast::hash(body);
        if expected != got {
            return Err(RxError::ChecksumMismatch { expected, got });
        }

        let mut reader = StateReader::new(body);
        let format = reader.read::<u8>()?;
        if format != CHECKPOINT_FORMAT {
            return Err(RxError::InvalidFormat(format!(
                "unsupported checkpoint format {}",
                format
            )));
        }
        let count = reader.read::<u32>()? as usize;

        Ok(Self {
            body: reader,
            count,
            read: 0,
        })
    }

    pub fn block_count(&self) -> usize {
        self.count
    }

    /// Next block, or `None` once every block was read.
    pub fn next_block(&mut self) -> Result<Option<CheckpointBlock<'a>>> {
        if self.read == self.count {
            if !self.body.is_exhausted() {
                return Err(RxError::InvalidFormat(format!(
                    "{} bytes after the last checkpoint block",
                    self.body.remaining()
                )));
            }
            return Ok(None);
        }

        let bytes = self.body.read_bytes()?;
        let mut block = StateReader::new(bytes);
        let flags = block.read::<u8>()?;
        let name = block.read_string()?;
        let version = block.read::<Version>()?;
        if !version.is_valid() {
            return Err(RxError::InvalidFormat(format!(
                "operator `{}` has invalid version {}",
                name, version
            )));
        }
        self.read += 1;

        let disposed = flags & FLAG_DISPOSED != 0;
        let fields = block.read_raw(block.remaining())?;
        tracing::trace!(operator = %name, %version, disposed, "read checkpoint block");

        Ok(Some(CheckpointBlock {
            header: OperatorHeader { name, version },
            disposed,
            fields,
        }))
    }
}
