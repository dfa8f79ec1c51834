//! Typed binary codec for operator state.
//!
//! The codec does not describe itself: an operator's save and load code is
//! the schema, and both sides must read and write the same fields in the same
//! order.
//!
//! # Layout
//!
//! - Integers and floats are fixed width, little-endian. `usize` is written
//!   as `u64`; `char` as its `u32` scalar value.
//! - `bool` is one byte, `0` or `1`.
//! - Strings are a `u32` byte length followed by UTF-8.
//! - `Option<T>` is a tag byte (`0` none, `1` some) followed by the value.
//! - `Vec<T>` and `VecDeque<T>` are a `u32` element count followed by the
//!   elements.
//! - Tuples write their fields in order.
//!
//! Structured records implement [`Persist`] by writing their fields one after
//! another.

mod reader;
mod writer;

pub use reader::StateReader;
pub use writer::StateWriter;

use crate::error::{Result, RxError};
use crate::types::Version;
use std::collections::VecDeque;

/// A value that can be written to and read back from operator state.
pub trait Persist: Sized {
    fn persist(&self, writer: &mut StateWriter);

    fn restore(reader: &mut StateReader<'_>) -> Result<Self>;
}

macro_rules! persist_number {
    ($($t:ty),* $(,)?) => {
        $(
            impl Persist for $t {
                fn persist(&self, writer: &mut StateWriter) {
                    writer.write_raw(&self.to_le_bytes());
                }

                fn restore(reader: &mut StateReader<'_>) -> Result<Self> {
                    let bytes = reader.read_array::<{ std::mem::size_of::<$t>() }>()?;
                    Ok(<$t>::from_le_bytes(bytes))
                }
            }
        )*
    };
}

persist_number!(i8, u8, i16, u16, i32, u32, i64, u64, i128, u128, f32, f64);

impl Persist for usize {
    fn persist(&self, writer: &mut StateWriter) {
        (*self as u64).persist(writer);
    }

    fn restore(reader: &mut StateReader<'_>) -> Result<Self> {
        let value = u64::restore(reader)?;
        usize::try_from(value)
            .map_err(|_| RxError::InvalidFormat(format!("{} does not fit in usize", value)))
    }
}

impl Persist for bool {
    fn persist(&self, writer: &mut StateWriter) {
        writer.write_raw(&[*self as u8]);
    }

    fn restore(reader: &mut StateReader<'_>) -> Result<Self> {
        match reader.read_array::<1>()?[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(RxError::InvalidFormat(format!("invalid bool byte {}", other))),
        }
    }
}

impl Persist for char {
    fn persist(&self, writer: &mut StateWriter) {
        (*self as u32).persist(writer);
    }

    fn restore(reader: &mut StateReader<'_>) -> Result<Self> {
        let scalar = u32::restore(reader)?;
        char::from_u32(scalar)
            .ok_or_else(|| RxError::InvalidFormat(format!("invalid char scalar {:#x}", scalar)))
    }
}

impl Persist for () {
    fn persist(&self, _writer: &mut StateWriter) {}

    fn restore(_reader: &mut StateReader<'_>) -> Result<Self> {
        Ok(())
    }
}

impl Persist for String {
    fn persist(&self, writer: &mut StateWriter) {
        writer.write_str(self);
    }

    fn restore(reader: &mut StateReader<'_>) -> Result<Self> {
        reader.read_string()
    }
}

impl<T: Persist> Persist for Option<T> {
    fn persist(&self, writer: &mut StateWriter) {
        match self {
            None => writer.write_raw(&[0]),
            Some(value) => {
                writer.write_raw(&[1]);
                value.persist(writer);
            }
        }
    }

    fn restore(reader: &mut StateReader<'_>) -> Result<Self> {
        match reader.read_array::<1>()?[0] {
            0 => Ok(None),
            1 => Ok(Some(T::restore(reader)?)),
            other => Err(RxError::InvalidFormat(format!("invalid option tag {}", other))),
        }
    }
}

impl<T: Persist> Persist for Vec<T> {
    fn persist(&self, writer: &mut StateWriter) {
        writer.write_len(self.len());
        for item in self {
            item.persist(writer);
        }
    }

    fn restore(reader: &mut StateReader<'_>) -> Result<Self> {
        let count = reader.read_len()?;
        // Preallocation is capped by the bytes actually available.
        let mut items = Vec::with_capacity(count.min(reader.remaining()));
        for _ in 0..count {
            items.push(T::restore(reader)?);
        }
        Ok(items)
    }
}

impl<T: Persist> Persist for VecDeque<T> {
    fn persist(&self, writer: &mut StateWriter) {
        writer.write_len(self.len());
        for item in self {
            item.persist(writer);
        }
    }

    fn restore(reader: &mut StateReader<'_>) -> Result<Self> {
        let count = reader.read_len()?;
        let mut items = VecDeque::with_capacity(count.min(reader.remaining()));
        for _ in 0..count {
            items.push_back(T::restore(reader)?);
        }
        Ok(items)
    }
}

impl<A: Persist, B: Persist> Persist for (A, B) {
    fn persist(&self, writer: &mut StateWriter) {
        self.0.persist(writer);
        self.1.persist(writer);
    }

    fn restore(reader: &mut StateReader<'_>) -> Result<Self> {
        Ok((A::restore(reader)?, B::restore(reader)?))
    }
}

impl<A: Persist, B: Persist, C: Persist> Persist for (A, B, C) {
    fn persist(&self, writer: &mut StateWriter) {
        self.0.persist(writer);
        self.1.persist(writer);
        self.2.persist(writer);
    }

    fn restore(reader: &mut StateReader<'_>) -> Result<Self> {
        Ok((A::restore(reader)?, B::restore(reader)?, C::restore(reader)?))
    }
}

impl Persist for Version {
    fn persist(&self, writer: &mut StateWriter) {
        self.major.persist(writer);
        self.minor.persist(writer);
        self.build.persist(writer);
        self.revision.persist(writer);
    }

    fn restore(reader: &mut StateReader<'_>) -> Result<Self> {
        Ok(Version::new(
            i32::restore(reader)?,
            i32::restore(reader)?,
            i32::restore(reader)?,
            i32::restore(reader)?,
        ))
    }
}
