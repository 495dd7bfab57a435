//! Bounds-checked byte storage with typed accessors.
//!
//! Encoders never cast pointers into these buffers; every typed read or write
//! goes through an offset computation that is checked against the committed
//! length and reported as [`EncodeError::OutOfBounds`] on overrun.

use byteorder::{ByteOrder, LittleEndian};

use super::Scalar;
use crate::error::EncodeError;

/// Growable byte region owned by one column buffer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ByteArena {
    bytes: Vec<u8>,
}

impl ByteArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    /// Committed bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    /// Ensures room for at least `min_capacity` bytes, growing to the next
    /// power of two. Never shrinks.
    pub fn reserve_total(&mut self, min_capacity: usize) {
        if min_capacity > self.bytes.capacity() {
            let target = min_capacity.next_power_of_two();
            self.bytes.reserve_exact(target - self.bytes.len());
        }
    }

    /// Commits `len` zeroed bytes and returns them for writing.
    pub fn alloc(&mut self, len: usize) -> &mut [u8] {
        let start = self.bytes.len();
        self.reserve_total(start + len);
        self.bytes.resize(start + len, 0);
        &mut self.bytes[start..]
    }

    pub fn extend_from_slice(&mut self, data: &[u8]) {
        self.reserve_total(self.bytes.len() + data.len());
        self.bytes.extend_from_slice(data);
    }

    /// Writes `value` into slot `slot` of a `T`-typed view of the arena.
    pub fn write<T: Scalar>(&mut self, slot: usize, value: T) -> Result<(), EncodeError> {
        let range = self.slot_range::<T>(slot)?;
        value.write_le(&mut self.bytes[range]);
        Ok(())
    }

    /// Reads slot `slot` of a `T`-typed view of the arena.
    pub fn read<T: Scalar>(&self, slot: usize) -> Result<T, EncodeError> {
        let range = self.slot_range::<T>(slot)?;
        Ok(T::read_le(&self.bytes[range]))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    fn slot_range<T: Scalar>(&self, slot: usize) -> Result<std::ops::Range<usize>, EncodeError> {
        let offset = slot * T::WIDTH;
        let end = offset + T::WIDTH;
        if end > self.bytes.len() {
            return Err(EncodeError::OutOfBounds {
                offset,
                len: T::WIDTH,
                capacity: self.bytes.len(),
            });
        }
        Ok(offset..end)
    }
}

/// Sequential little-endian writer over a pre-sized output buffer.
///
/// Payload sizes are computed up front; the writer then fills the buffer and
/// turns any miscalculation into an error instead of a panic.
pub struct ByteWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> ByteWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn skip(&mut self, len: usize) -> Result<(), EncodeError> {
        self.take(len).map(|_| ())
    }

    pub fn put_u8(&mut self, v: u8) -> Result<(), EncodeError> {
        self.take(1)?[0] = v;
        Ok(())
    }

    pub fn put_u16(&mut self, v: u16) -> Result<(), EncodeError> {
        LittleEndian::write_u16(self.take(2)?, v);
        Ok(())
    }

    pub fn put_u32(&mut self, v: u32) -> Result<(), EncodeError> {
        LittleEndian::write_u32(self.take(4)?, v);
        Ok(())
    }

    pub fn put_i32(&mut self, v: i32) -> Result<(), EncodeError> {
        LittleEndian::write_i32(self.take(4)?, v);
        Ok(())
    }

    pub fn put_u64(&mut self, v: u64) -> Result<(), EncodeError> {
        LittleEndian::write_u64(self.take(8)?, v);
        Ok(())
    }

    pub fn put_i64(&mut self, v: i64) -> Result<(), EncodeError> {
        LittleEndian::write_i64(self.take(8)?, v);
        Ok(())
    }

    pub fn put_bytes(&mut self, data: &[u8]) -> Result<(), EncodeError> {
        self.take(data.len())?.copy_from_slice(data);
        Ok(())
    }

    /// Overwrites a `u32` at an absolute offset without moving the cursor.
    pub fn patch_u32(&mut self, at: usize, v: u32) -> Result<(), EncodeError> {
        if at + 4 > self.buf.len() {
            return Err(self.overrun(at, 4));
        }
        LittleEndian::write_u32(&mut self.buf[at..at + 4], v);
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&mut [u8], EncodeError> {
        let start = self.pos;
        let end = start + len;
        if end > self.buf.len() {
            return Err(self.overrun(start, len));
        }
        self.pos = end;
        Ok(&mut self.buf[start..end])
    }

    fn overrun(&self, offset: usize, len: usize) -> EncodeError {
        EncodeError::OutOfBounds {
            offset,
            len,
            capacity: self.buf.len(),
        }
    }
}
