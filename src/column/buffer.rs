use super::{ByteArena, Scalar};
use crate::error::EncodeError;
use crate::types::ColumnKind;

/// Values of one column plus a one-byte-per-row null map.
///
/// Fixed kinds store `rows * width` bytes with null slots zeroed. Variable
/// kinds store the non-null payloads back to back and keep a parallel
/// per-row length array (`0` for nulls).
#[derive(Debug, Clone, PartialEq)]
pub struct TypedColumnBuffer {
    kind: ColumnKind,
    rows: usize,
    nulls: Vec<u8>,
    lengths: Option<Vec<i32>>,
    data: ByteArena,
}

impl TypedColumnBuffer {
    pub(crate) fn new(kind: ColumnKind) -> Self {
        Self {
            kind,
            rows: 0,
            nulls: Vec::new(),
            lengths: kind.is_var_len().then(Vec::new),
            data: ByteArena::new(),
        }
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn is_null(&self, row: usize) -> bool {
        self.nulls.get(row).is_some_and(|&b| b == 1)
    }

    /// One byte per row, `1` marking a null.
    pub fn nulls(&self) -> &[u8] {
        &self.nulls
    }

    /// Per-row payload lengths; `None` for fixed kinds.
    pub fn lengths(&self) -> Option<&[i32]> {
        self.lengths.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_slice()
    }

    /// Bytes occupied by committed values, excluding the null map.
    pub fn value_bytes_length(&self) -> usize {
        self.data.len()
    }

    /// Reads a fixed-width value through a typed view of the data region.
    pub fn value<T: Scalar>(&self, row: usize) -> Result<Option<T>, EncodeError> {
        if row >= self.rows {
            return Err(EncodeError::OutOfBounds {
                offset: row,
                len: 1,
                capacity: self.rows,
            });
        }
        if self.is_null(row) {
            return Ok(None);
        }
        self.data.read::<T>(row).map(Some)
    }

    /// Walks variable-length payloads in row order.
    pub fn var_values(&self) -> VarValues<'_> {
        VarValues {
            buffer: self,
            row: 0,
            offset: 0,
        }
    }

    pub(crate) fn data_mut(&mut self) -> &mut ByteArena {
        &mut self.data
    }

    pub(crate) fn reserve_rows(&mut self, capacity: usize) {
        if capacity > self.nulls.capacity() {
            self.nulls.reserve_exact(capacity - self.nulls.len());
        }
        if let Some(lengths) = self.lengths.as_mut() {
            if capacity > lengths.capacity() {
                lengths.reserve_exact(capacity - lengths.len());
            }
        }
    }

    pub(crate) fn commit_row(&mut self, is_null: bool, length: i32) {
        self.nulls.push(is_null as u8);
        if let Some(lengths) = self.lengths.as_mut() {
            lengths.push(length);
        }
        self.rows += 1;
    }
}

/// Iterator over `Option<&[u8]>` payloads of a variable-length column.
pub struct VarValues<'a> {
    buffer: &'a TypedColumnBuffer,
    row: usize,
    offset: usize,
}

impl<'a> Iterator for VarValues<'a> {
    type Item = Option<&'a [u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.row >= self.buffer.rows {
            return None;
        }
        let row = self.row;
        self.row += 1;
        if self.buffer.is_null(row) {
            return Some(None);
        }
        let len = self.buffer.lengths.as_ref().map_or(0, |l| l[row] as usize);
        let start = self.offset;
        self.offset += len;
        Some(self.buffer.data.as_slice().get(start..start + len))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.buffer.rows - self.row;
        (left, Some(left))
    }
}
