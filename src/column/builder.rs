use std::marker::PhantomData;

use super::{Scalar, TypedColumnBuffer};
use crate::error::EncodeError;
use crate::types::{timestamp_to_i64, ColumnKind, ColumnType, ColumnValue, Precision};

/// Grows a row capacity to the next power of two covering `len + additional`.
fn grown_capacity(capacity: usize, len: usize, additional: usize) -> Option<usize> {
    let needed = len + additional;
    (needed > capacity).then(|| needed.next_power_of_two())
}

fn check_null_mask(values: usize, mask: &[bool]) -> Result<(), EncodeError> {
    if !mask.is_empty() && mask.len() != values {
        return Err(EncodeError::NullMaskLength {
            values,
            mask: mask.len(),
        });
    }
    Ok(())
}

/// Appends fixed-width values of type `T` to a [`TypedColumnBuffer`].
#[derive(Debug, Clone)]
pub struct FixedColumnBuilder<T: Scalar> {
    buf: TypedColumnBuffer,
    capacity: usize,
    _marker: PhantomData<T>,
}

impl<T: Scalar> Default for FixedColumnBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar> FixedColumnBuilder<T> {
    pub fn new() -> Self {
        Self {
            buf: TypedColumnBuffer::new(T::KIND),
            capacity: 0,
            _marker: PhantomData,
        }
    }

    /// Builder storing `T` under another kind of the same width
    /// (timestamps are `i64` values tagged [`ColumnKind::Timestamp`]).
    pub fn with_kind(kind: ColumnKind) -> Result<Self, EncodeError> {
        if kind.fixed_width() != T::WIDTH {
            return Err(EncodeError::TypeMismatch {
                column: 0,
                row: 0,
                expected: kind,
                actual: T::KIND,
            });
        }
        Ok(Self {
            buf: TypedColumnBuffer::new(kind),
            capacity: 0,
            _marker: PhantomData,
        })
    }

    pub fn with_capacity(rows: usize) -> Self {
        let mut builder = Self::new();
        builder.reserve(rows);
        builder
    }

    pub fn len(&self) -> usize {
        self.buf.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Rows that fit without another allocation.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn reserve(&mut self, additional: usize) {
        if let Some(capacity) = grown_capacity(self.capacity, self.len(), additional) {
            self.buf.reserve_rows(capacity);
            self.buf.data_mut().reserve_total(capacity * T::WIDTH);
            self.capacity = capacity;
        }
    }

    pub fn append(&mut self, value: T) {
        self.reserve(1);
        value.write_le(self.buf.data_mut().alloc(T::WIDTH));
        self.buf.commit_row(false, 0);
    }

    pub fn append_null(&mut self) {
        self.reserve(1);
        self.buf.data_mut().alloc(T::WIDTH);
        self.buf.commit_row(true, 0);
    }

    pub fn append_option(&mut self, value: Option<T>) {
        match value {
            Some(v) => self.append(v),
            None => self.append_null(),
        }
    }

    /// Bulk append. An empty `null_mask` means no nulls; otherwise it must
    /// have one entry per value.
    pub fn append_many(&mut self, values: &[T], null_mask: &[bool]) -> Result<(), EncodeError> {
        check_null_mask(values.len(), null_mask)?;
        self.reserve(values.len());
        for (i, &value) in values.iter().enumerate() {
            if null_mask.get(i).copied().unwrap_or(false) {
                self.append_null();
            } else {
                self.append(value);
            }
        }
        Ok(())
    }

    pub fn get(&self, row: usize) -> Option<T> {
        self.buf.value::<T>(row).ok().flatten()
    }

    pub fn value_bytes_length(&self) -> usize {
        self.buf.value_bytes_length()
    }

    pub fn finish(self) -> TypedColumnBuffer {
        self.buf
    }
}

/// Appends variable-length payloads (binary, varbinary, nchar, json, geometry).
///
/// NCHAR payloads are stored UTF-32LE expanded, four bytes per code point,
/// which is the layout raw blocks carry.
#[derive(Debug, Clone)]
pub struct VarColumnBuilder {
    buf: TypedColumnBuffer,
    capacity: usize,
}

impl VarColumnBuilder {
    /// Returns `None` for fixed-width kinds.
    pub fn new(kind: ColumnKind) -> Option<Self> {
        kind.is_var_len().then(|| Self {
            buf: TypedColumnBuffer::new(kind),
            capacity: 0,
        })
    }

    pub fn kind(&self) -> ColumnKind {
        self.buf.kind()
    }

    pub fn len(&self) -> usize {
        self.buf.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn reserve(&mut self, additional: usize) {
        if let Some(capacity) = grown_capacity(self.capacity, self.len(), additional) {
            self.buf.reserve_rows(capacity);
            self.capacity = capacity;
        }
    }

    /// Appends one payload. NCHAR columns only accept valid UTF-8.
    pub fn append(&mut self, value: &[u8]) -> Result<(), EncodeError> {
        if self.kind() == ColumnKind::NChar {
            let text = std::str::from_utf8(value)
                .map_err(|_| EncodeError::InvalidUtf8 { row: self.len() })?;
            self.append_str(text);
            return Ok(());
        }
        self.append_bytes(value);
        Ok(())
    }

    pub fn append_str(&mut self, value: &str) {
        if self.kind() != ColumnKind::NChar {
            self.append_bytes(value.as_bytes());
            return;
        }
        self.reserve(1);
        let chars = value.chars().count();
        let dst = self.buf.data_mut().alloc(chars * 4);
        for (slot, ch) in dst.chunks_exact_mut(4).zip(value.chars()) {
            (ch as u32).write_le(slot);
        }
        self.buf.commit_row(false, (chars * 4) as i32);
    }

    pub fn append_null(&mut self) {
        self.reserve(1);
        self.buf.commit_row(true, 0);
    }

    fn append_bytes(&mut self, value: &[u8]) {
        self.reserve(1);
        self.buf.data_mut().extend_from_slice(value);
        self.buf.commit_row(false, value.len() as i32);
    }

    pub fn append_many<V: AsRef<[u8]>>(
        &mut self,
        values: &[V],
        null_mask: &[bool],
    ) -> Result<(), EncodeError> {
        check_null_mask(values.len(), null_mask)?;
        self.reserve(values.len());
        for (i, value) in values.iter().enumerate() {
            if null_mask.get(i).copied().unwrap_or(false) {
                self.append_null();
            } else {
                self.append(value.as_ref())?;
            }
        }
        Ok(())
    }

    /// The `BufferLengths` array: one entry per row, `0` for nulls.
    pub fn lengths(&self) -> &[i32] {
        self.buf.lengths().unwrap_or(&[])
    }

    pub fn value_bytes_length(&self) -> usize {
        self.buf.value_bytes_length()
    }

    pub fn finish(self) -> TypedColumnBuffer {
        self.buf
    }
}

/// Builder chosen from a [`ColumnType`] at runtime, fed with dynamically
/// typed [`ColumnValue`]s.
#[derive(Debug, Clone)]
pub enum AnyColumnBuilder {
    Bool(FixedColumnBuilder<bool>),
    TinyInt(FixedColumnBuilder<i8>),
    SmallInt(FixedColumnBuilder<i16>),
    Int(FixedColumnBuilder<i32>),
    BigInt(FixedColumnBuilder<i64>),
    UTinyInt(FixedColumnBuilder<u8>),
    USmallInt(FixedColumnBuilder<u16>),
    UInt(FixedColumnBuilder<u32>),
    UBigInt(FixedColumnBuilder<u64>),
    Float(FixedColumnBuilder<f32>),
    Double(FixedColumnBuilder<f64>),
    Timestamp(FixedColumnBuilder<i64>, Precision),
    Var(VarColumnBuilder),
}

impl AnyColumnBuilder {
    pub fn for_type(ty: &ColumnType, rows: usize) -> Self {
        use ColumnKind as K;
        let mut builder = match ty.kind {
            K::Bool => Self::Bool(FixedColumnBuilder::new()),
            K::TinyInt => Self::TinyInt(FixedColumnBuilder::new()),
            K::SmallInt => Self::SmallInt(FixedColumnBuilder::new()),
            K::Int => Self::Int(FixedColumnBuilder::new()),
            K::BigInt => Self::BigInt(FixedColumnBuilder::new()),
            K::UTinyInt => Self::UTinyInt(FixedColumnBuilder::new()),
            K::USmallInt => Self::USmallInt(FixedColumnBuilder::new()),
            K::UInt => Self::UInt(FixedColumnBuilder::new()),
            K::UBigInt => Self::UBigInt(FixedColumnBuilder::new()),
            K::Float => Self::Float(FixedColumnBuilder::new()),
            K::Double => Self::Double(FixedColumnBuilder::new()),
            K::Timestamp => Self::Timestamp(
                FixedColumnBuilder {
                    buf: TypedColumnBuffer::new(K::Timestamp),
                    capacity: 0,
                    _marker: PhantomData,
                },
                ty.precision,
            ),
            K::Binary | K::VarBinary | K::NChar | K::Json | K::Geometry => Self::Var(VarColumnBuilder {
                buf: TypedColumnBuffer::new(ty.kind),
                capacity: 0,
            }),
        };
        builder.reserve(rows);
        builder
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            Self::Bool(_) => ColumnKind::Bool,
            Self::TinyInt(_) => ColumnKind::TinyInt,
            Self::SmallInt(_) => ColumnKind::SmallInt,
            Self::Int(_) => ColumnKind::Int,
            Self::BigInt(_) => ColumnKind::BigInt,
            Self::UTinyInt(_) => ColumnKind::UTinyInt,
            Self::USmallInt(_) => ColumnKind::USmallInt,
            Self::UInt(_) => ColumnKind::UInt,
            Self::UBigInt(_) => ColumnKind::UBigInt,
            Self::Float(_) => ColumnKind::Float,
            Self::Double(_) => ColumnKind::Double,
            Self::Timestamp(..) => ColumnKind::Timestamp,
            Self::Var(b) => b.kind(),
        }
    }

    fn reserve(&mut self, rows: usize) {
        match self {
            Self::Bool(b) => b.reserve(rows),
            Self::TinyInt(b) => b.reserve(rows),
            Self::SmallInt(b) => b.reserve(rows),
            Self::Int(b) => b.reserve(rows),
            Self::BigInt(b) => b.reserve(rows),
            Self::UTinyInt(b) => b.reserve(rows),
            Self::USmallInt(b) => b.reserve(rows),
            Self::UInt(b) => b.reserve(rows),
            Self::UBigInt(b) => b.reserve(rows),
            Self::Float(b) => b.reserve(rows),
            Self::Double(b) => b.reserve(rows),
            Self::Timestamp(b, _) => b.reserve(rows),
            Self::Var(b) => b.reserve(rows),
        }
    }

    fn append_null(&mut self) {
        match self {
            Self::Bool(b) => b.append_null(),
            Self::TinyInt(b) => b.append_null(),
            Self::SmallInt(b) => b.append_null(),
            Self::Int(b) => b.append_null(),
            Self::BigInt(b) => b.append_null(),
            Self::UTinyInt(b) => b.append_null(),
            Self::USmallInt(b) => b.append_null(),
            Self::UInt(b) => b.append_null(),
            Self::UBigInt(b) => b.append_null(),
            Self::Float(b) => b.append_null(),
            Self::Double(b) => b.append_null(),
            Self::Timestamp(b, _) => b.append_null(),
            Self::Var(b) => b.append_null(),
        }
    }

    /// Appends one dynamically typed value, checking it against the column
    /// kind. `column` and `row` only label the error.
    pub fn push(&mut self, value: &ColumnValue, column: usize, row: usize) -> Result<(), EncodeError> {
        use ColumnValue as V;
        let expected = self.kind();
        match (self, value) {
            (builder, V::Null) => builder.append_null(),
            (Self::Bool(b), V::Bool(v)) => b.append(*v),
            (Self::TinyInt(b), V::TinyInt(v)) => b.append(*v),
            (Self::SmallInt(b), V::SmallInt(v)) => b.append(*v),
            (Self::Int(b), V::Int(v)) => b.append(*v),
            (Self::BigInt(b), V::BigInt(v)) => b.append(*v),
            (Self::UTinyInt(b), V::UTinyInt(v)) => b.append(*v),
            (Self::USmallInt(b), V::USmallInt(v)) => b.append(*v),
            (Self::UInt(b), V::UInt(v)) => b.append(*v),
            (Self::UBigInt(b), V::UBigInt(v)) => b.append(*v),
            (Self::Float(b), V::Float(v)) => b.append(*v),
            (Self::Double(b), V::Double(v)) => b.append(*v),
            (Self::Timestamp(b, precision), V::Timestamp(ts)) => {
                b.append(timestamp_to_i64(ts, *precision)?)
            }
            (Self::Var(b), V::NChar(s)) if b.kind() == ColumnKind::NChar => b.append_str(s),
            (Self::Var(b), V::Json(s)) if b.kind() == ColumnKind::Json => b.append_str(s),
            (Self::Var(b), V::Binary(v)) if b.kind() == ColumnKind::Binary => b.append(v)?,
            (Self::Var(b), V::VarBinary(v)) if b.kind() == ColumnKind::VarBinary => b.append(v)?,
            (Self::Var(b), V::Geometry(v)) if b.kind() == ColumnKind::Geometry => b.append(v)?,
            (_, other) => {
                return Err(EncodeError::TypeMismatch {
                    column,
                    row,
                    expected,
                    actual: other.kind().unwrap_or(expected),
                })
            }
        }
        Ok(())
    }

    pub fn value_bytes_length(&self) -> usize {
        match self {
            Self::Bool(b) => b.value_bytes_length(),
            Self::TinyInt(b) => b.value_bytes_length(),
            Self::SmallInt(b) => b.value_bytes_length(),
            Self::Int(b) => b.value_bytes_length(),
            Self::BigInt(b) => b.value_bytes_length(),
            Self::UTinyInt(b) => b.value_bytes_length(),
            Self::USmallInt(b) => b.value_bytes_length(),
            Self::UInt(b) => b.value_bytes_length(),
            Self::UBigInt(b) => b.value_bytes_length(),
            Self::Float(b) => b.value_bytes_length(),
            Self::Double(b) => b.value_bytes_length(),
            Self::Timestamp(b, _) => b.value_bytes_length(),
            Self::Var(b) => b.value_bytes_length(),
        }
    }

    pub fn finish(self) -> TypedColumnBuffer {
        match self {
            Self::Bool(b) => b.finish(),
            Self::TinyInt(b) => b.finish(),
            Self::SmallInt(b) => b.finish(),
            Self::Int(b) => b.finish(),
            Self::BigInt(b) => b.finish(),
            Self::UTinyInt(b) => b.finish(),
            Self::USmallInt(b) => b.finish(),
            Self::UInt(b) => b.finish(),
            Self::UBigInt(b) => b.finish(),
            Self::Float(b) => b.finish(),
            Self::Double(b) => b.finish(),
            Self::Timestamp(b, _) => b.finish(),
            Self::Var(b) => b.finish(),
        }
    }
}
