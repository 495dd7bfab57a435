use std::borrow::Borrow;

use byteorder::{ByteOrder, LittleEndian};

use crate::column::{AnyColumnBuilder, ByteWriter, TypedColumnBuffer};
use crate::error::EncodeError;
use crate::types::{ColumnType, Param};

pub const RAW_BLOCK_VERSION: u32 = 1;
/// version(4) + total_length(4) + rows(4) + columns(4) + flag_segment(4) + group_id(8)
pub const RAW_BLOCK_HEADER_LEN: usize = 28;
/// type(1) + width(4)
const COLUMN_DESCRIPTOR_LEN: usize = 5;
const COLUMN_LENGTH_LEN: usize = 4;
/// Variable payloads are prefixed by a `u16` length.
const VAR_PREFIX_LEN: usize = 2;
const VAR_NULL_OFFSET: i32 = -1;

pub fn bitmap_len(rows: usize) -> usize {
    rows.div_ceil(8)
}

/// Fixed fields of a raw block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawBlockHeader {
    pub version: u32,
    pub length: u32,
    pub rows: u32,
    pub columns: u32,
    pub flag_segment: u32,
    pub group_id: u64,
}

impl RawBlockHeader {
    pub fn parse(block: &[u8]) -> Option<Self> {
        if block.len() < RAW_BLOCK_HEADER_LEN {
            return None;
        }
        Some(Self {
            version: LittleEndian::read_u32(&block[0..4]),
            length: LittleEndian::read_u32(&block[4..8]),
            rows: LittleEndian::read_u32(&block[8..12]),
            columns: LittleEndian::read_u32(&block[12..16]),
            flag_segment: LittleEndian::read_u32(&block[16..20]),
            group_id: LittleEndian::read_u64(&block[20..28]),
        })
    }
}

/// Per-column sizes computed before anything is written.
struct ColumnLayout {
    /// Value carried in the header's length array.
    payload_len: usize,
    /// Bytes the column's data segment occupies.
    segment_len: usize,
}

fn layout_of(column: &TypedColumnBuffer) -> Result<ColumnLayout, EncodeError> {
    let rows = column.rows();
    let width = column.kind().fixed_width();
    if width > 0 {
        let payload_len = width * rows;
        return Ok(ColumnLayout {
            payload_len,
            segment_len: bitmap_len(rows) + payload_len,
        });
    }

    let mut payload_len = 0;
    for value in column.var_values().flatten() {
        if value.len() > u16::MAX as usize {
            return Err(EncodeError::ValueTooLong {
                len: value.len(),
                max: u16::MAX as usize,
            });
        }
        payload_len += VAR_PREFIX_LEN + value.len();
    }
    Ok(ColumnLayout {
        payload_len,
        segment_len: rows * 4 + payload_len,
    })
}

/// Serializes parallel columns into one columnar raw block.
///
/// Layout (little-endian):
///
/// ```text
/// header      version:u32=1 total_length:u32 rows:u32 columns:u32 flag:u32=0 group_id:u64=0
/// descriptors (type:u8 width:u32) * columns       width is 0 for variable kinds
/// lengths     u32 * columns                       width*rows, or variable payload bytes
/// data        per column, in order:
///               fixed:    bitmap[ceil(rows/8)] values[rows*width]
///               variable: offsets[rows]:i32 (-1 = null) payload (len:u16 bytes)*
/// ```
pub struct RawBlockEncoder;

impl RawBlockEncoder {
    /// Validates `params` against `schema` row by row and encodes them.
    pub fn encode_params(params: &[Param], schema: &[ColumnType]) -> Result<Vec<u8>, EncodeError> {
        if params.len() != schema.len() {
            return Err(EncodeError::ColumnCountMismatch {
                expected: schema.len(),
                actual: params.len(),
            });
        }
        let rows = params.first().map_or(0, Vec::len);
        for (column, param) in params.iter().enumerate() {
            if param.len() != rows {
                return Err(EncodeError::RowCountMismatch {
                    column,
                    expected: rows,
                    actual: param.len(),
                });
            }
        }

        let mut columns = Vec::with_capacity(schema.len());
        for (column, (param, ty)) in params.iter().zip(schema).enumerate() {
            let mut builder = AnyColumnBuilder::for_type(ty, rows);
            for (row, value) in param.iter().enumerate() {
                builder.push(value, column, row)?;
            }
            columns.push(builder.finish());
        }
        Self::encode_columns(&columns)
    }

    /// Encodes finished column buffers, which must all hold the same row count.
    pub fn encode_columns<C: Borrow<TypedColumnBuffer>>(columns: &[C]) -> Result<Vec<u8>, EncodeError> {
        let columns: Vec<&TypedColumnBuffer> = columns.iter().map(Borrow::borrow).collect();
        let rows = columns.first().map_or(0, |c| c.rows());
        let mut layouts = Vec::with_capacity(columns.len());
        for (index, column) in columns.iter().enumerate() {
            if column.rows() != rows {
                return Err(EncodeError::RowCountMismatch {
                    column: index,
                    expected: rows,
                    actual: column.rows(),
                });
            }
            layouts.push(layout_of(column)?);
        }

        let total = RAW_BLOCK_HEADER_LEN
            + columns.len() * (COLUMN_DESCRIPTOR_LEN + COLUMN_LENGTH_LEN)
            + layouts.iter().map(|l| l.segment_len).sum::<usize>();
        tracing::trace!(rows, columns = columns.len(), total, "encoding raw block");

        let mut out = vec![0u8; total];
        let mut w = ByteWriter::new(&mut out);

        w.put_u32(RAW_BLOCK_VERSION)?;
        w.put_u32(0)?;
        w.put_u32(rows as u32)?;
        w.put_u32(columns.len() as u32)?;
        w.put_u32(0)?;
        w.put_u64(0)?;

        for column in &columns {
            w.put_u8(column.kind().code())?;
            w.put_u32(column.kind().fixed_width() as u32)?;
        }
        for layout in &layouts {
            w.put_u32(layout.payload_len as u32)?;
        }
        for column in &columns {
            write_column(&mut w, column)?;
        }

        let written = w.position();
        w.patch_u32(4, written as u32)?;
        debug_assert_eq!(written, total);
        Ok(out)
    }
}

fn write_column(w: &mut ByteWriter<'_>, column: &TypedColumnBuffer) -> Result<(), EncodeError> {
    let rows = column.rows();
    if !column.kind().is_var_len() {
        let mut bitmap = vec![0u8; bitmap_len(rows)];
        for (row, &null) in column.nulls().iter().enumerate() {
            if null == 1 {
                bitmap[row >> 3] |= 1 << (7 - (row & 7));
            }
        }
        w.put_bytes(&bitmap)?;
        return w.put_bytes(column.data());
    }

    let mut offset = 0i32;
    for value in column.var_values() {
        match value {
            Some(v) => {
                w.put_i32(offset)?;
                offset += (VAR_PREFIX_LEN + v.len()) as i32;
            }
            None => w.put_i32(VAR_NULL_OFFSET)?,
        }
    }
    for value in column.var_values().flatten() {
        w.put_u16(value.len() as u16)?;
        w.put_bytes(value)?;
    }
    Ok(())
}
