//! Self-describing tag/column blocks shared by both stmt2 layouts.
//!
//! ```text
//! total_length:u32 field_type:u32 num:u32 is_null[num]:u8 have_length:u8
//! (length[num]:u32 if variable) buffer_length:u32 buffer
//! ```

use std::borrow::Cow;

use chrono::SecondsFormat;

use crate::column::ByteWriter;
use crate::error::EncodeError;
use crate::types::{timestamp_to_i64, ColumnKind, ColumnValue, Precision};

/// How the values of one tag or column are put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct FieldTarget {
    pub kind: ColumnKind,
    pub precision: Precision,
    /// Query parameters carry timestamps as RFC 3339 text in a BINARY slot.
    pub timestamp_as_text: bool,
}

impl FieldTarget {
    pub fn new(kind: ColumnKind, precision: Precision) -> Self {
        Self {
            kind,
            precision,
            timestamp_as_text: false,
        }
    }

    /// Derives the wire type of a query parameter from the value itself.
    pub fn infer(value: &ColumnValue) -> Result<Self, EncodeError> {
        match value {
            ColumnValue::Null => Err(EncodeError::UnsupportedParamType("NULL".to_string())),
            ColumnValue::Json(_) => Err(EncodeError::UnsupportedParamType("JSON".to_string())),
            ColumnValue::Timestamp(_) => Ok(Self {
                kind: ColumnKind::Binary,
                precision: Precision::default(),
                timestamp_as_text: true,
            }),
            other => match other.kind() {
                Some(kind) => Ok(Self::new(kind, Precision::default())),
                None => Err(EncodeError::UnsupportedParamType(format!("{:?}", other))),
            },
        }
    }

    fn accepts(&self, value: &ColumnValue) -> bool {
        match value {
            ColumnValue::Null => true,
            ColumnValue::Timestamp(_) if self.timestamp_as_text => true,
            other => other.kind() == Some(self.kind),
        }
    }
}

/// TotalLength(4) + Type(4) + Num(4) + IsNull(num) + HaveLength(1)
/// + Length(num * 4, variable only) + BufferLength(4)
fn header_len(num: usize, have_len: bool) -> usize {
    let mut len = 17 + num;
    if have_len {
        len += num * 4;
    }
    len
}

fn check(values: &[ColumnValue], target: &FieldTarget, column: usize) -> Result<(), EncodeError> {
    for (row, value) in values.iter().enumerate() {
        if !target.accepts(value) {
            return Err(EncodeError::TypeMismatch {
                column,
                row,
                expected: target.kind,
                actual: value.kind().unwrap_or(target.kind),
            });
        }
    }
    Ok(())
}

fn var_payload<'a>(value: &'a ColumnValue, target: &FieldTarget) -> Option<Cow<'a, [u8]>> {
    match value {
        ColumnValue::Null => None,
        ColumnValue::Timestamp(ts) if target.timestamp_as_text => Some(Cow::Owned(
            ts.to_rfc3339_opts(SecondsFormat::Nanos, true).into_bytes(),
        )),
        other => Some(Cow::Borrowed(other.var_bytes().unwrap_or(&[]))),
    }
}

fn all_null(values: &[ColumnValue]) -> bool {
    values.iter().all(ColumnValue::is_null)
}

/// Size of the block for `values`, validating every value against `target`.
/// `column` labels type errors.
pub(super) fn block_len(
    values: &[ColumnValue],
    target: &FieldTarget,
    column: usize,
) -> Result<usize, EncodeError> {
    check(values, target, column)?;
    let have_len = target.kind.is_var_len();
    let mut len = header_len(values.len(), have_len);
    if all_null(values) {
        return Ok(len);
    }
    if have_len {
        len += values
            .iter()
            .filter_map(|v| var_payload(v, target))
            .map(|p| p.len())
            .sum::<usize>();
    } else {
        len += target.kind.fixed_width() * values.len();
    }
    Ok(len)
}

/// Writes one block at the writer's position and returns its length. The
/// underlying buffer must be zeroed.
pub(super) fn write_block(
    w: &mut ByteWriter<'_>,
    values: &[ColumnValue],
    target: &FieldTarget,
    column: usize,
) -> Result<usize, EncodeError> {
    check(values, target, column)?;
    let start = w.position();
    let num = values.len();
    let have_len = target.kind.is_var_len();
    let is_all_null = all_null(values);

    w.put_u32(0)?;
    w.put_u32(target.kind.code() as u32)?;
    w.put_u32(num as u32)?;
    for value in values {
        w.put_u8(value.is_null() as u8)?;
    }
    w.put_u8(have_len as u8)?;

    if have_len {
        let payloads: Vec<Option<Cow<'_, [u8]>>> =
            values.iter().map(|v| var_payload(v, target)).collect();
        for payload in &payloads {
            w.put_u32(payload.as_ref().map_or(0, |p| p.len()) as u32)?;
        }
        let buffer_len: usize = payloads.iter().flatten().map(|p| p.len()).sum();
        w.put_u32(buffer_len as u32)?;
        for payload in payloads.iter().flatten() {
            w.put_bytes(payload)?;
        }
    } else if is_all_null {
        w.put_u32(0)?;
    } else {
        let width = target.kind.fixed_width();
        w.put_u32((width * num) as u32)?;
        for value in values {
            write_fixed(w, value, target, width)?;
        }
    }

    let len = w.position() - start;
    w.patch_u32(start, len as u32)?;
    Ok(len)
}

fn write_fixed(
    w: &mut ByteWriter<'_>,
    value: &ColumnValue,
    target: &FieldTarget,
    width: usize,
) -> Result<(), EncodeError> {
    use ColumnValue::*;
    match value {
        Null => w.skip(width),
        Bool(v) => w.put_u8(*v as u8),
        TinyInt(v) => w.put_u8(*v as u8),
        UTinyInt(v) => w.put_u8(*v),
        SmallInt(v) => w.put_u16(*v as u16),
        USmallInt(v) => w.put_u16(*v),
        Int(v) => w.put_i32(*v),
        UInt(v) => w.put_u32(*v),
        BigInt(v) => w.put_i64(*v),
        UBigInt(v) => w.put_u64(*v),
        Float(v) => w.put_bytes(&v.to_le_bytes()),
        Double(v) => w.put_bytes(&v.to_le_bytes()),
        Timestamp(ts) => w.put_i64(timestamp_to_i64(ts, target.precision)?),
        Binary(_) | VarBinary(_) | NChar(_) | Json(_) | Geometry(_) => {
            Err(EncodeError::TypeMismatch {
                column: 0,
                row: 0,
                expected: target.kind,
                actual: value.kind().unwrap_or(target.kind),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(values: &[ColumnValue], target: &FieldTarget) -> Vec<u8> {
        let len = block_len(values, target, 0).unwrap();
        let mut out = vec![0u8; len];
        let mut w = ByteWriter::new(&mut out);
        assert_eq!(write_block(&mut w, values, target, 0).unwrap(), len);
        out
    }

    #[test]
    fn test_fixed_tag_block() {
        let target = FieldTarget::new(ColumnKind::SmallInt, Precision::Millisecond);
        #[rustfmt::skip]
        let expected = [
            0x14, 0x00, 0x00, 0x00, // TotalLength
            0x03, 0x00, 0x00, 0x00, // Type
            0x01, 0x00, 0x00, 0x00, // Num
            0x00,                   // IsNull
            0x00,                   // HaveLength
            0x02, 0x00, 0x00, 0x00, // BufferLength
            0x02, 0x00,             // Buffer
        ];
        assert_eq!(encode(&[ColumnValue::SmallInt(2)], &target), expected);
    }

    #[test]
    fn test_var_column_block() {
        let target = FieldTarget::new(ColumnKind::Binary, Precision::Millisecond);
        let values = [ColumnValue::binary("ab"), ColumnValue::Null, ColumnValue::binary("c")];
        #[rustfmt::skip]
        let expected = [
            0x28, 0x00, 0x00, 0x00, // TotalLength
            0x08, 0x00, 0x00, 0x00, // Type
            0x03, 0x00, 0x00, 0x00, // Num
            0x00, 0x01, 0x00,       // IsNull
            0x01,                   // HaveLength
            0x02, 0x00, 0x00, 0x00, // Length
            0x00, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00,
            0x03, 0x00, 0x00, 0x00, // BufferLength
            b'a', b'b', b'c',       // Buffer
        ];
        assert_eq!(encode(&values, &target), expected);
    }

    #[test]
    fn test_all_null_column_has_empty_buffer() {
        let target = FieldTarget::new(ColumnKind::Int, Precision::Millisecond);
        let out = encode(&[ColumnValue::Null, ColumnValue::Null], &target);
        assert_eq!(out.len(), 17 + 2);
        assert_eq!(&out[12..14], &[1, 1]);
        assert_eq!(&out[15..19], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_type_mismatch_reports_position() {
        let target = FieldTarget::new(ColumnKind::Int, Precision::Millisecond);
        let values = [ColumnValue::Int(1), ColumnValue::Double(2.0)];
        assert_eq!(
            block_len(&values, &target, 3),
            Err(EncodeError::TypeMismatch {
                column: 3,
                row: 1,
                expected: ColumnKind::Int,
                actual: ColumnKind::Double,
            })
        );
    }

    #[test]
    fn test_infer_query_types() {
        assert_eq!(
            FieldTarget::infer(&ColumnValue::Float(1.0)).unwrap().kind,
            ColumnKind::Float
        );
        let ts = FieldTarget::infer(&ColumnValue::Timestamp(chrono::Utc::now())).unwrap();
        assert_eq!(ts.kind, ColumnKind::Binary);
        assert!(ts.timestamp_as_text);
        assert!(matches!(
            FieldTarget::infer(&ColumnValue::Null),
            Err(EncodeError::UnsupportedParamType(_))
        ));
    }
}
