use chrono::{DateTime, Utc};

use super::ColumnKind;

/// One value of one column in one row.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    Bool(bool),
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    UTinyInt(u8),
    USmallInt(u16),
    UInt(u32),
    UBigInt(u64),
    Float(f32),
    Double(f64),
    /// Byte string stored in a BINARY (VARCHAR) column.
    Binary(Vec<u8>),
    VarBinary(Vec<u8>),
    NChar(String),
    /// Serialized JSON text.
    Json(String),
    /// WKB encoded geometry.
    Geometry(Vec<u8>),
    Timestamp(DateTime<Utc>),
}

/// All values of one column, in row order.
pub type Param = Vec<ColumnValue>;

impl ColumnValue {
    pub fn binary(s: impl Into<String>) -> Self {
        ColumnValue::Binary(s.into().into_bytes())
    }

    pub fn nchar(s: impl Into<String>) -> Self {
        ColumnValue::NChar(s.into())
    }

    pub fn json(v: &serde_json::Value) -> Self {
        ColumnValue::Json(v.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }

    /// Kind carried by this value; `None` for [`ColumnValue::Null`].
    pub fn kind(&self) -> Option<ColumnKind> {
        use ColumnValue::*;
        Some(match self {
            Null => return None,
            Bool(_) => ColumnKind::Bool,
            TinyInt(_) => ColumnKind::TinyInt,
            SmallInt(_) => ColumnKind::SmallInt,
            Int(_) => ColumnKind::Int,
            BigInt(_) => ColumnKind::BigInt,
            UTinyInt(_) => ColumnKind::UTinyInt,
            USmallInt(_) => ColumnKind::USmallInt,
            UInt(_) => ColumnKind::UInt,
            UBigInt(_) => ColumnKind::UBigInt,
            Float(_) => ColumnKind::Float,
            Double(_) => ColumnKind::Double,
            Binary(_) => ColumnKind::Binary,
            VarBinary(_) => ColumnKind::VarBinary,
            NChar(_) => ColumnKind::NChar,
            Json(_) => ColumnKind::Json,
            Geometry(_) => ColumnKind::Geometry,
            Timestamp(_) => ColumnKind::Timestamp,
        })
    }

    /// Raw bytes of a variable-length value as stmt2 ships them (UTF-8 for text).
    pub fn var_bytes(&self) -> Option<&[u8]> {
        use ColumnValue::*;
        match self {
            Binary(v) | VarBinary(v) | Geometry(v) => Some(v),
            NChar(s) | Json(s) => Some(s.as_bytes()),
            _ => None,
        }
    }
}

macro_rules! impl_from_scalar {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for ColumnValue {
                fn from(v: $t) -> Self {
                    ColumnValue::$variant(v)
                }
            }
        )*
    };
}

impl_from_scalar! {
    bool => Bool,
    i8 => TinyInt,
    i16 => SmallInt,
    i32 => Int,
    i64 => BigInt,
    u8 => UTinyInt,
    u16 => USmallInt,
    u32 => UInt,
    u64 => UBigInt,
    f32 => Float,
    f64 => Double,
    DateTime<Utc> => Timestamp,
}

impl<T: Into<ColumnValue>> From<Option<T>> for ColumnValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(ColumnValue::Null)
    }
}
