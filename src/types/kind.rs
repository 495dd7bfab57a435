use serde::{Deserialize, Serialize};

/// Scalar kinds understood by the server, tagged with their wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum ColumnKind {
    Bool = 1,
    TinyInt = 2,
    SmallInt = 3,
    Int = 4,
    BigInt = 5,
    Float = 6,
    Double = 7,
    Binary = 8,
    Timestamp = 9,
    NChar = 10,
    UTinyInt = 11,
    USmallInt = 12,
    UInt = 13,
    UBigInt = 14,
    Json = 15,
    VarBinary = 16,
    Geometry = 20,
}

impl ColumnKind {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        use ColumnKind::*;
        Some(match code {
            1 => Bool,
            2 => TinyInt,
            3 => SmallInt,
            4 => Int,
            5 => BigInt,
            6 => Float,
            7 => Double,
            8 => Binary,
            9 => Timestamp,
            10 => NChar,
            11 => UTinyInt,
            12 => USmallInt,
            13 => UInt,
            14 => UBigInt,
            15 => Json,
            16 => VarBinary,
            20 => Geometry,
            _ => return None,
        })
    }

    /// Byte width of one value, or 0 for variable-length kinds.
    pub fn fixed_width(self) -> usize {
        use ColumnKind::*;
        match self {
            Bool | TinyInt | UTinyInt => 1,
            SmallInt | USmallInt => 2,
            Int | UInt | Float => 4,
            BigInt | UBigInt | Double | Timestamp => 8,
            Binary | NChar | Json | VarBinary | Geometry => 0,
        }
    }

    pub fn is_var_len(self) -> bool {
        self.fixed_width() == 0
    }

    pub fn name(self) -> &'static str {
        use ColumnKind::*;
        match self {
            Bool => "BOOL",
            TinyInt => "TINYINT",
            SmallInt => "SMALLINT",
            Int => "INT",
            BigInt => "BIGINT",
            Float => "FLOAT",
            Double => "DOUBLE",
            Binary => "BINARY",
            Timestamp => "TIMESTAMP",
            NChar => "NCHAR",
            UTinyInt => "TINYINT UNSIGNED",
            USmallInt => "SMALLINT UNSIGNED",
            UInt => "INT UNSIGNED",
            UBigInt => "BIGINT UNSIGNED",
            Json => "JSON",
            VarBinary => "VARBINARY",
            Geometry => "GEOMETRY",
        }
    }
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for ColumnKind {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        ColumnKind::from_code(code).ok_or_else(|| format!("unknown column type code {}", code))
    }
}

impl From<ColumnKind> for u8 {
    fn from(kind: ColumnKind) -> Self {
        kind.code()
    }
}

/// Timestamp resolution of a database or column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    Second,
    #[default]
    Millisecond,
    Microsecond,
    Nanosecond,
}

impl Precision {
    /// Decodes the precision code the server reports (0 = ms, 1 = us, 2 = ns).
    pub fn from_server_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Precision::Millisecond),
            1 => Some(Precision::Microsecond),
            2 => Some(Precision::Nanosecond),
            _ => None,
        }
    }
}

/// Declared type of one column or tag.
///
/// Built once per schema and shared by reference across every row of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnType {
    pub kind: ColumnKind,
    /// Only meaningful for [`ColumnKind::Timestamp`].
    pub precision: Precision,
    /// Declared byte width; equals the fixed width for fixed kinds and the
    /// schema's maximum length for variable kinds.
    pub bytes: u32,
}

impl ColumnType {
    pub fn new(kind: ColumnKind) -> Self {
        Self {
            kind,
            precision: Precision::default(),
            bytes: kind.fixed_width() as u32,
        }
    }

    pub fn timestamp(precision: Precision) -> Self {
        Self {
            kind: ColumnKind::Timestamp,
            precision,
            bytes: 8,
        }
    }

    pub fn var(kind: ColumnKind, bytes: u32) -> Self {
        Self {
            kind,
            precision: Precision::default(),
            bytes,
        }
    }
}

impl From<ColumnKind> for ColumnType {
    fn from(kind: ColumnKind) -> Self {
        ColumnType::new(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for code in 0u8..=32 {
            if let Some(kind) = ColumnKind::from_code(code) {
                assert_eq!(kind.code(), code);
            }
        }
        assert_eq!(ColumnKind::from_code(17), None);
        assert_eq!(ColumnKind::from_code(0), None);
    }

    #[test]
    fn test_fixed_widths() {
        assert_eq!(ColumnKind::Bool.fixed_width(), 1);
        assert_eq!(ColumnKind::USmallInt.fixed_width(), 2);
        assert_eq!(ColumnKind::Float.fixed_width(), 4);
        assert_eq!(ColumnKind::Timestamp.fixed_width(), 8);
        assert!(ColumnKind::NChar.is_var_len());
        assert!(ColumnKind::Geometry.is_var_len());
        assert_eq!(ColumnType::var(ColumnKind::Binary, 64).kind.fixed_width(), 0);
    }

    #[test]
    fn test_kind_deserializes_from_code() {
        let kind: ColumnKind = serde_json::from_str("9").unwrap();
        assert_eq!(kind, ColumnKind::Timestamp);
        assert!(serde_json::from_str::<ColumnKind>("99").is_err());
    }

    #[test]
    fn test_precision_server_codes() {
        assert_eq!(Precision::from_server_code(0), Some(Precision::Millisecond));
        assert_eq!(Precision::from_server_code(2), Some(Precision::Nanosecond));
        assert_eq!(Precision::from_server_code(3), None);
    }
}
