use serde::{Deserialize, Serialize};

use crate::types::{ColumnKind, ColumnValue, Param, Precision};

/// Bind values for one target sub-table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stmt2BindData {
    pub table_name: Option<String>,
    /// One value per tag field.
    pub tags: Vec<ColumnValue>,
    /// One param (all rows) per column field.
    pub cols: Vec<Param>,
}

impl Stmt2BindData {
    pub fn new(table_name: Option<String>, tags: Vec<ColumnValue>, cols: Vec<Param>) -> Self {
        Self {
            table_name,
            tags,
            cols,
        }
    }

    /// Bind data for a query statement: one row of `?` parameters.
    pub fn query(params: Vec<ColumnValue>) -> Self {
        Self {
            table_name: None,
            tags: Vec::new(),
            cols: params.into_iter().map(|v| vec![v]).collect(),
        }
    }
}

/// Role of a statement placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum BindType {
    Column,
    Tag,
    TableName,
}

impl TryFrom<u8> for BindType {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(BindType::Column),
            2 => Ok(BindType::Tag),
            4 => Ok(BindType::TableName),
            other => Err(format!("unknown bind type {}", other)),
        }
    }
}

impl From<BindType> for u8 {
    fn from(bind_type: BindType) -> Self {
        match bind_type {
            BindType::Column => 1,
            BindType::Tag => 2,
            BindType::TableName => 4,
        }
    }
}

/// Placeholder description returned by the server when an insert statement
/// is prepared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stmt2Field {
    #[serde(default)]
    pub name: String,
    pub field_type: u8,
    #[serde(default)]
    pub precision: u8,
    #[serde(default)]
    pub scale: u8,
    #[serde(default)]
    pub bytes: i32,
    pub bind_type: BindType,
}

impl Stmt2Field {
    pub fn new(name: &str, kind: ColumnKind, bind_type: BindType) -> Self {
        Self {
            name: name.to_string(),
            field_type: kind.code(),
            precision: 0,
            scale: 0,
            bytes: kind.fixed_width() as i32,
            bind_type,
        }
    }

    pub fn table_name() -> Self {
        Self {
            name: "tbname".to_string(),
            field_type: ColumnKind::Binary.code(),
            precision: 0,
            scale: 0,
            bytes: 0,
            bind_type: BindType::TableName,
        }
    }

    pub fn with_precision(mut self, precision: u8) -> Self {
        self.precision = precision;
        self
    }

    pub fn kind(&self) -> Option<ColumnKind> {
        ColumnKind::from_code(self.field_type)
    }

    pub fn timestamp_precision(&self) -> Precision {
        Precision::from_server_code(self.precision).unwrap_or_default()
    }
}

/// What a bind call targets.
#[derive(Debug, Clone, Copy)]
pub enum BindMode<'a> {
    /// Insert into one or many sub-tables, typed by the prepared fields.
    Insert(&'a [Stmt2Field]),
    /// `?` parameters of a query; types come from the values themselves.
    Query,
}

/// Which of the two binary layouts a framer produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stmt2Layout {
    /// Standalone payload assembled section by section.
    V1,
    /// Sized in a first pass and written in place after `binary_header_length`
    /// zeroed bytes reserved for outer framing.
    V2 { binary_header_length: usize },
}

impl Stmt2Layout {
    /// Bytes reserved ahead of the stmt2 payload.
    pub fn prefix_len(&self) -> usize {
        match self {
            Stmt2Layout::V1 => 0,
            Stmt2Layout::V2 {
                binary_header_length,
            } => *binary_header_length,
        }
    }
}
