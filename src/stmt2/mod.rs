//! Binary framing of prepared-statement ("stmt2") bind data.
//!
//! One payload binds table names, tags and columns for any number of
//! sub-tables:
//!
//! ```text
//! header   total_length count tag_count col_count names_offset tags_offset cols_offset  (7 x u32)
//! names    name_len[count]:u16 (NUL-terminated name)*
//! tags     tag_len[count]:u32  (tag block per tag field)*      per sub-table
//! cols     col_len[count]:u32  (column block per column field)* per sub-table
//! ```
//!
//! Offsets are relative to the start of the payload and stay 0 when a
//! section is absent.

mod bind;
mod block;
mod v1;
mod v2;

use byteorder::{ByteOrder, LittleEndian};

pub use bind::{BindMode, BindType, Stmt2BindData, Stmt2Field, Stmt2Layout};

use crate::column::ByteWriter;
use crate::error::EncodeError;
use crate::types::ColumnValue;
use block::FieldTarget;

pub const STMT2_HEADER_LEN: usize = 28;
/// Longest table name whose NUL-terminated length still fits a `u16`.
pub const MAX_TABLE_NAME_LEN: usize = u16::MAX as usize - 1;

/// Fixed header of a stmt2 payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stmt2Header {
    pub total_length: u32,
    pub count: u32,
    pub tag_count: u32,
    pub col_count: u32,
    pub table_names_offset: u32,
    pub tags_offset: u32,
    pub cols_offset: u32,
}

impl Stmt2Header {
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() < STMT2_HEADER_LEN {
            return None;
        }
        let field = |i: usize| LittleEndian::read_u32(&payload[i * 4..i * 4 + 4]);
        Some(Self {
            total_length: field(0),
            count: field(1),
            tag_count: field(2),
            col_count: field(3),
            table_names_offset: field(4),
            tags_offset: field(5),
            cols_offset: field(6),
        })
    }

    fn write(&self, w: &mut ByteWriter<'_>) -> Result<(), EncodeError> {
        w.put_u32(self.total_length)?;
        w.put_u32(self.count)?;
        w.put_u32(self.tag_count)?;
        w.put_u32(self.col_count)?;
        w.put_u32(self.table_names_offset)?;
        w.put_u32(self.tags_offset)?;
        w.put_u32(self.cols_offset)
    }
}

/// Turns a batch of [`Stmt2BindData`] into one bind payload using the
/// configured [`Stmt2Layout`].
#[derive(Debug, Clone, Copy)]
pub struct Stmt2Framer {
    layout: Stmt2Layout,
}

impl Stmt2Framer {
    pub fn new(layout: Stmt2Layout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> Stmt2Layout {
        self.layout
    }

    /// Validates the whole batch, then encodes it.
    ///
    /// With [`Stmt2Layout::V2`] the returned buffer starts with
    /// `binary_header_length` zeroed bytes for the caller to fill.
    pub fn encode(&self, data: &[Stmt2BindData], mode: BindMode<'_>) -> Result<Vec<u8>, EncodeError> {
        let plan = BindPlan::new(data, mode)?;
        tracing::trace!(
            tables = plan.records.len(),
            tags = plan.tag_targets.len(),
            cols = plan.col_targets.len(),
            names = plan.need_names,
            "framing stmt2 bind"
        );
        match self.layout {
            Stmt2Layout::V1 => v1::encode(&plan),
            Stmt2Layout::V2 {
                binary_header_length,
            } => v2::encode(&plan, binary_header_length),
        }
    }
}

impl Default for Stmt2Framer {
    fn default() -> Self {
        Self::new(Stmt2Layout::V1)
    }
}

/// A validated batch with the wire type of every tag and column resolved.
struct BindPlan<'a> {
    records: &'a [Stmt2BindData],
    need_names: bool,
    need_cols: bool,
    tag_targets: Vec<FieldTarget>,
    col_targets: Vec<FieldTarget>,
}

impl<'a> BindPlan<'a> {
    fn new(records: &'a [Stmt2BindData], mode: BindMode<'_>) -> Result<Self, EncodeError> {
        if records.is_empty() {
            return Err(EncodeError::EmptyData);
        }
        let plan = match mode {
            BindMode::Insert(fields) => Self::insert(records, fields)?,
            BindMode::Query => Self::query(records)?,
        };
        for (index, record) in records.iter().enumerate() {
            plan.check_record(index, record)?;
        }
        Ok(plan)
    }

    fn insert(records: &'a [Stmt2BindData], fields: &[Stmt2Field]) -> Result<Self, EncodeError> {
        if fields.is_empty() {
            return Err(EncodeError::MissingFields);
        }
        let mut need_names = false;
        let mut tag_targets = Vec::new();
        let mut col_targets = Vec::new();
        for field in fields {
            if field.bind_type == BindType::TableName {
                need_names = true;
                continue;
            }
            let kind = field.kind().ok_or_else(|| {
                EncodeError::UnsupportedParamType(format!("field {} has type {}", field.name, field.field_type))
            })?;
            let target = FieldTarget::new(kind, field.timestamp_precision());
            match field.bind_type {
                BindType::Tag => tag_targets.push(target),
                _ => col_targets.push(target),
            }
        }
        Ok(Self {
            records,
            need_names,
            need_cols: !col_targets.is_empty(),
            tag_targets,
            col_targets,
        })
    }

    fn query(records: &'a [Stmt2BindData]) -> Result<Self, EncodeError> {
        let [record] = records else {
            return Err(EncodeError::InvalidQueryBind(format!(
                "expected exactly one bind record, got {}",
                records.len()
            )));
        };
        if record.table_name.is_some() {
            return Err(EncodeError::InvalidQueryBind("table name is not allowed".into()));
        }
        if !record.tags.is_empty() {
            return Err(EncodeError::InvalidQueryBind("tags are not allowed".into()));
        }
        if record.cols.is_empty() {
            return Err(EncodeError::InvalidQueryBind("no parameters to bind".into()));
        }
        let mut col_targets = Vec::with_capacity(record.cols.len());
        for (column, param) in record.cols.iter().enumerate() {
            let [value] = param.as_slice() else {
                return Err(EncodeError::InvalidQueryBind(format!(
                    "parameter {} has {} values, expected 1",
                    column,
                    param.len()
                )));
            };
            col_targets.push(FieldTarget::infer(value)?);
        }
        Ok(Self {
            records,
            need_names: false,
            need_cols: true,
            tag_targets: Vec::new(),
            col_targets,
        })
    }

    fn check_record(&self, index: usize, record: &Stmt2BindData) -> Result<(), EncodeError> {
        if self.need_names {
            let name = record.table_name.as_deref().unwrap_or_default();
            if name.is_empty() {
                return Err(EncodeError::TableNameMissing { index });
            }
            if name.len() > MAX_TABLE_NAME_LEN {
                return Err(EncodeError::TableNameTooLong { len: name.len() });
            }
        }
        if record.tags.len() != self.tag_targets.len() {
            return Err(EncodeError::TagCountMismatch {
                index,
                expected: self.tag_targets.len(),
                actual: record.tags.len(),
            });
        }
        if record.cols.len() != self.col_targets.len() {
            return Err(EncodeError::ColCountMismatch {
                index,
                expected: self.col_targets.len(),
                actual: record.cols.len(),
            });
        }
        let rows = record.cols.first().map_or(0, Vec::len);
        for (column, param) in record.cols.iter().enumerate() {
            if param.len() != rows {
                return Err(EncodeError::RowCountMismatch {
                    column,
                    expected: rows,
                    actual: param.len(),
                });
            }
        }
        Ok(())
    }

    fn need_tags(&self) -> bool {
        !self.tag_targets.is_empty()
    }

    fn table_name(&self, record: &'a Stmt2BindData) -> &'a [u8] {
        record.table_name.as_deref().unwrap_or_default().as_bytes()
    }

    fn tag_fields<'s>(
        &'s self,
        record: &'s Stmt2BindData,
    ) -> impl Iterator<Item = (&'s [ColumnValue], &'s FieldTarget)> + 's {
        record.tags.iter().map(std::slice::from_ref).zip(&self.tag_targets)
    }

    fn col_fields<'s>(
        &'s self,
        record: &'s Stmt2BindData,
    ) -> impl Iterator<Item = (&'s [ColumnValue], &'s FieldTarget)> + 's {
        record.cols.iter().map(Vec::as_slice).zip(&self.col_targets)
    }

    fn header(&self) -> Stmt2Header {
        Stmt2Header {
            count: self.records.len() as u32,
            tag_count: self.tag_targets.len() as u32,
            col_count: self.col_targets.len() as u32,
            ..Default::default()
        }
    }
}

/// Combined size of the blocks for one sub-table's tags or columns.
fn blocks_len<'s>(
    fields: impl Iterator<Item = (&'s [ColumnValue], &'s FieldTarget)>,
) -> Result<usize, EncodeError> {
    let mut len = 0;
    for (index, (values, target)) in fields.enumerate() {
        len += block::block_len(values, target, index)?;
    }
    Ok(len)
}

fn write_blocks<'s>(
    w: &mut ByteWriter<'_>,
    fields: impl Iterator<Item = (&'s [ColumnValue], &'s FieldTarget)>,
) -> Result<usize, EncodeError> {
    let mut len = 0;
    for (index, (values, target)) in fields.enumerate() {
        len += block::write_block(w, values, target, index)?;
    }
    Ok(len)
}
