//! Section-by-section assembly: every sub-table's blocks are encoded into
//! their own buffer and the sections are stitched together behind the header.

use super::{block, BindPlan, STMT2_HEADER_LEN};
use crate::column::ByteWriter;
use crate::error::EncodeError;
use crate::types::ColumnValue;

use super::block::FieldTarget;

fn encode_blocks<'s>(
    fields: impl Iterator<Item = (&'s [ColumnValue], &'s FieldTarget)>,
) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    for (index, (values, target)) in fields.enumerate() {
        let start = out.len();
        out.resize(start + block::block_len(values, target, index)?, 0);
        let mut w = ByteWriter::new(&mut out[start..]);
        block::write_block(&mut w, values, target, index)?;
    }
    Ok(out)
}

fn section_len(per_table: &[Vec<u8>]) -> usize {
    per_table.len() * 4 + per_table.iter().map(Vec::len).sum::<usize>()
}

fn write_section(w: &mut ByteWriter<'_>, per_table: &[Vec<u8>]) -> Result<(), EncodeError> {
    for blocks in per_table {
        w.put_u32(blocks.len() as u32)?;
    }
    for blocks in per_table {
        w.put_bytes(blocks)?;
    }
    Ok(())
}

pub(super) fn encode(plan: &BindPlan<'_>) -> Result<Vec<u8>, EncodeError> {
    let names: Vec<&[u8]> = if plan.need_names {
        plan.records.iter().map(|r| plan.table_name(r)).collect()
    } else {
        Vec::new()
    };
    let tags = if plan.need_tags() {
        plan.records
            .iter()
            .map(|r| encode_blocks(plan.tag_fields(r)))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        Vec::new()
    };
    let cols = if plan.need_cols {
        plan.records
            .iter()
            .map(|r| encode_blocks(plan.col_fields(r)))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        Vec::new()
    };

    let names_len = names.len() * 2 + names.iter().map(|n| n.len() + 1).sum::<usize>();
    let tags_len = section_len(&tags);
    let cols_len = section_len(&cols);
    let total = STMT2_HEADER_LEN + names_len + tags_len + cols_len;

    let mut header = plan.header();
    header.total_length = total as u32;
    if plan.need_names {
        header.table_names_offset = STMT2_HEADER_LEN as u32;
    }
    if plan.need_tags() {
        header.tags_offset = (STMT2_HEADER_LEN + names_len) as u32;
    }
    if plan.need_cols {
        header.cols_offset = (STMT2_HEADER_LEN + names_len + tags_len) as u32;
    }

    let mut out = vec![0u8; total];
    let mut w = ByteWriter::new(&mut out);
    header.write(&mut w)?;
    for name in &names {
        w.put_u16((name.len() + 1) as u16)?;
    }
    for name in &names {
        w.put_bytes(name)?;
        w.put_u8(0)?;
    }
    write_section(&mut w, &tags)?;
    write_section(&mut w, &cols)?;
    debug_assert_eq!(w.position(), total);
    Ok(out)
}
