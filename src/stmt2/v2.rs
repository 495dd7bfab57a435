//! Two-pass layout: per-table sizes are summed first, then everything is
//! written in place after a reserved prefix for the outer request head.

use super::{blocks_len, write_blocks, BindPlan, STMT2_HEADER_LEN};
use crate::column::ByteWriter;
use crate::error::EncodeError;

struct Sizes {
    names: Vec<usize>,
    tags: Vec<usize>,
    cols: Vec<usize>,
}

impl Sizes {
    fn measure(plan: &BindPlan<'_>) -> Result<Self, EncodeError> {
        let mut sizes = Sizes {
            names: Vec::new(),
            tags: Vec::new(),
            cols: Vec::new(),
        };
        for record in plan.records {
            if plan.need_names {
                sizes.names.push(plan.table_name(record).len() + 1);
            }
            if plan.need_tags() {
                sizes.tags.push(blocks_len(plan.tag_fields(record))?);
            }
            if plan.need_cols {
                sizes.cols.push(blocks_len(plan.col_fields(record))?);
            }
        }
        Ok(sizes)
    }

    fn names_len(&self) -> usize {
        self.names.len() * 2 + self.names.iter().sum::<usize>()
    }

    fn tags_len(&self) -> usize {
        self.tags.len() * 4 + self.tags.iter().sum::<usize>()
    }

    fn cols_len(&self) -> usize {
        self.cols.len() * 4 + self.cols.iter().sum::<usize>()
    }
}

pub(super) fn encode(plan: &BindPlan<'_>, prefix: usize) -> Result<Vec<u8>, EncodeError> {
    let sizes = Sizes::measure(plan)?;
    let total = STMT2_HEADER_LEN + sizes.names_len() + sizes.tags_len() + sizes.cols_len();

    let mut header = plan.header();
    header.total_length = total as u32;
    if plan.need_names {
        header.table_names_offset = STMT2_HEADER_LEN as u32;
    }
    if plan.need_tags() {
        header.tags_offset = (STMT2_HEADER_LEN + sizes.names_len()) as u32;
    }
    if plan.need_cols {
        header.cols_offset = (STMT2_HEADER_LEN + sizes.names_len() + sizes.tags_len()) as u32;
    }

    let mut out = vec![0u8; prefix + total];
    let mut w = ByteWriter::new(&mut out[prefix..]);
    header.write(&mut w)?;

    for len in &sizes.names {
        w.put_u16(*len as u16)?;
    }
    if plan.need_names {
        for record in plan.records {
            w.put_bytes(plan.table_name(record))?;
            w.skip(1)?;
        }
    }

    for len in &sizes.tags {
        w.put_u32(*len as u32)?;
    }
    if plan.need_tags() {
        for record in plan.records {
            write_blocks(&mut w, plan.tag_fields(record))?;
        }
    }

    for len in &sizes.cols {
        w.put_u32(*len as u32)?;
    }
    if plan.need_cols {
        for record in plan.records {
            write_blocks(&mut w, plan.col_fields(record))?;
        }
    }

    debug_assert_eq!(w.position(), total);
    Ok(out)
}
