use crate::error::DriverResult;
use crate::types::{ColumnType, ColumnValue};

/// Decodes rows out of a raw block received from the server.
///
/// The driver only ships raw blocks through; turning them back into values is
/// left to an implementation of this trait.
pub trait RowReader {
    /// Decodes row `row` of the block that starts at `block_offset` in `buffer`.
    fn read_row(
        &self,
        buffer: &[u8],
        block_offset: usize,
        rows: usize,
        row: usize,
        columns: &[ColumnType],
    ) -> DriverResult<Vec<ColumnValue>>;
}
