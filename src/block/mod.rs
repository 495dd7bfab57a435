//! Columnar raw block format used to ship table data.

mod encoder;
mod reader;

pub use encoder::{bitmap_len, RawBlockEncoder, RawBlockHeader, RAW_BLOCK_HEADER_LEN, RAW_BLOCK_VERSION};
pub use reader::RowReader;
