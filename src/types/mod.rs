//! Column types and values shared by the raw block encoder and the stmt2 framer.

mod kind;
mod time;
mod value;

pub use kind::{ColumnKind, ColumnType, Precision};
pub use time::{i64_to_timestamp, timestamp_to_i64};
pub use value::{ColumnValue, Param};
