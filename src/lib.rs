pub mod block;
pub mod column;
pub mod config;
pub mod driver;
pub mod error;
pub mod stmt2;
pub mod types;

pub use block::{RawBlockEncoder, RawBlockHeader, RowReader};
pub use column::{AnyColumnBuilder, FixedColumnBuilder, TypedColumnBuffer, VarColumnBuilder};
pub use config::{ClientConfig, FramerVersion, ReconnectConfig};
pub use driver::{QueryResult, RawBlockResult, Stmt2, TsdbClient, TsdbClientBuilder};
pub use error::{DriverError, DriverResult, EncodeError};
pub use stmt2::{BindMode, BindType, Stmt2BindData, Stmt2Field, Stmt2Framer, Stmt2Header, Stmt2Layout};
pub use types::{ColumnKind, ColumnType, ColumnValue, Param, Precision};
