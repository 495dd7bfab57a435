use std::borrow::Borrow;

use super::TsdbClient;
use crate::block::RawBlockEncoder;
use crate::column::TypedColumnBuffer;
use crate::driver::protocol::{BaseResponse, BinaryRequest};
use crate::error::DriverResult;
use crate::types::{ColumnType, Param};

impl TsdbClient {
    /// Encodes `params` against `schema` as one raw block and writes it to
    /// `table`. Nothing is sent if the data does not match the schema.
    pub async fn write_raw_block(&self, table: &str, params: &[Param], schema: &[ColumnType]) -> DriverResult<()> {
        let block = RawBlockEncoder::encode_params(params, schema)?;
        let rows = params.first().map_or(0, Vec::len);
        self.send_raw_block(table, rows, &block).await
    }

    /// Writes columns that were filled with the column builders.
    pub async fn write_raw_columns<C: Borrow<TypedColumnBuffer>>(
        &self,
        table: &str,
        columns: &[C],
    ) -> DriverResult<()> {
        let block = RawBlockEncoder::encode_columns(columns)?;
        let rows = columns.first().map_or(0, |c| c.borrow().rows());
        self.send_raw_block(table, rows, &block).await
    }

    async fn send_raw_block(&self, table: &str, rows: usize, block: &[u8]) -> DriverResult<()> {
        tracing::debug!(table, rows, bytes = block.len(), "writing raw block");
        let request = BinaryRequest::raw_block(table, rows, block)?;
        let _: BaseResponse = self.call(request).await?;
        Ok(())
    }
}
