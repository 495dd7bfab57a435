use bytes::Bytes;

use super::TsdbClient;
use crate::block::{RawBlockHeader, RowReader};
use crate::driver::protocol::{
    decode_response, Action, BaseResponse, BinaryRequest, FetchRawBlockResponse, FetchResp,
    QueryResp,
};
use crate::driver::transport::Frame;
use crate::error::{DriverError, DriverResult};
use crate::types::{ColumnType, ColumnValue, Precision};

/// An open result set on the server.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub id: u64,
    pub fields: Vec<String>,
    pub types: Vec<ColumnType>,
    pub precision: Precision,
}

/// One raw block of a result set.
#[derive(Debug, Clone)]
pub struct RawBlockResult {
    pub result_id: u64,
    pub block: Bytes,
    pub types: Vec<ColumnType>,
}

impl RawBlockResult {
    pub fn rows(&self) -> usize {
        RawBlockHeader::parse(&self.block).map_or(0, |h| h.rows as usize)
    }

    /// Decodes every row of the block with `reader`.
    pub fn rows_with<R: RowReader + ?Sized>(&self, reader: &R) -> DriverResult<Vec<Vec<ColumnValue>>> {
        let rows = self.rows();
        (0..rows)
            .map(|row| reader.read_row(&self.block, 0, rows, row, &self.types))
            .collect()
    }
}

impl TsdbClient {
    /// Runs a statement that changes data and returns the affected row count.
    pub async fn exec(&self, sql: &str) -> DriverResult<usize> {
        let resp: QueryResp = self.call(Action::Query { sql: sql.to_string() }).await?;
        if !resp.is_update {
            self.free_result(resp.id).await?;
        }
        Ok(resp.affected_rows)
    }

    /// Runs a query and opens its result set.
    pub async fn query(&self, sql: &str) -> DriverResult<QueryResult> {
        let resp: QueryResp = self.call(Action::Query { sql: sql.to_string() }).await?;
        if resp.is_update {
            return Err(DriverError::Decode(format!(
                "statement affected {} rows and returned no result set",
                resp.affected_rows
            )));
        }
        Ok(QueryResult {
            id: resp.id,
            types: resp.column_types(),
            fields: resp.fields_names.unwrap_or_default(),
            precision: Precision::from_server_code(resp.precision).unwrap_or_default(),
        })
    }

    /// Asks the server to prepare the next block of `result_id`.
    pub async fn fetch(&self, result_id: u64) -> DriverResult<FetchResp> {
        self.call(Action::Fetch { id: result_id }).await
    }

    /// Pulls the block prepared by [`TsdbClient::fetch`].
    pub async fn fetch_raw_block(&self, result_id: u64) -> DriverResult<FetchRawBlockResponse> {
        match self.call_frame(BinaryRequest::fetch_raw_block(result_id)).await? {
            Frame::Binary(data) => FetchRawBlockResponse::parse(data)?.into_result(),
            Frame::Text(text) => {
                // errors may come back as JSON
                decode_response::<BaseResponse>(&text)?;
                Err(DriverError::Decode("expected a binary block reply".to_string()))
            }
            other => Err(DriverError::Decode(format!("unexpected reply frame: {:?}", other))),
        }
    }

    /// Next block of `result`, or `None` once it is exhausted.
    pub async fn next_block(&self, result: &QueryResult) -> DriverResult<Option<RawBlockResult>> {
        let fetched = self.fetch(result.id).await?;
        if fetched.completed {
            return Ok(None);
        }
        let resp = self.fetch_raw_block(result.id).await?;
        if resp.finished {
            return Ok(None);
        }
        Ok(Some(RawBlockResult {
            result_id: result.id,
            block: resp.block,
            types: result.types.clone(),
        }))
    }

    /// Releases a result set; the server does not reply.
    pub async fn free_result(&self, result_id: u64) -> DriverResult<()> {
        self.post(Action::FreeResult { id: result_id }).await
    }
}
