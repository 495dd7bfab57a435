use super::TsdbClient;
use crate::driver::protocol::{
    Action, BaseResponse, BinaryRequest, Stmt2BindResp, Stmt2ExecResp, Stmt2InitResp, Stmt2PrepareResp,
    STMT2_BIND_HEAD_LEN,
};
use crate::error::{DriverResult, EncodeError};
use crate::stmt2::{BindMode, Stmt2BindData, Stmt2Field};

/// A server-side prepared statement.
///
/// ```no_run
/// # async fn demo(client: tsdb_client::TsdbClient) -> tsdb_client::DriverResult<()> {
/// use tsdb_client::{ColumnValue, Stmt2BindData};
///
/// let mut stmt = client.stmt2_init().await?;
/// stmt.prepare("insert into ? using meters tags(?) values(?, ?)").await?;
/// stmt.bind(&[Stmt2BindData::new(
///     Some("d0".into()),
///     vec![ColumnValue::Int(1)],
///     vec![vec![ColumnValue::Timestamp(chrono::Utc::now())], vec![ColumnValue::Float(10.3)]],
/// )])
/// .await?;
/// let affected = stmt.exec().await?;
/// stmt.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct Stmt2 {
    client: TsdbClient,
    stmt_id: u64,
    is_insert: bool,
    fields: Option<Vec<Stmt2Field>>,
    fields_count: usize,
}

impl TsdbClient {
    pub async fn stmt2_init(&self) -> DriverResult<Stmt2> {
        let resp: Stmt2InitResp = self
            .call(Action::Stmt2Init {
                single_stb_insert: false,
                single_table_bind_once: false,
            })
            .await?;
        Ok(Stmt2 {
            client: self.clone(),
            stmt_id: resp.stmt_id,
            is_insert: false,
            fields: None,
            fields_count: 0,
        })
    }
}

impl Stmt2 {
    pub fn id(&self) -> u64 {
        self.stmt_id
    }

    pub fn is_insert(&self) -> bool {
        self.is_insert
    }

    /// Placeholder descriptions of an insert statement.
    pub fn fields(&self) -> Option<&[Stmt2Field]> {
        self.fields.as_deref()
    }

    pub fn fields_count(&self) -> usize {
        self.fields_count
    }

    pub async fn prepare(&mut self, sql: &str) -> DriverResult<()> {
        let resp: Stmt2PrepareResp = self
            .client
            .call(Action::Stmt2Prepare {
                stmt_id: self.stmt_id,
                sql: sql.to_string(),
                get_fields: true,
            })
            .await?;
        self.is_insert = resp.is_insert;
        self.fields = resp.fields;
        self.fields_count = resp.fields_count;
        Ok(())
    }

    /// Binds one record per target sub-table (or one record of query
    /// parameters). The whole batch is validated before anything is sent.
    pub async fn bind(&mut self, data: &[Stmt2BindData]) -> DriverResult<()> {
        let mode = if self.is_insert {
            BindMode::Insert(self.fields.as_deref().ok_or(EncodeError::MissingFields)?)
        } else {
            BindMode::Query
        };
        let framer = self.client.framer();
        let payload = framer.encode(data, mode)?;
        let request = bind_request(self.stmt_id, payload, framer.layout().prefix_len());
        let _: Stmt2BindResp = self.client.call(request).await?;
        Ok(())
    }

    /// Executes everything bound so far and returns the affected row count.
    pub async fn exec(&mut self) -> DriverResult<usize> {
        let resp: Stmt2ExecResp = self
            .client
            .call(Action::Stmt2Exec {
                stmt_id: self.stmt_id,
            })
            .await?;
        Ok(resp.affected)
    }

    pub async fn close(self) -> DriverResult<()> {
        let _: BaseResponse = self
            .client
            .call(Action::Stmt2Close {
                stmt_id: self.stmt_id,
            })
            .await?;
        Ok(())
    }
}

/// Wraps a framed payload in the bind head, reusing the reserved prefix
/// when the framer left exactly enough room for it.
fn bind_request(stmt_id: u64, payload: Vec<u8>, prefix: usize) -> BinaryRequest {
    match prefix {
        0 => BinaryRequest::stmt2_bind(stmt_id, payload, false),
        STMT2_BIND_HEAD_LEN => BinaryRequest::stmt2_bind(stmt_id, payload, true),
        _ => BinaryRequest::stmt2_bind(stmt_id, payload[prefix.min(payload.len())..].to_vec(), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stmt2::{BindType, Stmt2Framer, Stmt2Layout};
    use crate::types::{ColumnKind, ColumnValue};

    #[test]
    fn test_bind_request_is_layout_independent() {
        let fields = vec![
            Stmt2Field::table_name(),
            Stmt2Field::new("v", ColumnKind::BigInt, BindType::Column),
        ];
        let data = vec![Stmt2BindData::new(
            Some("t0".into()),
            vec![],
            vec![vec![ColumnValue::BigInt(1), ColumnValue::Null]],
        )];

        let frames: Vec<Vec<u8>> = [
            Stmt2Layout::V1,
            Stmt2Layout::V2 {
                binary_header_length: STMT2_BIND_HEAD_LEN,
            },
            Stmt2Layout::V2 {
                binary_header_length: 8,
            },
        ]
        .into_iter()
        .map(|layout| {
            let payload = Stmt2Framer::new(layout)
                .encode(&data, BindMode::Insert(&fields))
                .unwrap();
            bind_request(4, payload, layout.prefix_len()).as_slice().to_vec()
        })
        .collect();
        assert_eq!(frames[0], frames[1]);
        assert_eq!(frames[0], frames[2]);
    }
}
