use serde::Deserialize;

use crate::stmt2::Stmt2Field;
use crate::types::{ColumnKind, ColumnType, Precision};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VersionResp {
    #[serde(default)]
    pub version: String,
}

/// Reply to a `query` action. Statements that change data report
/// `is_update` and `affected_rows`; everything else opens a result set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResp {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub is_update: bool,
    #[serde(default)]
    pub affected_rows: usize,
    #[serde(default)]
    pub fields_count: usize,
    #[serde(default)]
    pub fields_names: Option<Vec<String>>,
    #[serde(default)]
    pub fields_types: Option<Vec<u8>>,
    #[serde(default)]
    pub fields_lengths: Option<Vec<u32>>,
    #[serde(default)]
    pub precision: u8,
}

impl QueryResp {
    /// Column types of the result set; unknown type codes are skipped.
    pub fn column_types(&self) -> Vec<ColumnType> {
        let precision = Precision::from_server_code(self.precision).unwrap_or_default();
        let types = self.fields_types.as_deref().unwrap_or_default();
        let lengths = self.fields_lengths.as_deref().unwrap_or_default();
        types
            .iter()
            .enumerate()
            .filter_map(|(i, &code)| {
                let kind = ColumnKind::from_code(code)?;
                let mut ty = ColumnType::new(kind);
                ty.precision = precision;
                if let Some(&bytes) = lengths.get(i) {
                    ty.bytes = bytes;
                }
                Some(ty)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchResp {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub rows: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Stmt2InitResp {
    pub stmt_id: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Stmt2PrepareResp {
    pub stmt_id: u64,
    #[serde(default)]
    pub is_insert: bool,
    #[serde(default)]
    pub fields: Option<Vec<Stmt2Field>>,
    #[serde(default)]
    pub fields_count: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Stmt2BindResp {
    #[serde(default)]
    pub stmt_id: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Stmt2ExecResp {
    #[serde(default)]
    pub stmt_id: u64,
    #[serde(default)]
    pub affected: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stmt2::BindType;

    #[test]
    fn test_query_resp_column_types() {
        let resp: QueryResp = serde_json::from_str(
            r#"{"code":0,"id":4,"is_update":false,"fields_count":2,
                "fields_names":["ts","v"],"fields_types":[9,10],"fields_lengths":[8,20],"precision":1}"#,
        )
        .unwrap();
        let types = resp.column_types();
        assert_eq!(types.len(), 2);
        assert_eq!(types[0].kind, ColumnKind::Timestamp);
        assert_eq!(types[0].precision, Precision::Microsecond);
        assert_eq!(types[1].kind, ColumnKind::NChar);
        assert_eq!(types[1].bytes, 20);
    }

    #[test]
    fn test_prepare_resp_fields() {
        let resp: Stmt2PrepareResp = serde_json::from_str(
            r#"{"code":0,"stmt_id":2,"is_insert":true,"fields_count":3,"fields":[
                {"name":"tbname","field_type":8,"precision":0,"scale":0,"bytes":272,"bind_type":4},
                {"name":"t1","field_type":4,"precision":0,"scale":0,"bytes":4,"bind_type":2},
                {"name":"ts","field_type":9,"precision":2,"scale":0,"bytes":8,"bind_type":1}]}"#,
        )
        .unwrap();
        let fields = resp.fields.unwrap();
        assert_eq!(fields[0].bind_type, BindType::TableName);
        assert_eq!(fields[2].timestamp_precision(), Precision::Nanosecond);
    }
}
