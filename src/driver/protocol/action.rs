use serde::Serialize;

/// Control request sent as a JSON text frame: `{"action": ..., "args": {...}}`.
///
/// The request id is not part of the variant; the multiplexer adds it to
/// `args` when the request is sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", content = "args", rename_all = "snake_case")]
pub enum Action {
    Conn {
        user: String,
        password: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        db: Option<String>,
    },
    Version,
    Query {
        sql: String,
    },
    Fetch {
        id: u64,
    },
    FreeResult {
        id: u64,
    },
    Stmt2Init {
        single_stb_insert: bool,
        single_table_bind_once: bool,
    },
    Stmt2Prepare {
        stmt_id: u64,
        sql: String,
        get_fields: bool,
    },
    Stmt2Exec {
        stmt_id: u64,
    },
    Stmt2Close {
        stmt_id: u64,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Conn { .. } => "conn",
            Action::Version => "version",
            Action::Query { .. } => "query",
            Action::Fetch { .. } => "fetch",
            Action::FreeResult { .. } => "free_result",
            Action::Stmt2Init { .. } => "stmt2_init",
            Action::Stmt2Prepare { .. } => "stmt2_prepare",
            Action::Stmt2Exec { .. } => "stmt2_exec",
            Action::Stmt2Close { .. } => "stmt2_close",
        }
    }
}
