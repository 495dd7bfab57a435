//! Common test utilities
//!
//! An in-memory [`Transport`] pair and a scripted fake server that speaks
//! enough of the WebSocket protocol to drive the client end to end.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tsdb_client::driver::{Connector, Frame, Transport};
use tsdb_client::{
    ColumnKind, ColumnType, ColumnValue, DriverError, DriverResult, Precision, RawBlockEncoder,
    Stmt2Header,
};

pub const SERVER_VERSION: &str = "3.3.6.0";
pub const RESULT_ID: u64 = 10;
pub const BIND_HEAD_LEN: usize = 30;

// ============================================================================
// In-memory transport
// ============================================================================

/// Server half of an in-memory connection.
pub struct ServerEnd {
    inbound: mpsc::UnboundedReceiver<Frame>,
    outbound: mpsc::UnboundedSender<DriverResult<Frame>>,
}

impl ServerEnd {
    /// Next frame written by the client; `None` once the client is gone.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.inbound.next().await
    }

    /// Next text request, skipping pings and pongs.
    pub async fn recv_json(&mut self) -> Option<Value> {
        while let Some(frame) = self.recv().await {
            match frame {
                Frame::Text(text) => return serde_json::from_str(&text).ok(),
                Frame::Close => return None,
                _ => continue,
            }
        }
        None
    }

    pub fn reply(&self, frame: Frame) {
        let _ = self.outbound.unbounded_send(Ok(frame));
    }

    pub fn reply_json(&self, value: Value) {
        self.reply(Frame::Text(value.to_string()));
    }

    /// Surfaces a read error on the client side.
    pub fn fail(&self, message: &str) {
        let _ = self
            .outbound
            .unbounded_send(Err(DriverError::Transport(message.to_string())));
    }
}

/// A connected client transport and the server end feeding it.
pub fn pipe() -> (Transport, ServerEnd) {
    let (client_tx, server_rx) = mpsc::unbounded::<Frame>();
    let (server_tx, client_rx) = mpsc::unbounded::<DriverResult<Frame>>();
    let sink = client_tx.sink_map_err(|err| DriverError::Transport(err.to_string()));
    let transport = Transport::new(Box::pin(sink), Box::pin(client_rx));
    (
        transport,
        ServerEnd {
            inbound: server_rx,
            outbound: server_tx,
        },
    )
}

pub fn req_id_of(request: &Value) -> u64 {
    request["args"]["req_id"].as_u64().unwrap_or_default()
}

// ============================================================================
// Connector
// ============================================================================

type OnDial = Box<dyn Fn(ServerEnd, usize) + Send + Sync>;

/// Hands out in-memory transports; `on_dial` receives the server end and
/// the zero-based dial attempt.
pub struct FakeConnector {
    on_dial: OnDial,
    dials: AtomicUsize,
    refuse_from: AtomicUsize,
}

impl FakeConnector {
    pub fn new(on_dial: impl Fn(ServerEnd, usize) + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            on_dial: Box::new(on_dial),
            dials: AtomicUsize::new(0),
            refuse_from: AtomicUsize::new(usize::MAX),
        })
    }

    /// Every connection is served by `db`.
    pub fn serving(db: FakeDb) -> Arc<Self> {
        Self::new(move |end, _| {
            tokio::spawn(db.clone().serve(end));
        })
    }

    /// Dial attempts from `attempt` on fail with a transport error.
    pub fn refuse_from(&self, attempt: usize) {
        self.refuse_from.store(attempt, Ordering::SeqCst);
    }

    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self) -> DriverResult<Transport> {
        let attempt = self.dials.fetch_add(1, Ordering::SeqCst);
        if attempt >= self.refuse_from.load(Ordering::SeqCst) {
            return Err(DriverError::Transport("connection refused".to_string()));
        }
        let (transport, end) = pipe();
        (self.on_dial)(end, attempt);
        Ok(transport)
    }
}

// ============================================================================
// Fake server
// ============================================================================

#[derive(Default)]
pub struct FakeDbState {
    /// Every JSON request, in arrival order.
    pub requests: Vec<Value>,
    /// Raw block writes: table name and block bytes.
    pub raw_blocks: Vec<(String, Vec<u8>)>,
    /// Stmt2 payloads with the bind head stripped.
    pub binds: Vec<Vec<u8>>,
    fetches: HashMap<u64, usize>,
    bound_rows: usize,
    next_stmt_id: u64,
}

/// Scripted server shared by every connection a [`FakeConnector`] opens.
#[derive(Clone)]
pub struct FakeDb {
    state: Arc<Mutex<FakeDbState>>,
    result_block: Arc<Vec<u8>>,
}

impl Default for FakeDb {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDb {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeDbState::default())),
            result_block: Arc::new(result_block()),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&FakeDbState) -> R) -> R {
        f(&self.state.lock())
    }

    /// Actions received so far, e.g. `["conn", "version"]`.
    pub fn actions(&self) -> Vec<String> {
        self.with(|s| {
            s.requests
                .iter()
                .filter_map(|r| r["action"].as_str().map(str::to_string))
                .collect()
        })
    }

    pub fn result_block(&self) -> Vec<u8> {
        self.result_block.as_ref().clone()
    }

    pub async fn serve(self, end: ServerEnd) {
        self.serve_limited(end, None).await;
    }

    /// Answers requests until the client closes, hanging up after `limit`
    /// text requests when one is given.
    pub async fn serve_limited(self, mut end: ServerEnd, limit: Option<usize>) {
        let mut answered = 0;
        while let Some(frame) = end.recv().await {
            match frame {
                Frame::Text(text) => {
                    let Ok(request) = serde_json::from_str::<Value>(&text) else {
                        continue;
                    };
                    if let Some(reply) = self.answer(request) {
                        end.reply_json(reply);
                    }
                    answered += 1;
                    if limit.is_some_and(|limit| answered >= limit) {
                        return;
                    }
                }
                Frame::Binary(data) => {
                    if let Some(reply) = self.answer_binary(&data) {
                        end.reply(reply);
                    }
                }
                Frame::Ping(data) => end.reply(Frame::Pong(data)),
                Frame::Pong(_) => {}
                Frame::Close => return,
            }
        }
    }

    fn answer(&self, request: Value) -> Option<Value> {
        let req_id = req_id_of(&request);
        let action = request["action"].as_str().unwrap_or_default().to_string();
        let args = request["args"].clone();
        let mut state = self.state.lock();
        state.requests.push(request);

        let mut body = match action.as_str() {
            "conn" if args["password"] == "wrong" => {
                error_body(0x0357, "Authentication failure")
            }
            "conn" | "stmt2_close" => json!({ "code": 0 }),
            "version" => json!({ "code": 0, "version": SERVER_VERSION }),
            "query" => query_body(args["sql"].as_str().unwrap_or_default()),
            "fetch" => {
                let id = args["id"].as_u64().unwrap_or_default();
                let seen = state.fetches.entry(id).or_default();
                *seen += 1;
                let completed = *seen > 1;
                let rows = if completed { 0 } else { 3 };
                json!({ "code": 0, "id": id, "completed": completed, "rows": rows })
            }
            "free_result" => return None,
            "stmt2_init" => {
                state.next_stmt_id += 1;
                json!({ "code": 0, "stmt_id": state.next_stmt_id })
            }
            "stmt2_prepare" => prepare_body(&args),
            "stmt2_exec" => {
                let affected = std::mem::take(&mut state.bound_rows);
                json!({ "code": 0, "stmt_id": args["stmt_id"], "affected": affected })
            }
            _ => error_body(0x0100, "unknown action"),
        };
        body["action"] = json!(action);
        body["req_id"] = json!(req_id);
        Some(body)
    }

    fn answer_binary(&self, data: &[u8]) -> Option<Frame> {
        if data.len() < 24 {
            return None;
        }
        let req_id = LittleEndian::read_u64(&data[0..8]);
        let object_id = LittleEndian::read_u64(&data[8..16]);
        match LittleEndian::read_u64(&data[16..24]) {
            4 => {
                let name_len = LittleEndian::read_u16(&data[28..30]) as usize;
                let table = String::from_utf8_lossy(&data[30..30 + name_len]).into_owned();
                let block = data[30 + name_len..].to_vec();
                let mut reply = if table == "missing" {
                    error_body(0x2662, "Table does not exist")
                } else {
                    json!({ "code": 0 })
                };
                self.state.lock().raw_blocks.push((table, block));
                reply["action"] = json!("write_raw_block");
                reply["req_id"] = json!(req_id);
                Some(Frame::Text(reply.to_string()))
            }
            7 => Some(Frame::Binary(fetch_block_reply(
                req_id,
                object_id,
                &self.result_block,
            ))),
            9 => {
                let payload = data[BIND_HEAD_LEN..].to_vec();
                let mut state = self.state.lock();
                state.bound_rows += bound_rows(&payload);
                state.binds.push(payload);
                Some(Frame::Text(
                    json!({ "code": 0, "action": "stmt2_bind", "req_id": req_id, "stmt_id": object_id })
                        .to_string(),
                ))
            }
            _ => None,
        }
    }
}

fn error_body(code: i32, message: &str) -> Value {
    json!({ "code": code, "message": message })
}

fn query_body(sql: &str) -> Value {
    let sql = sql.trim().to_lowercase();
    if sql.starts_with("insert") || sql.starts_with("create") {
        json!({ "code": 0, "id": 0, "is_update": true, "affected_rows": 3 })
    } else if sql.starts_with("select") || sql.starts_with("show") {
        json!({
            "code": 0,
            "id": RESULT_ID,
            "is_update": false,
            "fields_count": 2,
            "fields_names": ["ts", "v"],
            "fields_types": [9, 4],
            "fields_lengths": [8, 4],
            "precision": 0
        })
    } else {
        error_body(0x2600, "syntax error near 'x'")
    }
}

fn prepare_body(args: &Value) -> Value {
    let sql = args["sql"].as_str().unwrap_or_default().trim().to_lowercase();
    if sql.starts_with("insert") {
        json!({
            "code": 0,
            "stmt_id": args["stmt_id"],
            "is_insert": true,
            "fields_count": 4,
            "fields": [
                { "name": "tbname", "field_type": 8, "precision": 0, "scale": 0, "bytes": 272, "bind_type": 4 },
                { "name": "location", "field_type": 8, "precision": 0, "scale": 0, "bytes": 26, "bind_type": 2 },
                { "name": "ts", "field_type": 9, "precision": 0, "scale": 0, "bytes": 8, "bind_type": 1 },
                { "name": "current", "field_type": 4, "precision": 0, "scale": 0, "bytes": 4, "bind_type": 1 }
            ]
        })
    } else {
        json!({
            "code": 0,
            "stmt_id": args["stmt_id"],
            "is_insert": false,
            "fields_count": sql.matches('?').count()
        })
    }
}

/// Rows carried by a stmt2 payload, read from the first column block of
/// every table.
fn bound_rows(payload: &[u8]) -> usize {
    let Some(header) = Stmt2Header::parse(payload) else {
        return 0;
    };
    if header.cols_offset == 0 {
        return 0;
    }
    let count = header.count as usize;
    let lengths = header.cols_offset as usize;
    let mut block = lengths + 4 * count;
    let mut rows = 0;
    for table in 0..count {
        rows += LittleEndian::read_u32(&payload[block + 8..block + 12]) as usize;
        block += LittleEndian::read_u32(&payload[lengths + 4 * table..]) as usize;
    }
    rows
}

/// Binary reply to a fetch-raw-block request.
pub fn fetch_block_reply(req_id: u64, result_id: u64, block: &[u8]) -> Bytes {
    let mut out = Vec::with_capacity(64 + block.len());
    out.extend_from_slice(&u64::MAX.to_le_bytes());
    out.extend_from_slice(&7u64.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&0u64.to_le_bytes());
    out.extend_from_slice(&req_id.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&result_id.to_le_bytes());
    out.push(0);
    out.extend_from_slice(&(block.len() as u32).to_le_bytes());
    out.extend_from_slice(block);
    Bytes::from(out)
}

/// Schema of the fake result set: `ts TIMESTAMP, v INT`.
pub fn result_schema() -> Vec<ColumnType> {
    vec![
        ColumnType::timestamp(Precision::Millisecond),
        ColumnType::new(ColumnKind::Int),
    ]
}

/// Three rows, the middle `v` null.
pub fn result_block() -> Vec<u8> {
    let ts = |ms: i64| {
        ColumnValue::Timestamp(
            chrono::DateTime::from_timestamp_millis(1_700_000_000_000 + ms).unwrap_or_default(),
        )
    };
    RawBlockEncoder::encode_params(
        &[
            vec![ts(0), ts(1000), ts(2000)],
            vec![ColumnValue::Int(1), ColumnValue::Null, ColumnValue::Int(3)],
        ],
        &result_schema(),
    )
    .expect("fixture block encodes")
}
