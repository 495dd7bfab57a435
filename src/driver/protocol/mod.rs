//! Wire protocol of the WebSocket endpoint.
//!
//! Control requests travel as JSON text frames (`{"action", "args"}`) and
//! bulk data as binary frames behind a 24-byte correlation prefix.

pub mod action;
pub mod binary;
pub mod codec;
pub mod messages;

pub use action::Action;
pub use binary::{
    response_req_id, BinaryRequest, FetchRawBlockResponse, MessageKind, BINARY_PREFIX_LEN,
    RESPONSE_REQ_ID_OFFSET, STMT2_BIND_HEAD_LEN,
};
pub use codec::{decode_response, encode_request, peek_req_id, BaseResponse};
pub use messages::{
    FetchResp, QueryResp, Stmt2BindResp, Stmt2ExecResp, Stmt2InitResp, Stmt2PrepareResp,
    VersionResp,
};
