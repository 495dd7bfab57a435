//! Binary frames: a 24-byte correlation prefix followed by a payload.
//!
//! ```text
//! request   req_id:u64 object_id:u64 message_kind:u64 body
//! ```

use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;

use crate::error::{DriverError, DriverResult, EncodeError};

pub const BINARY_PREFIX_LEN: usize = 24;
/// Prefix plus `version:u16` and `col_idx:i32`.
pub const STMT2_BIND_HEAD_LEN: usize = BINARY_PREFIX_LEN + 6;
/// Where `req_id` sits in a binary response.
pub const RESPONSE_REQ_ID_OFFSET: usize = 26;

const BINARY_VERSION: u16 = 1;
const STMT2_COL_IDX_ALL: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum MessageKind {
    RawBlock = 4,
    FetchRawBlock = 7,
    Stmt2Bind = 9,
}

impl MessageKind {
    pub fn code(self) -> u64 {
        self as u64
    }
}

/// An outbound binary frame whose `req_id` is filled in by the multiplexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryRequest {
    buf: Vec<u8>,
    kind: MessageKind,
    /// Raw block writes use the request id as their object id.
    object_is_req_id: bool,
}

impl BinaryRequest {
    /// Prepends a fresh prefix to `body`.
    pub fn new(object_id: u64, kind: MessageKind, body: &[u8]) -> Self {
        let mut buf = vec![0u8; BINARY_PREFIX_LEN + body.len()];
        buf[BINARY_PREFIX_LEN..].copy_from_slice(body);
        Self::from_reserved(buf, object_id, kind)
    }

    /// Adopts a buffer whose first [`BINARY_PREFIX_LEN`] bytes are reserved.
    pub fn from_reserved(mut buf: Vec<u8>, object_id: u64, kind: MessageKind) -> Self {
        if buf.len() < BINARY_PREFIX_LEN {
            buf.resize(BINARY_PREFIX_LEN, 0);
        }
        LittleEndian::write_u64(&mut buf[8..16], object_id);
        LittleEndian::write_u64(&mut buf[16..24], kind.code());
        Self {
            buf,
            kind,
            object_is_req_id: false,
        }
    }

    /// Stmt2 bind frame. `payload` either already reserves
    /// [`STMT2_BIND_HEAD_LEN`] leading bytes or is a bare stmt2 payload.
    pub fn stmt2_bind(stmt_id: u64, payload: Vec<u8>, head_reserved: bool) -> Self {
        let mut buf = if head_reserved {
            payload
        } else {
            let mut buf = vec![0u8; STMT2_BIND_HEAD_LEN + payload.len()];
            buf[STMT2_BIND_HEAD_LEN..].copy_from_slice(&payload);
            buf
        };
        if buf.len() < STMT2_BIND_HEAD_LEN {
            buf.resize(STMT2_BIND_HEAD_LEN, 0);
        }
        LittleEndian::write_u16(&mut buf[24..26], BINARY_VERSION);
        LittleEndian::write_i32(&mut buf[26..30], STMT2_COL_IDX_ALL);
        Self::from_reserved(buf, stmt_id, MessageKind::Stmt2Bind)
    }

    /// `rows:u32 table_name_len:u16 table_name raw_block`
    ///
    /// Fails when the name length or row count does not fit its field.
    pub fn raw_block(table_name: &str, rows: usize, block: &[u8]) -> Result<Self, EncodeError> {
        let name = table_name.as_bytes();
        let name_len =
            u16::try_from(name.len()).map_err(|_| EncodeError::TableNameTooLong { len: name.len() })?;
        let rows = u32::try_from(rows).map_err(|_| EncodeError::TooManyRows { rows })?;
        let head = BINARY_PREFIX_LEN + 4 + 2 + name.len();
        let mut buf = vec![0u8; head + block.len()];
        LittleEndian::write_u32(&mut buf[24..28], rows);
        LittleEndian::write_u16(&mut buf[28..30], name_len);
        buf[30..head].copy_from_slice(name);
        buf[head..].copy_from_slice(block);
        let mut request = Self::from_reserved(buf, 0, MessageKind::RawBlock);
        request.object_is_req_id = true;
        Ok(request)
    }

    /// `version:u16`
    pub fn fetch_raw_block(result_id: u64) -> Self {
        let mut version = [0u8; 2];
        LittleEndian::write_u16(&mut version, BINARY_VERSION);
        Self::new(result_id, MessageKind::FetchRawBlock, &version)
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn req_id(&self) -> u64 {
        LittleEndian::read_u64(&self.buf[0..8])
    }

    pub fn object_id(&self) -> u64 {
        LittleEndian::read_u64(&self.buf[8..16])
    }

    pub fn set_req_id(&mut self, req_id: u64) {
        LittleEndian::write_u64(&mut self.buf[0..8], req_id);
        if self.object_is_req_id {
            LittleEndian::write_u64(&mut self.buf[8..16], req_id);
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.buf)
    }
}

/// Request id of a binary response, if the frame is long enough to hold one.
pub fn response_req_id(frame: &[u8]) -> Option<u64> {
    frame
        .get(RESPONSE_REQ_ID_OFFSET..RESPONSE_REQ_ID_OFFSET + 8)
        .map(LittleEndian::read_u64)
}

/// Decoded reply to a fetch-raw-block request.
///
/// ```text
/// flag:u64 action:u64 version:u16 time:u64 req_id:u64 code:u32
/// message_len:u32 message result_id:u64 finished:u8 block_len:u32 block
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRawBlockResponse {
    pub action: u64,
    pub version: u16,
    pub timing: u64,
    pub req_id: u64,
    pub code: u32,
    pub message: String,
    pub result_id: u64,
    pub finished: bool,
    pub block: Bytes,
}

struct Cursor<'a> {
    frame: &'a Bytes,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize) -> DriverResult<&'a [u8]> {
        let frame: &'a [u8] = self.frame;
        let end = self.pos + len;
        let slice = frame.get(self.pos..end).ok_or_else(|| {
            DriverError::Decode(format!(
                "fetch block response truncated: need {} bytes at {}, have {}",
                len,
                self.pos,
                frame.len()
            ))
        })?;
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> DriverResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> DriverResult<u16> {
        self.take(2).map(LittleEndian::read_u16)
    }

    fn u32(&mut self) -> DriverResult<u32> {
        self.take(4).map(LittleEndian::read_u32)
    }

    fn u64(&mut self) -> DriverResult<u64> {
        self.take(8).map(LittleEndian::read_u64)
    }
}

impl FetchRawBlockResponse {
    /// Parses `frame`; the returned block shares the frame's allocation.
    pub fn parse(frame: Bytes) -> DriverResult<Self> {
        let mut c = Cursor {
            frame: &frame,
            pos: 0,
        };
        let _flag = c.u64()?;
        let action = c.u64()?;
        let version = c.u16()?;
        let timing = c.u64()?;
        let req_id = c.u64()?;
        let code = c.u32()?;
        let message_len = c.u32()? as usize;
        let message = String::from_utf8_lossy(c.take(message_len)?).into_owned();
        if code != 0 {
            return Ok(Self {
                action,
                version,
                timing,
                req_id,
                code,
                message,
                result_id: 0,
                finished: true,
                block: Bytes::new(),
            });
        }
        let result_id = c.u64()?;
        let finished = c.u8()? != 0;
        let (block_len, start) = if finished {
            (0, c.pos)
        } else {
            let len = c.u32()? as usize;
            (len, c.pos)
        };
        c.take(block_len)?;
        Ok(Self {
            action,
            version,
            timing,
            req_id,
            code,
            message,
            result_id,
            finished,
            block: frame.slice(start..start + block_len),
        })
    }

    pub fn into_result(self) -> DriverResult<Self> {
        if self.code != 0 {
            return Err(DriverError::Protocol {
                code: self.code as i32,
                message: self.message,
            });
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a server-side fetch reply.
    fn fetch_reply(req_id: u64, result_id: u64, block: Option<&[u8]>) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&u64::MAX.to_le_bytes());
        out.extend_from_slice(&MessageKind::FetchRawBlock.code().to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&0u64.to_le_bytes());
        out.extend_from_slice(&req_id.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&result_id.to_le_bytes());
        match block {
            Some(block) => {
                out.push(0);
                out.extend_from_slice(&(block.len() as u32).to_le_bytes());
                out.extend_from_slice(block);
            }
            None => out.push(1),
        }
        out
    }

    #[test]
    fn test_prefix_layout() {
        let mut req = BinaryRequest::new(77, MessageKind::FetchRawBlock, &[1, 0]);
        req.set_req_id(5);
        let bytes = req.as_slice();
        assert_eq!(bytes.len(), 26);
        assert_eq!(LittleEndian::read_u64(&bytes[0..8]), 5);
        assert_eq!(LittleEndian::read_u64(&bytes[8..16]), 77);
        assert_eq!(LittleEndian::read_u64(&bytes[16..24]), 7);
        assert_eq!(&bytes[24..], &[1, 0]);
    }

    #[test]
    fn test_stmt2_head_reserved_and_bare_agree() {
        let payload = vec![9u8; 12];
        let mut reserved = vec![0u8; STMT2_BIND_HEAD_LEN];
        reserved.extend_from_slice(&payload);

        let a = BinaryRequest::stmt2_bind(3, reserved, true);
        let b = BinaryRequest::stmt2_bind(3, payload, false);
        assert_eq!(a, b);
        let bytes = a.as_slice();
        assert_eq!(LittleEndian::read_u64(&bytes[16..24]), 9);
        assert_eq!(LittleEndian::read_u16(&bytes[24..26]), 1);
        assert_eq!(LittleEndian::read_i32(&bytes[26..30]), -1);
    }

    #[test]
    fn test_raw_block_mirrors_req_id() {
        let mut req = BinaryRequest::raw_block("meters", 2, &[0xAA, 0xBB]).unwrap();
        req.set_req_id(11);
        assert_eq!(req.req_id(), 11);
        assert_eq!(req.object_id(), 11);
        let bytes = req.as_slice();
        assert_eq!(LittleEndian::read_u32(&bytes[24..28]), 2);
        assert_eq!(LittleEndian::read_u16(&bytes[28..30]), 6);
        assert_eq!(&bytes[30..36], b"meters");
        assert_eq!(&bytes[36..], &[0xAA, 0xBB]);
    }

    #[test]
    fn test_raw_block_rejects_oversized_fields() {
        let name = "t".repeat(u16::MAX as usize);
        let req = BinaryRequest::raw_block(&name, 1, &[0xAA]).unwrap();
        assert_eq!(LittleEndian::read_u16(&req.as_slice()[28..30]), u16::MAX);

        let name = "t".repeat(70_000);
        assert_eq!(
            BinaryRequest::raw_block(&name, 1, &[0xAA]),
            Err(EncodeError::TableNameTooLong { len: 70_000 })
        );

        let rows = u32::MAX as usize + 1;
        assert_eq!(
            BinaryRequest::raw_block("meters", rows, &[0xAA]),
            Err(EncodeError::TooManyRows { rows })
        );
    }

    #[test]
    fn test_parse_fetch_reply() {
        let frame = Bytes::from(fetch_reply(8, 100, Some(&[1, 2, 3])));
        assert_eq!(response_req_id(&frame), Some(8));
        let resp = FetchRawBlockResponse::parse(frame).unwrap();
        assert_eq!(resp.req_id, 8);
        assert_eq!(resp.result_id, 100);
        assert!(!resp.finished);
        assert_eq!(&resp.block[..], &[1, 2, 3]);

        let done = FetchRawBlockResponse::parse(Bytes::from(fetch_reply(9, 100, None))).unwrap();
        assert!(done.finished);
        assert!(done.block.is_empty());
    }

    #[test]
    fn test_parse_truncated_reply() {
        let mut raw = fetch_reply(8, 100, Some(&[1, 2, 3]));
        raw.truncate(raw.len() - 1);
        assert!(matches!(
            FetchRawBlockResponse::parse(Bytes::from(raw)),
            Err(DriverError::Decode(_))
        ));
        assert_eq!(response_req_id(&[0u8; 10]), None);
    }
}
