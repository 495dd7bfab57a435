use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::action::Action;
use crate::error::{DriverError, DriverResult};

/// Fields every control response carries.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BaseResponse {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub req_id: u64,
    #[serde(default)]
    pub timing: u64,
}

impl BaseResponse {
    pub fn into_result(self) -> DriverResult<Self> {
        if self.code != 0 {
            return Err(DriverError::Protocol {
                code: self.code,
                message: self.message,
            });
        }
        Ok(self)
    }
}

#[derive(Deserialize)]
struct ReqIdProbe {
    req_id: Option<u64>,
}

/// Serializes `action` into its JSON envelope with `req_id` placed in `args`.
pub fn encode_request(action: &Action, req_id: u64) -> DriverResult<String> {
    let mut envelope = serde_json::to_value(action)?;
    let Value::Object(fields) = &mut envelope else {
        return Err(DriverError::Decode("action did not serialize to an object".to_string()));
    };
    let args = fields
        .entry("args")
        .or_insert_with(|| Value::Object(Map::new()));
    match args {
        Value::Object(args) => {
            args.insert("req_id".to_string(), Value::from(req_id));
        }
        _ => return Err(DriverError::Decode("action args are not an object".to_string())),
    }
    Ok(serde_json::to_string(&envelope)?)
}

/// Pulls `req_id` out of a text response without decoding the rest.
pub fn peek_req_id(text: &str) -> Option<u64> {
    serde_json::from_str::<ReqIdProbe>(text).ok()?.req_id
}

/// Decodes a text response, surfacing a non-zero `code` as
/// [`DriverError::Protocol`] before `T` is looked at.
pub fn decode_response<T: DeserializeOwned>(text: &str) -> DriverResult<T> {
    serde_json::from_str::<BaseResponse>(text)?.into_result()?;
    serde_json::from_str(text).map_err(|e| DriverError::Decode(format!("Invalid response: {}", e)))
}
