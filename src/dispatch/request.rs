//! Request envelope and reply shapes shared by every endpoint

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::DispatchError;

/// Method name that constructs the singleton instead of calling into it
pub const INIT_METHOD: &str = "__init__";

pub const CODE_OK: i32 = 0;
pub const CODE_ERROR: i32 = -1;

/// Keyword arguments as received on the wire
pub type Args = serde_json::Map<String, Value>;

/// Request body as posted by clients
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub var_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub func_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Args>,
}

/// A request after its shape has been checked
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Read a plain or dotted attribute
    Read { path: String },
    /// Construct the singleton if it does not exist yet
    Init { args: Args },
    /// Call a named method
    Invoke { method: String, args: Args },
}

impl Request {
    /// Attribute path or method name the request targets
    pub fn name(&self) -> &str {
        match self {
            Request::Read { path } => path,
            Request::Init { .. } => INIT_METHOD,
            Request::Invoke { method, .. } => method,
        }
    }
}

impl TryFrom<RawRequest> for Request {
    type Error = DispatchError;

    fn try_from(raw: RawRequest) -> Result<Self, Self::Error> {
        if let Some(path) = raw.var_name {
            return Ok(Request::Read { path });
        }

        let method = raw.func_name.ok_or_else(|| {
            DispatchError::MalformedRequest("expected `var_name` or `func_name`".to_string())
        })?;
        let args = raw.args.unwrap_or_default();

        if method == INIT_METHOD {
            Ok(Request::Init { args })
        } else {
            Ok(Request::Invoke { method, args })
        }
    }
}

/// Successful or soft-failed reply body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    /// Attribute read: `{"value": v, "code": c}`
    Value { value: Value, code: i32 },
    /// Init or invoke: `{"code": 0, "result": r}`
    Result { code: i32, result: Value },
}

impl Reply {
    pub fn value(value: Value) -> Self {
        Reply::Value { value, code: CODE_OK }
    }

    pub fn read_error() -> Self {
        Reply::Value {
            value: Value::String("error".to_string()),
            code: CODE_ERROR,
        }
    }

    pub fn result(result: Value) -> Self {
        Reply::Result { code: CODE_OK, result }
    }

    pub fn code(&self) -> i32 {
        match self {
            Reply::Value { code, .. } | Reply::Result { code, .. } => *code,
        }
    }
}
