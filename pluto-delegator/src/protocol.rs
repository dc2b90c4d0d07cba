//! Wire protocol: newline-delimited JSON request and response frames.
//!
//! Request:
//!
//! ```json
//! {"id": 7, "version": "1", "op": "call_method", "component": "pump", "method": "start", "args": ["12"]}
//! ```
//!
//! Responses echo the request id:
//!
//! ```json
//! {"id": 7, "status": "ok", "result": "null"}
//! {"id": 7, "status": "error", "code": "arity_mismatch", "message": "..."}
//! ```
//!
//! Arguments, values and results are themselves JSON documents carried as
//! strings, so the envelope never depends on component-specific types.
//! Frames whose id cannot be recovered are answered with id `0`.

use crate::error::{ErrorCode, RemoteError};
use serde::{Deserialize, Serialize};

/// The protocol version this crate speaks.
pub const PROTOCOL_VERSION: &str = "1";

/// The six remote operations.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// List every registered component.
    ListComponents,
    /// List a component's method names.
    ListMethods {
        /// Target component.
        component: String,
    },
    /// List a component's variable names.
    ListVariables {
        /// Target component.
        component: String,
    },
    /// Invoke a method.
    CallMethod {
        /// Target component.
        component: String,
        /// Method to invoke.
        method: String,
        /// Encoded positional arguments.
        #[serde(default)]
        args: Vec<String>,
    },
    /// Write a variable.
    SetVariable {
        /// Target component.
        component: String,
        /// Variable to write.
        variable: String,
        /// Encoded value.
        value: String,
    },
    /// Read a variable.
    GetVariable {
        /// Target component.
        component: String,
        /// Variable to read.
        variable: String,
    },
}

impl Request {
    /// The operation name as it appears in the `op` field.
    pub fn op(&self) -> &'static str {
        match self {
            Self::ListComponents => "list_components",
            Self::ListMethods { .. } => "list_methods",
            Self::ListVariables { .. } => "list_variables",
            Self::CallMethod { .. } => "call_method",
            Self::SetVariable { .. } => "set_variable",
            Self::GetVariable { .. } => "get_variable",
        }
    }
}

/// A request with its correlation id and protocol version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Correlation id, echoed in the response.
    pub id: u64,
    /// Protocol version; must equal [`PROTOCOL_VERSION`].
    pub version: String,
    /// The operation and its fields.
    #[serde(flatten)]
    pub request: Request,
}

impl RequestEnvelope {
    /// Wrap `request` for the current protocol version.
    pub fn new(id: u64, request: Request) -> Self {
        Self {
            id,
            version: PROTOCOL_VERSION.to_owned(),
            request,
        }
    }
}

/// Fields of a successful response. Which field is present depends on the
/// operation; `set_variable` carries none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    /// `list_components`: component names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<String>>,
    /// `list_methods`: method names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods: Option<Vec<String>>,
    /// `list_variables`: variable names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Vec<String>>,
    /// `call_method`: encoded result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// `get_variable`: encoded value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Outcome of a request, tagged by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The operation succeeded.
    Ok(Reply),
    /// The operation failed.
    Error(RemoteError),
}

/// A response frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Id of the request this answers.
    pub id: u64,
    /// Result or error.
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl ResponseEnvelope {
    /// A successful response.
    pub fn ok(id: u64, reply: Reply) -> Self {
        Self {
            id,
            outcome: Outcome::Ok(reply),
        }
    }

    /// A failed response.
    pub fn error(id: u64, error: RemoteError) -> Self {
        Self {
            id,
            outcome: Outcome::Error(error),
        }
    }

    /// Shorthand for a failed response built from a code and message.
    pub fn failure(id: u64, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::error(id, RemoteError::new(code, message))
    }

    /// Convert into the reply, or the remote error.
    pub fn into_result(self) -> Result<Reply, RemoteError> {
        match self.outcome {
            Outcome::Ok(reply) => Ok(reply),
            Outcome::Error(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_envelope_is_flat() {
        let envelope = RequestEnvelope::new(
            7,
            Request::CallMethod {
                component: "pump".into(),
                method: "start".into(),
                args: vec!["12".into()],
            },
        );
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({
                "id": 7,
                "version": "1",
                "op": "call_method",
                "component": "pump",
                "method": "start",
                "args": ["12"]
            })
        );
    }

    #[test]
    fn unit_operation_parses_without_fields() {
        let envelope: RequestEnvelope =
            serde_json::from_value(json!({"id": 1, "version": "1", "op": "list_components"}))
                .unwrap();
        assert_eq!(envelope.request, Request::ListComponents);
        assert_eq!(envelope.request.op(), "list_components");
    }

    #[test]
    fn responses_are_tagged_by_status() {
        let ok = ResponseEnvelope::ok(
            3,
            Reply {
                value: Some("42".into()),
                ..Reply::default()
            },
        );
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"id": 3, "status": "ok", "value": "42"})
        );

        let err = ResponseEnvelope::failure(4, ErrorCode::NotFound, "component not found: x");
        let text = serde_json::to_string(&err).unwrap();
        let back: ResponseEnvelope = serde_json::from_str(&text).unwrap();
        assert_eq!(back, err);
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({"id": 4, "status": "error", "code": "not_found", "message": "component not found: x"})
        );
    }
}
