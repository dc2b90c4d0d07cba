//! The translation boundary between wire requests and registry dispatch.

use crate::codec::{decode_field, encode_value};
use crate::error::{ErrorCode, RemoteError};
use crate::protocol::{PROTOCOL_VERSION, Reply, Request, RequestEnvelope, ResponseEnvelope};
use pluto_core::Dispatcher;
use serde_json::Value;
use std::sync::Arc;

/// Serves remote requests against a [`Dispatcher`].
///
/// The delegator holds no state beyond its dispatcher. Calls and variable
/// writes are forwarded exactly once; nothing is retried here.
#[derive(Clone)]
pub struct Delegator {
    dispatcher: Arc<dyn Dispatcher>,
}

impl Delegator {
    /// Create a delegator over `dispatcher`.
    pub fn new(dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Handle one raw frame and produce the encoded response frame.
    ///
    /// Never fails: malformed frames, unknown operations and version
    /// mismatches are answered with an error response.
    pub async fn handle_frame(&self, frame: &str) -> String {
        let response = match parse_frame(frame) {
            Ok(envelope) => {
                let id = envelope.id;
                match self.handle(envelope.request).await {
                    Ok(reply) => ResponseEnvelope::ok(id, reply),
                    Err(error) => ResponseEnvelope::error(id, error),
                }
            }
            Err(rejected) => rejected,
        };
        encode_response(&response)
    }

    /// Handle one decoded request.
    pub async fn handle(&self, request: Request) -> Result<Reply, RemoteError> {
        let op = request.op();
        let result = self.dispatch(request).await;
        match &result {
            Ok(_) => tracing::debug!(op, "pluto.delegator.request"),
            Err(err) => tracing::debug!(op, code = %err.code, "pluto.delegator.request.failed"),
        }
        result
    }

    async fn dispatch(&self, request: Request) -> Result<Reply, RemoteError> {
        let reply = match request {
            Request::ListComponents => Reply {
                components: Some(self.dispatcher.list_components()),
                ..Reply::default()
            },
            Request::ListMethods { component } => Reply {
                methods: Some(
                    self.dispatcher
                        .list_methods(&component)?
                        .into_iter()
                        .map(|m| m.name)
                        .collect(),
                ),
                ..Reply::default()
            },
            Request::ListVariables { component } => Reply {
                variables: Some(
                    self.dispatcher
                        .list_variables(&component)?
                        .into_iter()
                        .map(|v| v.name)
                        .collect(),
                ),
                ..Reply::default()
            },
            Request::CallMethod {
                component,
                method,
                args,
            } => {
                let args = args
                    .iter()
                    .enumerate()
                    .map(|(i, text)| decode_field(&format!("args[{i}]"), text))
                    .collect::<Result<Vec<Value>, _>>()?;
                let result = self
                    .dispatcher
                    .call_method(&component, &method, args)
                    .await?;
                Reply {
                    result: Some(encode_value(&result)),
                    ..Reply::default()
                }
            }
            Request::SetVariable {
                component,
                variable,
                value,
            } => {
                let value = decode_field("value", &value)?;
                self.dispatcher
                    .set_variable(&component, &variable, value)
                    .await?;
                Reply::default()
            }
            Request::GetVariable {
                component,
                variable,
            } => {
                let value = self.dispatcher.get_variable(&component, &variable).await?;
                Reply {
                    value: Some(encode_value(&value)),
                    ..Reply::default()
                }
            }
        };
        Ok(reply)
    }
}

/// Parse a frame, or build the error response it deserves.
fn parse_frame(frame: &str) -> Result<RequestEnvelope, ResponseEnvelope> {
    let raw: Value = serde_json::from_str(frame).map_err(|err| {
        ResponseEnvelope::failure(0, ErrorCode::InvalidRequest, format!("malformed frame: {err}"))
    })?;
    let id = raw.get("id").and_then(Value::as_u64).unwrap_or(0);

    match raw.get("version").and_then(Value::as_str) {
        Some(PROTOCOL_VERSION) => {}
        Some(other) => {
            return Err(ResponseEnvelope::failure(
                id,
                ErrorCode::UnsupportedVersion,
                format!("unsupported protocol version {other:?}, expected {PROTOCOL_VERSION:?}"),
            ));
        }
        None => {
            return Err(ResponseEnvelope::failure(
                id,
                ErrorCode::InvalidRequest,
                "missing protocol version",
            ));
        }
    }

    serde_json::from_value(raw).map_err(|err| {
        ResponseEnvelope::failure(id, ErrorCode::InvalidRequest, format!("invalid request: {err}"))
    })
}

/// Encode a response frame. Responses contain only strings, integers and
/// lists of strings, so serialization cannot fail; the fallback keeps the
/// connection answering regardless.
pub(crate) fn encode_response(response: &ResponseEnvelope) -> String {
    serde_json::to_string(response).unwrap_or_else(|err| {
        format!(
            r#"{{"id":{},"status":"error","code":"invalid_request","message":"unencodable response: {}"}}"#,
            response.id,
            err.to_string().replace('"', "'")
        )
    })
}
