//! Remote client for a [`DelegatorServer`](crate::DelegatorServer).

use crate::codec::{decode_value, encode_value};
use crate::error::ClientError;
use crate::protocol::{Reply, Request, RequestEnvelope, ResponseEnvelope};
use futures::{SinkExt, StreamExt};
use pluto_core::Value;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};

/// Waiters by request id. `None` once the connection has closed.
type Pending = Arc<Mutex<Option<HashMap<u64, oneshot::Sender<Result<ResponseEnvelope, ClientError>>>>>>;

/// A connection to a remote delegator.
///
/// Requests may be issued concurrently from several tasks; responses are
/// matched to requests by id. Failures reported by the server surface as
/// [`ClientError::Remote`], whose code callers can branch on.
///
/// Nothing is retried. A call that fails with a transport error may or may
/// not have run on the server.
pub struct DelegatorClient {
    writer: tokio::sync::Mutex<FramedWrite<OwnedWriteHalf, LinesCodec>>,
    pending: Pending,
    next_id: AtomicU64,
    reader: JoinHandle<()>,
}

impl DelegatorClient {
    /// Connect to a delegator listening at `addr`, accepting responses of
    /// any size.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Io`] if the connection cannot be established.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        Self::connect_with(addr, usize::MAX).await
    }

    /// Connect to a delegator listening at `addr`, refusing responses longer
    /// than `max_response_len` bytes.
    ///
    /// An oversize response fails only the request it answers, with
    /// [`ClientError::Protocol`]. The connection stays usable.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Io`] if the connection cannot be established.
    pub async fn connect_with(
        addr: impl ToSocketAddrs,
        max_response_len: usize,
    ) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        let (read, write) = stream.into_split();
        let pending: Pending = Arc::new(Mutex::new(Some(HashMap::new())));

        // Unbounded on the wire: a codec length error would end the stream
        // and strand every other waiter, so the limit is applied per frame.
        let frames = FramedRead::new(read, LinesCodec::new());
        let reader = tokio::spawn(route_responses(
            frames,
            Arc::clone(&pending),
            max_response_len,
        ));

        Ok(Self {
            writer: tokio::sync::Mutex::new(FramedWrite::new(write, LinesCodec::new())),
            pending,
            next_id: AtomicU64::new(1),
            reader,
        })
    }

    /// Send a raw request and wait for its reply.
    pub async fn request(&self, request: Request) -> Result<Reply, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = serde_json::to_string(&RequestEnvelope::new(id, request))
            .map_err(|e| ClientError::Protocol(e.to_string()))?;

        let (tx, rx) = oneshot::channel();
        match self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            Some(waiters) => waiters.insert(id, tx),
            None => return Err(ClientError::Closed),
        };

        let sent = self.writer.lock().await.send(frame).await;
        if let Err(err) = sent {
            if let Some(waiters) = self
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .as_mut()
            {
                waiters.remove(&id);
            }
            return Err(match err {
                LinesCodecError::Io(io) => ClientError::Io(io),
                other => ClientError::Protocol(other.to_string()),
            });
        }

        let response = rx.await.map_err(|_| ClientError::Closed)??;
        Ok(response.into_result()?)
    }

    /// Names of every component registered on the server.
    pub async fn list_components(&self) -> Result<Vec<String>, ClientError> {
        let reply = self.request(Request::ListComponents).await?;
        require(reply.components, "components")
    }

    /// Method names exposed by `component`.
    pub async fn list_methods(&self, component: &str) -> Result<Vec<String>, ClientError> {
        let reply = self
            .request(Request::ListMethods {
                component: component.to_owned(),
            })
            .await?;
        require(reply.methods, "methods")
    }

    /// Variable names exposed by `component`.
    pub async fn list_variables(&self, component: &str) -> Result<Vec<String>, ClientError> {
        let reply = self
            .request(Request::ListVariables {
                component: component.to_owned(),
            })
            .await?;
        require(reply.variables, "variables")
    }

    /// Invoke `component.method(args)` remotely.
    pub async fn call_method(
        &self,
        component: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, ClientError> {
        let reply = self
            .request(Request::CallMethod {
                component: component.to_owned(),
                method: method.to_owned(),
                args: args.iter().map(encode_value).collect(),
            })
            .await?;
        decode(require(reply.result, "result")?)
    }

    /// Write `variable` on `component` remotely.
    pub async fn set_variable(
        &self,
        component: &str,
        variable: &str,
        value: &Value,
    ) -> Result<(), ClientError> {
        self.request(Request::SetVariable {
            component: component.to_owned(),
            variable: variable.to_owned(),
            value: encode_value(value),
        })
        .await?;
        Ok(())
    }

    /// Read `variable` from `component` remotely.
    pub async fn get_variable(&self, component: &str, variable: &str) -> Result<Value, ClientError> {
        let reply = self
            .request(Request::GetVariable {
                component: component.to_owned(),
                variable: variable.to_owned(),
            })
            .await?;
        decode(require(reply.value, "value")?)
    }
}

impl Drop for DelegatorClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Just the id of a response frame.
#[derive(Deserialize)]
struct FrameId {
    id: u64,
}

async fn route_responses(
    mut frames: FramedRead<OwnedReadHalf, LinesCodec>,
    pending: Pending,
    max_len: usize,
) {
    while let Some(frame) = frames.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                tracing::debug!(error = %err, "pluto.client.read.failed");
                break;
            }
        };
        let (id, outcome) = if frame.len() > max_len {
            let id = match serde_json::from_str::<FrameId>(&frame) {
                Ok(FrameId { id }) => id,
                Err(err) => {
                    tracing::warn!(error = %err, len = frame.len(), "pluto.client.frame.invalid");
                    continue;
                }
            };
            tracing::warn!(id, len = frame.len(), max_len, "pluto.client.response.oversize");
            let err = ClientError::Protocol(format!(
                "response of {} bytes exceeds the {max_len} byte limit",
                frame.len()
            ));
            (id, Err(err))
        } else {
            match serde_json::from_str::<ResponseEnvelope>(&frame) {
                Ok(response) => (response.id, Ok(response)),
                Err(err) => {
                    tracing::warn!(error = %err, "pluto.client.frame.invalid");
                    continue;
                }
            }
        };
        let waiter = pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
            .and_then(|waiters| waiters.remove(&id));
        match waiter {
            Some(tx) => {
                let _ = tx.send(outcome);
            }
            None => tracing::warn!(id, "pluto.client.response.unmatched"),
        }
    }
    // Dropping the senders wakes every waiter with `Closed`.
    pending
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
}

fn require<T>(field: Option<T>, name: &str) -> Result<T, ClientError> {
    field.ok_or_else(|| ClientError::Protocol(format!("response is missing `{name}`")))
}

fn decode(text: String) -> Result<Value, ClientError> {
    decode_value(&text).map_err(|e| ClientError::Protocol(format!("undecodable value: {e}")))
}
