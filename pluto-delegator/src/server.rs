//! TCP server exposing a [`Delegator`] over newline-delimited JSON.

use crate::config::DelegatorConfig;
use crate::delegator::{Delegator, encode_response};
use crate::error::{DelegatorError, ErrorCode};
use crate::protocol::ResponseEnvelope;
use futures::{SinkExt, StreamExt};
use pluto_core::Dispatcher;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;

/// Responses queued per connection before request handlers wait.
const RESPONSE_QUEUE: usize = 64;

/// A bound delegator server.
///
/// Call [`serve`](DelegatorServer::serve) to accept connections until the
/// shutdown token fires. Requests on one connection are handled
/// concurrently; responses are written as they complete and carry the id
/// of the request they answer. A frame longer than the configured limit is
/// answered with an `invalid_request` error carrying id `0`, and the
/// connection is then closed.
pub struct DelegatorServer {
    delegator: Delegator,
    listener: TcpListener,
    max_frame_len: usize,
}

impl DelegatorServer {
    /// Bind the listening socket described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`DelegatorError::Bind`] if the address cannot be bound.
    pub async fn bind(
        dispatcher: Arc<dyn Dispatcher>,
        config: &DelegatorConfig,
    ) -> Result<Self, DelegatorError> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| DelegatorError::Bind {
                addr: config.bind_addr,
                source,
            })?;
        Ok(Self {
            delegator: Delegator::new(dispatcher),
            listener,
            max_frame_len: config.max_frame_len,
        })
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> Result<SocketAddr, DelegatorError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` is cancelled.
    ///
    /// Open connections stop reading new requests on shutdown; requests
    /// already being handled still get their response.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<(), DelegatorError> {
        let addr = self.local_addr()?;
        tracing::info!(%addr, "pluto.delegator.listen");
        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!(%peer, "pluto.delegator.connection.open");
                    let connection = Connection {
                        delegator: self.delegator.clone(),
                        max_frame_len: self.max_frame_len,
                        shutdown: shutdown.child_token(),
                    };
                    tokio::spawn(async move {
                        connection.run(stream).await;
                        tracing::debug!(%peer, "pluto.delegator.connection.closed");
                    });
                }
                Err(err) => {
                    tracing::warn!(error = %err, "pluto.delegator.accept.failed");
                }
            }
        }
        tracing::info!(%addr, "pluto.delegator.stopped");
        Ok(())
    }
}

struct Connection {
    delegator: Delegator,
    max_frame_len: usize,
    shutdown: CancellationToken,
}

impl Connection {
    async fn run(self, stream: TcpStream) {
        let (read, write) = stream.into_split();
        let mut frames = FramedRead::new(read, LinesCodec::new_with_max_length(self.max_frame_len));
        let mut sink = FramedWrite::new(write, LinesCodec::new());

        let (tx, mut rx) = mpsc::channel::<String>(RESPONSE_QUEUE);
        let writer = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if let Err(err) = sink.send(frame).await {
                    tracing::debug!(error = %err, "pluto.delegator.write.failed");
                    break;
                }
            }
        });

        loop {
            let next = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                next = frames.next() => next,
            };
            match next {
                None => break,
                Some(Ok(frame)) if frame.trim().is_empty() => {}
                Some(Ok(frame)) => {
                    let delegator = self.delegator.clone();
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let response = delegator.handle_frame(&frame).await;
                        let _ = tx.send(response).await;
                    });
                }
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    let response = ResponseEnvelope::failure(
                        0,
                        ErrorCode::InvalidRequest,
                        format!("frame exceeds {} bytes", self.max_frame_len),
                    );
                    let _ = tx.send(encode_response(&response)).await;
                    break;
                }
                Some(Err(LinesCodecError::Io(err))) => {
                    tracing::debug!(error = %err, "pluto.delegator.read.failed");
                    break;
                }
            }
        }

        drop(tx);
        let _ = writer.await;
    }
}
