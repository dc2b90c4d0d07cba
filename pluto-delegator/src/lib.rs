#![deny(missing_docs)]
//! Remote delegation bridge for Pluto.
//!
//! Exposes any [`Dispatcher`](pluto_core::Dispatcher) to remote callers over
//! TCP. Frames are single lines of JSON; see [`protocol`] for their shape.
//!
//! ```no_run
//! use pluto_delegator::{DelegatorClient, DelegatorConfig, DelegatorServer};
//! # async fn demo(dispatcher: std::sync::Arc<dyn pluto_core::Dispatcher>) -> Result<(), Box<dyn std::error::Error>> {
//! let server = DelegatorServer::bind(dispatcher, &DelegatorConfig::default()).await?;
//! let addr = server.local_addr()?;
//! let shutdown = tokio_util::sync::CancellationToken::new();
//! tokio::spawn(server.serve(shutdown.clone()));
//!
//! let client = DelegatorClient::connect(addr).await?;
//! let names = client.list_components().await?;
//! # let _ = names;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod delegator;
pub mod error;
pub mod protocol;
pub mod server;

pub use client::DelegatorClient;
pub use codec::{decode_value, encode_value};
pub use config::DelegatorConfig;
pub use delegator::Delegator;
pub use error::{ClientError, ConfigError, DelegatorError, ErrorCode, RemoteError};
pub use protocol::{
    Outcome, PROTOCOL_VERSION, Reply, Request, RequestEnvelope, ResponseEnvelope,
};
pub use server::DelegatorServer;
