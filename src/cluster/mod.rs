//! Cluster Clients
//!
//! Connection handles to the coordination service: one for the timestamp
//! oracle, one for dispatching sweeps to the storage layer. Each handle owns
//! a single framed TCP connection and carries one request at a time, which
//! the single-flight scheduler guarantees by construction.

mod oracle;
mod storage;

pub use oracle::OracleClient;
pub use storage::StorageClient;

use thiserror::Error;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

use crate::protocol::{OpCode, WireCodec};

/// Failures while talking to the cluster
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no reachable endpoint among {0:?}")]
    NoReachableEndpoint(Vec<String>),

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("unexpected reply opcode: {0:?}")]
    UnexpectedReply(OpCode),

    #[error("reply for request {got}, expected {expected}")]
    RequestIdMismatch { expected: u64, got: u64 },

    #[error("remote error: {0}")]
    Remote(String),
}

/// Connect to the first reachable endpoint in the configured list.
async fn connect_any(endpoints: &[String]) -> Result<(Framed<TcpStream, WireCodec>, String), ClusterError> {
    for endpoint in endpoints {
        match TcpStream::connect(endpoint.as_str()).await {
            Ok(stream) => {
                debug!("Connected to {}", endpoint);
                return Ok((Framed::new(stream, WireCodec::new()), endpoint.clone()));
            }
            Err(e) => {
                warn!("Failed to connect to {}: {}", endpoint, e);
            }
        }
    }

    Err(ClusterError::NoReachableEndpoint(endpoints.to_vec()))
}

/// Send one frame and wait for its reply, enforcing request-id matching.
async fn round_trip(
    conn: &tokio::sync::Mutex<Framed<TcpStream, WireCodec>>,
    frame: crate::protocol::Frame,
) -> Result<crate::protocol::Frame, ClusterError> {
    use futures::{SinkExt, StreamExt};

    let expected = frame.header.request_id;
    let mut conn = conn.lock().await;
    conn.send(frame).await?;

    match conn.next().await {
        Some(Ok(reply)) => {
            if reply.header.request_id != expected {
                return Err(ClusterError::RequestIdMismatch {
                    expected,
                    got: reply.header.request_id,
                });
            }
            Ok(reply)
        }
        Some(Err(e)) => Err(e.into()),
        None => Err(ClusterError::ConnectionClosed),
    }
}
