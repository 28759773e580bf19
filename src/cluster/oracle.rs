//! Timestamp Oracle Client
//!
//! Fetches monotonically increasing cluster timestamps over the wire
//! protocol. One outstanding request at a time; the connection is closed
//! explicitly during shutdown.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::codec::Framed;
use tracing::info;

use super::{connect_any, round_trip, ClusterError};
use crate::protocol::{decode_tso_reply, Frame, OpCode, WireCodec};
use crate::scheduler::TimestampOracle;
use crate::timestamp::Timestamp;

/// Client handle for the timestamp oracle
pub struct OracleClient {
    conn: Mutex<Framed<TcpStream, WireCodec>>,
    request_id: AtomicU64,
    endpoint: String,
}

impl OracleClient {
    /// Connect to the first reachable coordination endpoint.
    pub async fn connect(endpoints: &[String]) -> Result<Self, ClusterError> {
        let (conn, endpoint) = connect_any(endpoints).await?;
        info!("Oracle client connected to {}", endpoint);

        Ok(Self {
            conn: Mutex::new(conn),
            request_id: AtomicU64::new(1),
            endpoint,
        })
    }

    /// The endpoint this client is connected to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Shut down the connection. Failure here is fatal to the caller.
    pub async fn close(&self) -> Result<(), ClusterError> {
        let mut conn = self.conn.lock().await;
        conn.get_mut().shutdown().await?;
        Ok(())
    }

    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl TimestampOracle for OracleClient {
    async fn current_timestamp(&self) -> Result<Timestamp, ClusterError> {
        let request = Frame::tso(self.next_request_id());
        let reply = round_trip(&self.conn, request).await?;

        match reply.header.opcode {
            OpCode::TsoReply => Ok(Timestamp::from_raw(decode_tso_reply(&reply)?)),
            OpCode::Error => Err(ClusterError::Remote(
                String::from_utf8_lossy(&reply.payload).into_owned(),
            )),
            opcode => Err(ClusterError::UnexpectedReply(opcode)),
        }
    }
}
