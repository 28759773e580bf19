//! Storage Client
//!
//! Dispatches GC sweeps to the cluster storage layer. The remote side owns
//! the sweep algorithm; this handle only issues the request and waits for
//! the terminal reply, however long the sweep runs.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::codec::Framed;
use tracing::info;

use super::{connect_any, round_trip, ClusterError};
use crate::config::ExecMode;
use crate::protocol::{Frame, OpCode, SweepRequest, WireCodec};
use crate::scheduler::GcExecutor;
use crate::timestamp::SafePoint;

/// Client handle for the cluster storage layer
pub struct StorageClient {
    conn: Mutex<Framed<TcpStream, WireCodec>>,
    request_id: AtomicU64,
    endpoint: String,
}

impl StorageClient {
    /// Connect to the first reachable coordination endpoint.
    pub async fn connect(endpoints: &[String]) -> Result<Self, ClusterError> {
        let (conn, endpoint) = connect_any(endpoints).await?;
        info!("Storage client connected to {}", endpoint);

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
impl GcExecutor for StorageClient {
    async fn run_sweep(
        &self,
        safe_point: SafePoint,
        mode: ExecMode,
        identifier: &str,
    ) -> Result<(), ClusterError> {
        let request = SweepRequest {
            safe_point: safe_point.into_raw(),
            mode,
            identifier: identifier.to_string(),
        };

        let reply = round_trip(&self.conn, request.to_frame(self.next_request_id())).await?;

        match reply.header.opcode {
            OpCode::Ok => Ok(()),
            OpCode::Error => Err(ClusterError::Remote(
                String::from_utf8_lossy(&reply.payload).into_owned(),
            )),
            opcode => Err(ClusterError::UnexpectedReply(opcode)),
        }
    }
}
