//! Request Payload Encoding
//!
//! Typed payloads carried inside wire frames.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;

use super::frame::{Frame, OpCode};
use crate::config::ExecMode;

const MODE_DISTRIBUTED: u8 = 0;
const MODE_LOCAL: u8 = 1;

/// A GC sweep dispatch request.
///
/// Carries the raw safe point, the execution mode, and an opaque identifier
/// the executor uses for its own idempotence and logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepRequest {
    pub safe_point: u64,
    pub mode: ExecMode,
    pub identifier: String,
}

impl SweepRequest {
    /// Encode into a `Sweep` frame.
    pub fn to_frame(&self, request_id: u64) -> Frame {
        let mut buf = BytesMut::with_capacity(8 + 5 + 2 + self.identifier.len());
        buf.put_u64(self.safe_point);
        match self.mode {
            ExecMode::Distributed => buf.put_u8(MODE_DISTRIBUTED),
            ExecMode::Local { concurrency } => {
                buf.put_u8(MODE_LOCAL);
                buf.put_u32(concurrency as u32);
            }
        }
        buf.put_u16(self.identifier.len() as u16);
        buf.put_slice(self.identifier.as_bytes());

        Frame::new(OpCode::Sweep, request_id, buf.freeze())
    }

    /// Decode from a `Sweep` frame payload.
    pub fn from_frame(frame: &Frame) -> io::Result<Self> {
        if frame.header.opcode != OpCode::Sweep {
            return Err(unexpected(frame.header.opcode));
        }

        let mut payload = frame.payload.clone();
        if payload.remaining() < 9 {
            return Err(truncated());
        }
        let safe_point = payload.get_u64();
        let mode = match payload.get_u8() {
            MODE_DISTRIBUTED => ExecMode::Distributed,
            MODE_LOCAL => {
                if payload.remaining() < 4 {
                    return Err(truncated());
                }
                ExecMode::Local {
                    concurrency: payload.get_u32() as usize,
                }
            }
            tag => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Invalid sweep mode tag: {}", tag),
                ))
            }
        };

        if payload.remaining() < 2 {
            return Err(truncated());
        }
        let id_len = payload.get_u16() as usize;
        if payload.remaining() < id_len {
            return Err(truncated());
        }
        let identifier = read_string(&mut payload, id_len)?;

        Ok(Self {
            safe_point,
            mode,
            identifier,
        })
    }
}

/// Extract the raw timestamp out of a `TsoReply` frame.
pub fn decode_tso_reply(frame: &Frame) -> io::Result<u64> {
    if frame.header.opcode != OpCode::TsoReply {
        return Err(unexpected(frame.header.opcode));
    }
    if frame.payload.len() < 8 {
        return Err(truncated());
    }
    let mut payload = frame.payload.clone();
    Ok(payload.get_u64())
}

fn read_string(payload: &mut Bytes, len: usize) -> io::Result<String> {
    let raw = payload.split_to(len);
    String::from_utf8(raw.to_vec())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "Identifier is not UTF-8"))
}

fn unexpected(opcode: OpCode) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("Unexpected opcode: {:?}", opcode),
    )
}

fn truncated() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "Truncated payload")
}
