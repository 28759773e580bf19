//! Wire Frame Structure
//!
//! Framed binary protocol for the coordination service: fixed 18-byte header
//! followed by an opcode-specific payload.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;

/// Magic bytes identifying the protocol: "SWPD"
pub const MAGIC: [u8; 4] = *b"SWPD";

/// Protocol version
pub const VERSION: u8 = 1;

/// Fixed header size in bytes
pub const HEADER_SIZE: usize = 18;

/// Operation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    /// Request a fresh timestamp from the oracle
    Tso = 0x01,
    /// Oracle reply carrying a raw timestamp
    TsoReply = 0x02,
    /// Dispatch a GC sweep at a safe point
    Sweep = 0x03,

    // Response codes
    Ok = 0x10,
    Error = 0x11,
}

impl OpCode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(OpCode::Tso),
            0x02 => Some(OpCode::TsoReply),
            0x03 => Some(OpCode::Sweep),
            0x10 => Some(OpCode::Ok),
            0x11 => Some(OpCode::Error),
            _ => None,
        }
    }
}

/// Frame header (18 bytes)
///
/// ```text
/// ┌──────────┬──────────┬──────────┬───────────────┬─────────────────┐
/// │  Magic   │ Version  │  OpCode  │  Payload Len  │   Request ID    │
/// │ (4 bytes)│ (1 byte) │ (1 byte) │   (4 bytes)   │    (8 bytes)    │
/// └──────────┴──────────┴──────────┴───────────────┴─────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: u8,
    pub opcode: OpCode,
    pub payload_len: u32,
    pub request_id: u64,
}

impl FrameHeader {
    pub fn new(opcode: OpCode, request_id: u64) -> Self {
        Self {
            version: VERSION,
            opcode,
            payload_len: 0,
            request_id,
        }
    }

    pub fn with_payload_len(mut self, len: u32) -> Self {
        self.payload_len = len;
        self
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_slice(&MAGIC);
        buf.put_u8(self.version);
        buf.put_u8(self.opcode as u8);
        buf.put_u32(self.payload_len);
        buf.put_u64(self.request_id);
    }

    pub fn decode(buf: &mut impl Buf) -> io::Result<Self> {
        let mut magic = [0u8; 4];
        buf.copy_to_slice(&mut magic);
        if magic != MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Invalid magic bytes",
            ));
        }

        let version = buf.get_u8();
        let opcode_byte = buf.get_u8();
        let opcode = OpCode::from_u8(opcode_byte).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid opcode: {}", opcode_byte),
            )
        })?;
        let payload_len = buf.get_u32();
        let request_id = buf.get_u64();

        Ok(Self {
            version,
            opcode,
            payload_len,
            request_id,
        })
    }
}

/// Complete frame with header and payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(opcode: OpCode, request_id: u64, payload: Bytes) -> Self {
        let header = FrameHeader::new(opcode, request_id).with_payload_len(payload.len() as u32);
        Self { header, payload }
    }

    /// Timestamp request (empty payload)
    pub fn tso(request_id: u64) -> Self {
        Self::new(OpCode::Tso, request_id, Bytes::new())
    }

    /// Timestamp reply carrying a raw timestamp
    pub fn tso_reply(request_id: u64, raw_ts: u64) -> Self {
        let mut buf = BytesMut::with_capacity(8);
        buf.put_u64(raw_ts);
        Self::new(OpCode::TsoReply, request_id, buf.freeze())
    }

    pub fn ok(request_id: u64) -> Self {
        Self::new(OpCode::Ok, request_id, Bytes::new())
    }

    pub fn error(request_id: u64, msg: &str) -> Self {
        Self::new(
            OpCode::Error,
            request_id,
            Bytes::copy_from_slice(msg.as_bytes()),
        )
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        self.header.encode(buf);
        buf.put_slice(&self.payload);
    }
}
