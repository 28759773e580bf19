//! Wire Protocol
//!
//! Minimal framed binary protocol spoken to the coordination service:
//! timestamp requests and sweep dispatches, one request-response pair at a
//! time per connection.

mod codec;
mod command;
mod frame;

pub use codec::WireCodec;
pub use command::{decode_tso_reply, SweepRequest};
pub use frame::{Frame, FrameHeader, OpCode, HEADER_SIZE, MAGIC, VERSION};
