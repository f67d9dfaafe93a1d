//! Collection stream wire protocol.
//!
//! A [`Frame`] is only turned into bytes at the transport boundary: an 8-byte
//! control message carrying the payload length (or the end-of-stream
//! sentinel), then the payload itself on a second tag.

mod codec;
mod frame;
mod header;

pub use codec::{recv_frame, send_frame};
pub use frame::Frame;
pub use header::{CONTROL_SIZE, END_OF_STREAM, FrameHeader};
