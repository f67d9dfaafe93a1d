use crate::protocol::header::FrameHeader;

/// One unit of the collection stream.
///
/// Within one sender, frames arrive in the order sent. A sender emits any
/// number of `Chunk`s (including empty ones) followed by exactly one
/// `EndOfStream`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Raw bytes to append to the merged output.
    Chunk(Vec<u8>),
    /// The sender has nothing more to send.
    EndOfStream,
}

impl Frame {
    pub fn header(&self) -> FrameHeader {
        match self {
            Frame::Chunk(data) => FrameHeader::Chunk { len: data.len() },
            Frame::EndOfStream => FrameHeader::EndOfStream,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Frame::EndOfStream)
    }

    /// Payload length; zero for `EndOfStream`.
    pub fn payload_len(&self) -> usize {
        match self {
            Frame::Chunk(data) => data.len(),
            Frame::EndOfStream => 0,
        }
    }
}
