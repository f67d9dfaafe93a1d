/// Size of a control message in bytes.
pub const CONTROL_SIZE: usize = 8;

/// Length value that marks the end of a sender's stream.
pub const END_OF_STREAM: i64 = -1;

/// Decoded control message announcing what follows on the payload tag.
///
/// ```text
/// [0..8] length: i64 LE    (>= 0: payload bytes follow, -1: end of stream)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameHeader {
    /// A payload of exactly `len` bytes follows (possibly zero).
    Chunk { len: usize },
    /// No more frames from this sender; no payload follows.
    EndOfStream,
}

impl FrameHeader {
    /// Encode to the 8-byte control message.
    pub fn encode(&self) -> [u8; CONTROL_SIZE] {
        let len = match *self {
            FrameHeader::Chunk { len } => len as i64,
            FrameHeader::EndOfStream => END_OF_STREAM,
        };
        len.to_le_bytes()
    }

    /// Decode a control message.
    ///
    /// Returns `None` for a wrong-sized buffer or a negative length other
    /// than the end-of-stream sentinel.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        let bytes: [u8; CONTROL_SIZE] = buf.try_into().ok()?;
        match i64::from_le_bytes(bytes) {
            END_OF_STREAM => Some(FrameHeader::EndOfStream),
            len if len >= 0 => Some(FrameHeader::Chunk { len: len as usize }),
            _ => None,
        }
    }
}
