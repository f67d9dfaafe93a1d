use crate::error::{Result, ShardJoinError};
use crate::protocol::frame::Frame;
use crate::protocol::header::FrameHeader;
use crate::transport::TaggedTransport;
use crate::types::{FrameTags, Rank};

/// Send `frame` from this rank to `dest`.
///
/// The control message (payload length, or -1 for end of stream) travels on
/// the sender's control tag; the payload, if any, follows on its payload tag.
/// An empty chunk still sends its zero-length payload message.
pub async fn send_frame<T>(transport: &T, dest: Rank, frame: &Frame) -> Result<()>
where
    T: TaggedTransport + ?Sized,
{
    let tags = FrameTags::for_rank(transport.rank());
    transport
        .send_tagged(dest, tags.control, &frame.header().encode())
        .await?;
    if let Frame::Chunk(data) = frame {
        transport.send_tagged(dest, tags.payload, data).await?;
    }
    Ok(())
}

/// Receive the next frame sent by `src`.
///
/// Rejects malformed control messages, lengths above `max_frame_bytes`, and
/// payloads whose size differs from the announced length.
pub async fn recv_frame<T>(transport: &T, src: Rank, max_frame_bytes: usize) -> Result<Frame>
where
    T: TaggedTransport + ?Sized,
{
    let tags = FrameTags::for_rank(src);
    let control = transport.recv_tagged(src, tags.control).await?;
    let header = FrameHeader::decode(&control).ok_or_else(|| {
        ShardJoinError::protocol(src, format!("malformed control message {control:?}"))
    })?;

    match header {
        FrameHeader::EndOfStream => Ok(Frame::EndOfStream),
        FrameHeader::Chunk { len } => {
            if len > max_frame_bytes {
                return Err(ShardJoinError::protocol(
                    src,
                    format!("announced {len} bytes, limit is {max_frame_bytes}"),
                ));
            }
            let payload = transport.recv_tagged(src, tags.payload).await?;
            if payload.len() != len {
                return Err(ShardJoinError::protocol(
                    src,
                    format!("announced {len} bytes, received {}", payload.len()),
                ));
            }
            Ok(Frame::Chunk(payload))
        }
    }
}
