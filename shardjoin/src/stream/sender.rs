use crate::error::{Result, ShardJoinError};
use crate::protocol::{Frame, send_frame};
use crate::transport::TaggedTransport;
use crate::types::Rank;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// Counters for one completed send.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendStats {
    /// Frames sent, including the end-of-stream frame.
    pub frames: u64,
    pub lines: u64,
    /// Payload bytes sent.
    pub bytes: u64,
}

/// Streams a rank's partial file to the collector in line-bounded chunks.
pub struct StreamSender<'a, T: TaggedTransport + ?Sized> {
    transport: &'a T,
    collector: Rank,
    lines_per_chunk: usize,
}

impl<'a, T: TaggedTransport + ?Sized> StreamSender<'a, T> {
    pub fn new(transport: &'a T, collector: Rank, lines_per_chunk: usize) -> Self {
        Self {
            transport,
            collector,
            lines_per_chunk: lines_per_chunk.max(1),
        }
    }

    /// Send the whole file, then the end-of-stream frame.
    pub async fn send_file(&self, path: impl AsRef<Path>) -> Result<SendStats> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| ShardJoinError::io(path, e))?;
        let stats = self.send_reader(BufReader::new(file), path).await?;
        tracing::info!(
            rank = self.transport.rank(),
            path = %path.display(),
            frames = stats.frames,
            lines = stats.lines,
            bytes = stats.bytes,
            "partial file sent"
        );
        Ok(stats)
    }

    /// Send everything `reader` yields. `path` labels I/O errors.
    ///
    /// Each line is re-terminated with `\n` (also the last one, if the input
    /// lacked it). Every `lines_per_chunk` lines form one chunk; whatever
    /// remains at EOF is sent as a final chunk even when empty.
    pub async fn send_reader<R>(&self, mut reader: R, path: &Path) -> Result<SendStats>
    where
        R: AsyncBufRead + Unpin,
    {
        if self.transport.rank() == self.collector {
            return Err(ShardJoinError::Config(format!(
                "rank {} is the collector and has nothing to send to itself",
                self.collector
            )));
        }

        let mut stats = SendStats::default();
        let mut chunk = Vec::new();
        let mut line = Vec::new();
        let mut lines_in_chunk = 0usize;

        loop {
            line.clear();
            let n = reader
                .read_until(b'\n', &mut line)
                .await
                .map_err(|e| ShardJoinError::io(path, e))?;
            if n == 0 {
                break;
            }
            if line.last() != Some(&b'\n') {
                line.push(b'\n');
            }
            chunk.extend_from_slice(&line);
            lines_in_chunk += 1;
            stats.lines += 1;

            if lines_in_chunk == self.lines_per_chunk {
                self.send_chunk(&mut chunk, &mut stats).await?;
                lines_in_chunk = 0;
            }
        }

        self.send_chunk(&mut chunk, &mut stats).await?;
        send_frame(self.transport, self.collector, &Frame::EndOfStream).await?;
        stats.frames += 1;
        Ok(stats)
    }

    async fn send_chunk(&self, chunk: &mut Vec<u8>, stats: &mut SendStats) -> Result<()> {
        let frame = Frame::Chunk(std::mem::take(chunk));
        send_frame(self.transport, self.collector, &frame).await?;
        stats.frames += 1;
        stats.bytes += frame.payload_len() as u64;
        tracing::debug!(
            rank = self.transport.rank(),
            bytes = frame.payload_len(),
            "chunk sent"
        );
        Ok(())
    }
}
