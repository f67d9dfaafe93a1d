use crate::config::ShardJoinConfig;
use crate::error::{Result, ShardJoinError};
use crate::protocol::{Frame, recv_frame};
use crate::transport::TaggedTransport;
use crate::types::{FrameTags, Rank};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

/// Per-sender progress as seen by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    /// More frames are expected.
    Streaming,
    /// End of stream received; the rank is never polled again.
    Done,
}

/// Tracks every sender independently. Collection ends only once all of them
/// are `Done`, regardless of the order in which they finish.
#[derive(Debug, Clone)]
pub struct CollectorState {
    senders: BTreeMap<Rank, SenderState>,
}

impl CollectorState {
    /// Every rank except `collector` starts out `Streaming`.
    pub fn new(world_size: u32, collector: Rank) -> Self {
        let senders = (0..world_size)
            .filter(|&r| r != collector)
            .map(|r| (r, SenderState::Streaming))
            .collect();
        Self { senders }
    }

    /// Ranks still streaming, in increasing order: the next polling round.
    pub fn streaming(&self) -> Vec<Rank> {
        self.senders
            .iter()
            .filter(|(_, s)| **s == SenderState::Streaming)
            .map(|(&r, _)| r)
            .collect()
    }

    pub fn state(&self, rank: Rank) -> Option<SenderState> {
        self.senders.get(&rank).copied()
    }

    /// Apply a frame received from `rank`.
    ///
    /// A frame from a rank that already finished is a protocol violation.
    pub fn on_frame(&mut self, rank: Rank, frame: &Frame) -> Result<()> {
        let state = self
            .senders
            .get_mut(&rank)
            .ok_or(ShardJoinError::UnknownPeer { rank })?;
        if *state == SenderState::Done {
            return Err(ShardJoinError::protocol(
                rank,
                "frame received after end of stream",
            ));
        }
        if frame.is_end() {
            *state = SenderState::Done;
        }
        Ok(())
    }

    /// Every sender rank, in increasing order.
    pub fn senders(&self) -> impl Iterator<Item = Rank> + '_ {
        self.senders.keys().copied()
    }

    pub fn is_done(&self) -> bool {
        self.senders.values().all(|s| *s == SenderState::Done)
    }
}

/// Counters for one completed collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectStats {
    /// Bytes copied from the collector's own partial file.
    pub own_bytes: u64,
    /// Frames received from senders, end-of-stream frames included.
    pub frames: u64,
    /// Bytes appended from senders.
    pub bytes: u64,
    pub frames_per_rank: BTreeMap<Rank, u64>,
}

/// Merges every rank's partial output into one file on the collector rank.
pub struct StreamCollector<'a, T: TaggedTransport + ?Sized> {
    transport: &'a T,
    flush_bytes: usize,
    recv_timeout: Duration,
    first_recv_timeout: Duration,
    max_frame_bytes: usize,
}

impl<'a, T: TaggedTransport + ?Sized> StreamCollector<'a, T> {
    pub fn new(transport: &'a T, config: &ShardJoinConfig) -> Self {
        Self {
            transport,
            flush_bytes: config.flush_bytes.max(1),
            recv_timeout: config.recv_timeout,
            first_recv_timeout: config.first_recv_timeout,
            max_frame_bytes: config.max_frame_bytes,
        }
    }

    /// Truncate `output`, copy `own_partial` into it, then append frames from
    /// all other ranks, polling them round-robin in rank order until every
    /// one has sent its end-of-stream frame.
    ///
    /// Anything a sender delivers after its end-of-stream frame is a
    /// protocol error.
    pub async fn collect(
        &self,
        own_partial: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<CollectStats> {
        let own_partial = own_partial.as_ref();
        let output = output.as_ref();
        let me = self.transport.rank();

        let file = tokio::fs::File::create(output)
            .await
            .map_err(|e| ShardJoinError::io(output, e))?;
        let mut out = BufWriter::with_capacity(self.flush_bytes, file);

        let mut own = tokio::fs::File::open(own_partial)
            .await
            .map_err(|e| ShardJoinError::io(own_partial, e))?;
        let mut stats = CollectStats {
            own_bytes: tokio::io::copy(&mut own, &mut out)
                .await
                .map_err(|e| ShardJoinError::io(output, e))?,
            ..CollectStats::default()
        };
        out.flush().await.map_err(|e| ShardJoinError::io(output, e))?;

        let mut state = CollectorState::new(self.transport.world_size(), me);
        while !state.is_done() {
            for rank in state.streaming() {
                let first = !stats.frames_per_rank.contains_key(&rank);
                let frame = self.recv(rank, first).await?;
                state.on_frame(rank, &frame)?;
                stats.frames += 1;
                *stats.frames_per_rank.entry(rank).or_default() += 1;

                match frame {
                    Frame::Chunk(data) => {
                        self.append(&mut out, &data, output).await?;
                        stats.bytes += data.len() as u64;
                        tracing::debug!(
                            collector = me,
                            src = rank,
                            bytes = data.len(),
                            "chunk appended"
                        );
                    }
                    Frame::EndOfStream => {
                        tracing::debug!(collector = me, src = rank, "sender finished");
                    }
                }
            }
        }
        out.shutdown().await.map_err(|e| ShardJoinError::io(output, e))?;

        // Give receive loops a turn to hand over messages already received.
        tokio::task::yield_now().await;
        for rank in state.senders() {
            let control = FrameTags::for_rank(rank).control;
            if self.transport.try_recv_tagged(rank, control).await?.is_some() {
                return Err(ShardJoinError::protocol(
                    rank,
                    "frame received after end of stream",
                ));
            }
        }

        tracing::info!(
            collector = me,
            output = %output.display(),
            own_bytes = stats.own_bytes,
            frames = stats.frames,
            bytes = stats.bytes,
            "collection finished"
        );
        Ok(stats)
    }

    /// Receive one frame from `rank`. The first frame of a sender only
    /// arrives after its whole join, so it gets `first_recv_timeout`.
    async fn recv(&self, rank: Rank, first: bool) -> Result<Frame> {
        let limit = if first {
            self.first_recv_timeout
        } else {
            self.recv_timeout
        };
        let fut = recv_frame(self.transport, rank, self.max_frame_bytes);
        match tokio::time::timeout(limit, fut).await {
            Ok(res) => res,
            Err(_) => Err(ShardJoinError::Timeout {
                rank,
                timeout_ms: limit.as_millis() as u64,
            }),
        }
    }

    /// Append `data` byte-for-byte, flushing after every `flush_bytes`.
    async fn append<W>(&self, out: &mut W, data: &[u8], output: &Path) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        for piece in data.chunks(self.flush_bytes) {
            out.write_all(piece)
                .await
                .map_err(|e| ShardJoinError::io(output, e))?;
            out.flush().await.map_err(|e| ShardJoinError::io(output, e))?;
        }
        Ok(())
    }
}
