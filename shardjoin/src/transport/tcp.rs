use crate::config::ShardJoinConfig;
use crate::error::{Result, ShardJoinError};
use crate::transport::TaggedTransport;
use crate::transport::mailbox::Mailbox;
use crate::types::{NodeContext, Rank, Tag};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

/// Leading bytes of the connection handshake.
const HANDSHAKE_MAGIC: u32 = 0x534a_4e31; // "SJN1"

/// Handshake size: `[magic: u32 LE][rank: u32 LE][world_size: u32 LE]`.
const HANDSHAKE_SIZE: usize = 12;

const HANDSHAKE_ACCEPT: u8 = 1;

/// Delay between connection attempts while the collector is not up yet.
const CONNECT_RETRY: Duration = Duration::from_millis(100);

/// Tagged transport over plain TCP, arranged as a star around one hub rank
/// (the collector).
///
/// Every message is carried as a `[tag: u64 LE][len: u64 LE][payload]` frame.
/// One background loop per connection demultiplexes frames into the mailbox
/// by tag.
pub struct TcpTransport {
    ctx: NodeContext,
    writers: HashMap<Rank, Mutex<WriteHalf<TcpStream>>>,
    mailbox: Arc<Mailbox>,
    recv_handles: Vec<tokio::task::JoinHandle<()>>,
}

/// Bind a listener for the hub. Returns it with the resolved local address.
pub async fn tcp_listen(addr: SocketAddr) -> Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ShardJoinError::transport_with_source(format!("tcp listen {addr}"), e))?;
    let local = listener
        .local_addr()
        .map_err(|e| ShardJoinError::transport_with_source("tcp local_addr", e))?;
    Ok((listener, local))
}

impl TcpTransport {
    /// Hub side: accept one connection from every other rank.
    ///
    /// Each peer must introduce itself with a valid, unique rank and the same
    /// group size. Fails if the group is not complete within `timeout`.
    pub async fn accept_peers(
        ctx: NodeContext,
        listener: &TcpListener,
        max_frame_bytes: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let expected = ctx.world_size() as usize - 1;
        let mut streams: HashMap<Rank, TcpStream> = HashMap::new();
        let deadline = tokio::time::Instant::now() + timeout;

        while streams.len() < expected {
            let (mut stream, addr) = tokio::select! {
                res = listener.accept() => res
                    .map_err(|e| ShardJoinError::transport_with_source("tcp accept", e))?,
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(ShardJoinError::transport(format!(
                        "group formation timed out: {}/{expected} peers connected",
                        streams.len()
                    )));
                }
            };
            stream
                .set_nodelay(true)
                .map_err(|e| ShardJoinError::transport_with_source("tcp set_nodelay", e))?;

            let rank = read_handshake(&mut stream, &ctx).await?;
            if rank == ctx.rank() || streams.contains_key(&rank) {
                return Err(ShardJoinError::transport(format!(
                    "duplicate handshake for rank {rank} from {addr}"
                )));
            }
            stream
                .write_all(&[HANDSHAKE_ACCEPT])
                .await
                .map_err(|e| ShardJoinError::transport_with_source("tcp handshake ack", e))?;
            tracing::debug!(hub = ctx.rank(), peer = rank, %addr, "peer joined");
            streams.insert(rank, stream);
        }

        Ok(Self::from_streams(ctx, streams, max_frame_bytes))
    }

    /// Spoke side: connect to the hub at `addr`, retrying until `timeout`.
    pub async fn connect(
        ctx: NodeContext,
        hub: Rank,
        addr: SocketAddr,
        max_frame_bytes: usize,
        timeout: Duration,
    ) -> Result<Self> {
        ctx.check_rank(hub)?;
        let deadline = tokio::time::Instant::now() + timeout;
        let mut stream = loop {
            match TcpStream::connect(addr).await {
                Ok(s) => break s,
                Err(e) if tokio::time::Instant::now() + CONNECT_RETRY < deadline => {
                    tracing::debug!(rank = ctx.rank(), %addr, "hub not reachable yet: {e}");
                    tokio::time::sleep(CONNECT_RETRY).await;
                }
                Err(e) => {
                    return Err(ShardJoinError::transport_with_source(
                        format!("tcp connect {addr}"),
                        e,
                    ));
                }
            }
        };
        stream
            .set_nodelay(true)
            .map_err(|e| ShardJoinError::transport_with_source("tcp set_nodelay", e))?;

        stream
            .write_all(&encode_handshake(&ctx))
            .await
            .map_err(|e| ShardJoinError::transport_with_source("tcp handshake write", e))?;
        let mut ack = [0u8; 1];
        stream
            .read_exact(&mut ack)
            .await
            .map_err(|e| ShardJoinError::transport_with_source("tcp handshake ack", e))?;
        if ack[0] != HANDSHAKE_ACCEPT {
            return Err(ShardJoinError::transport(format!(
                "hub rejected handshake from rank {}",
                ctx.rank()
            )));
        }

        let streams = HashMap::from([(hub, stream)]);
        Ok(Self::from_streams(ctx, streams, max_frame_bytes))
    }

    /// Form a star on the loopback interface inside one process, with
    /// `config.collector_rank` as the hub.
    ///
    /// Frame limit and connect timeout come from `config`. Returns one
    /// transport per rank, indexed by rank.
    pub async fn bootstrap_local(world_size: u32, config: &ShardJoinConfig) -> Result<Vec<TcpTransport>> {
        let hub = config.collector_rank;
        let hub_ctx = NodeContext::new(hub, world_size)?;
        let (listener, addr) = tcp_listen(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let max_frame = config.max_frame_bytes;
        let timeout = config.connect_timeout;

        let hub_task = tokio::spawn(async move {
            TcpTransport::accept_peers(hub_ctx, &listener, max_frame, timeout).await
        });

        let mut spokes = Vec::new();
        for r in (0..world_size).filter(|&r| r != hub) {
            let ctx = NodeContext::new(r, world_size)?;
            spokes.push(tokio::spawn(TcpTransport::connect(
                ctx, hub, addr, max_frame, timeout,
            )));
        }

        let mut by_rank: Vec<Option<TcpTransport>> = (0..world_size).map(|_| None).collect();
        by_rank[hub as usize] = Some(
            hub_task
                .await
                .map_err(|e| ShardJoinError::transport_with_source("hub task panicked", e))??,
        );
        for h in spokes {
            let t = h
                .await
                .map_err(|e| ShardJoinError::transport_with_source("spoke task panicked", e))??;
            let rank = t.ctx.rank() as usize;
            by_rank[rank] = Some(t);
        }
        by_rank
            .into_iter()
            .map(|t| t.ok_or_else(|| ShardJoinError::transport("star bootstrap left a rank unset")))
            .collect()
    }

    fn from_streams(ctx: NodeContext, streams: HashMap<Rank, TcpStream>, max_frame_bytes: usize) -> Self {
        let mailbox = Mailbox::new();
        let mut writers = HashMap::new();
        let mut handles = Vec::new();
        for (peer, stream) in streams {
            let (reader, writer) = tokio::io::split(stream);
            handles.push(tokio::spawn(recv_loop(
                peer,
                reader,
                Arc::clone(&mailbox),
                max_frame_bytes,
            )));
            writers.insert(peer, Mutex::new(writer));
        }
        Self {
            ctx,
            writers,
            mailbox,
            recv_handles: handles,
        }
    }

    /// Write a tagged frame: `[tag: u64 LE][len: u64 LE][payload]`.
    async fn write_frame(&self, dest: Rank, tag: Tag, data: &[u8]) -> Result<()> {
        let writer = self
            .writers
            .get(&dest)
            .ok_or(ShardJoinError::UnknownPeer { rank: dest })?;
        let mut writer = writer.lock().await;
        writer
            .write_all(&tag.to_le_bytes())
            .await
            .map_err(|e| ShardJoinError::transport(format!("tcp write tag: {e}")))?;
        writer
            .write_all(&(data.len() as u64).to_le_bytes())
            .await
            .map_err(|e| ShardJoinError::transport(format!("tcp write len: {e}")))?;
        writer
            .write_all(data)
            .await
            .map_err(|e| ShardJoinError::transport(format!("tcp write payload: {e}")))?;
        writer
            .flush()
            .await
            .map_err(|e| ShardJoinError::transport(format!("tcp flush: {e}")))?;
        Ok(())
    }
}

impl TaggedTransport for TcpTransport {
    fn rank(&self) -> Rank {
        self.ctx.rank()
    }

    fn world_size(&self) -> u32 {
        self.ctx.world_size()
    }

    fn send_tagged<'a>(&'a self, dest: Rank, tag: Tag, data: &'a [u8]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.ctx.check_rank(dest)?;
            self.write_frame(dest, tag, data).await
        })
    }

    fn recv_tagged<'a>(&'a self, src: Rank, tag: Tag) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            self.ctx.check_rank(src)?;
            if !self.writers.contains_key(&src) {
                return Err(ShardJoinError::UnknownPeer { rank: src });
            }
            self.mailbox.recv(src, tag).await
        })
    }

    fn try_recv_tagged<'a>(
        &'a self,
        src: Rank,
        tag: Tag,
    ) -> BoxFuture<'a, Result<Option<Vec<u8>>>> {
        Box::pin(async move {
            self.ctx.check_rank(src)?;
            if !self.writers.contains_key(&src) {
                return Err(ShardJoinError::UnknownPeer { rank: src });
            }
            Ok(self.mailbox.try_recv(src, tag).await)
        })
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        for h in &self.recv_handles {
            h.abort();
        }
    }
}

fn encode_handshake(ctx: &NodeContext) -> [u8; HANDSHAKE_SIZE] {
    let mut buf = [0u8; HANDSHAKE_SIZE];
    buf[0..4].copy_from_slice(&HANDSHAKE_MAGIC.to_le_bytes());
    buf[4..8].copy_from_slice(&ctx.rank().to_le_bytes());
    buf[8..12].copy_from_slice(&ctx.world_size().to_le_bytes());
    buf
}

/// Read and validate a spoke's handshake. Returns the announced rank.
async fn read_handshake(stream: &mut TcpStream, hub: &NodeContext) -> Result<Rank> {
    let mut buf = [0u8; HANDSHAKE_SIZE];
    stream
        .read_exact(&mut buf)
        .await
        .map_err(|e| ShardJoinError::transport_with_source("tcp handshake read", e))?;
    let word = |i: usize| u32::from_le_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
    let (magic, rank, world_size) = (word(0), word(4), word(8));

    if magic != HANDSHAKE_MAGIC {
        return Err(ShardJoinError::transport(format!(
            "bad handshake magic {magic:#x}"
        )));
    }
    if world_size != hub.world_size() {
        return Err(ShardJoinError::transport(format!(
            "rank {rank} reports group size {world_size}, hub has {}",
            hub.world_size()
        )));
    }
    hub.check_rank(rank)?;
    Ok(rank)
}

/// Background loop: read frames from one peer and route them by tag.
async fn recv_loop(
    peer: Rank,
    mut reader: ReadHalf<TcpStream>,
    mailbox: Arc<Mailbox>,
    max_frame_bytes: usize,
) {
    let mut tag_buf = [0u8; 8];
    let mut len_buf = [0u8; 8];
    loop {
        if let Err(e) = reader.read_exact(&mut tag_buf).await {
            tracing::debug!(peer, "tcp recv loop ended: {e}");
            break;
        }
        if let Err(e) = reader.read_exact(&mut len_buf).await {
            tracing::debug!(peer, "tcp recv loop ended reading len: {e}");
            break;
        }
        let tag = u64::from_le_bytes(tag_buf);
        let len = u64::from_le_bytes(len_buf) as usize;

        if len > max_frame_bytes {
            tracing::warn!(peer, len, "tcp: frame too large, closing connection");
            break;
        }

        let mut payload = vec![0u8; len];
        if let Err(e) = reader.read_exact(&mut payload).await {
            tracing::debug!(peer, "tcp recv loop ended reading payload: {e}");
            break;
        }

        if !mailbox.deliver(peer, tag, payload).await {
            break;
        }
    }
    mailbox.close_peer(peer).await;
}
