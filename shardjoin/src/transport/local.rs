use crate::error::{Result, ShardJoinError};
use crate::transport::TaggedTransport;
use crate::transport::mailbox::Mailbox;
use crate::types::{NodeContext, Rank, Tag};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Capacity of each directed in-process link.
const LINK_CAPACITY: usize = 64;

type Wire = mpsc::Sender<(Tag, Vec<u8>)>;

/// In-process transport: one endpoint per rank, all living in the same
/// tokio runtime.
///
/// Every ordered pair of ranks gets its own link, drained by a receive loop
/// into the destination's mailbox. Dropping an endpoint closes its outgoing
/// links, which peers observe as `PeerDisconnected` once buffered messages
/// are consumed.
pub struct LocalTransport {
    ctx: NodeContext,
    links: HashMap<Rank, Wire>,
    mailbox: Arc<Mailbox>,
}

impl LocalTransport {
    /// Build a fully connected group of `world_size` endpoints, indexed by rank.
    ///
    /// Must be called from within a tokio runtime.
    pub fn mesh(world_size: u32) -> Result<Vec<LocalTransport>> {
        let contexts = (0..world_size)
            .map(|r| NodeContext::new(r, world_size))
            .collect::<Result<Vec<_>>>()?;
        let mailboxes: Vec<Arc<Mailbox>> = (0..world_size).map(|_| Mailbox::new()).collect();

        let mut endpoints = Vec::with_capacity(world_size as usize);
        for ctx in contexts {
            let src = ctx.rank();
            let mut links = HashMap::new();
            for (dest, inbox) in mailboxes.iter().enumerate() {
                let dest = dest as Rank;
                if dest == src {
                    continue;
                }
                let (tx, rx) = mpsc::channel(LINK_CAPACITY);
                tokio::spawn(recv_loop(src, rx, Arc::clone(inbox)));
                links.insert(dest, tx);
            }
            endpoints.push(LocalTransport {
                ctx,
                links,
                mailbox: Arc::clone(&mailboxes[src as usize]),
            });
        }
        Ok(endpoints)
    }
}

impl Drop for LocalTransport {
    /// Release peers blocked on delivering to this endpoint.
    fn drop(&mut self) {
        let mailbox = Arc::clone(&self.mailbox);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move { mailbox.shutdown().await });
        }
    }
}

/// Drain one directed link into the destination mailbox.
async fn recv_loop(src: Rank, mut rx: mpsc::Receiver<(Tag, Vec<u8>)>, inbox: Arc<Mailbox>) {
    while let Some((tag, payload)) = rx.recv().await {
        if !inbox.deliver(src, tag, payload).await {
            tracing::debug!(src, tag, "local link: destination lane closed");
            break;
        }
    }
    inbox.close_peer(src).await;
}

impl TaggedTransport for LocalTransport {
    fn rank(&self) -> Rank {
        self.ctx.rank()
    }

    fn world_size(&self) -> u32 {
        self.ctx.world_size()
    }

    fn send_tagged<'a>(&'a self, dest: Rank, tag: Tag, data: &'a [u8]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.ctx.check_rank(dest)?;
            let link = self
                .links
                .get(&dest)
                .ok_or(ShardJoinError::UnknownPeer { rank: dest })?;
            link.send((tag, data.to_vec()))
                .await
                .map_err(|_| ShardJoinError::PeerDisconnected { rank: dest })
        })
    }

    fn recv_tagged<'a>(&'a self, src: Rank, tag: Tag) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            self.ctx.check_rank(src)?;
            if src == self.ctx.rank() {
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
            if src == self.ctx.rank() {
                return Err(ShardJoinError::UnknownPeer { rank: src });
            }
            Ok(self.mailbox.try_recv(src, tag).await)
        })
    }
}
