//! Point-to-point tagged byte transport between ranks.
//!
//! The join and collection logic only sees [`TaggedTransport`]; the
//! in-process mesh and the TCP star both implement it.

mod local;
mod mailbox;
mod tcp;

pub use local::LocalTransport;
pub use tcp::{TcpTransport, tcp_listen};

use crate::error::Result;
use crate::types::{Rank, Tag};
use futures::future::BoxFuture;

/// Blocking-style tagged messaging: a send completes once the message is
/// handed to the transport, a receive completes once a message from `src`
/// with `tag` is available.
///
/// Messages between one `(src, dest, tag)` triple are delivered in order.
pub trait TaggedTransport: Send + Sync {
    /// Rank of the local endpoint.
    fn rank(&self) -> Rank;

    /// Number of ranks in the group.
    fn world_size(&self) -> u32;

    /// Send raw bytes to `dest` under `tag`.
    fn send_tagged<'a>(&'a self, dest: Rank, tag: Tag, data: &'a [u8]) -> BoxFuture<'a, Result<()>>;

    /// Receive the next message from `src` carrying `tag`.
    fn recv_tagged<'a>(&'a self, src: Rank, tag: Tag) -> BoxFuture<'a, Result<Vec<u8>>>;

    /// Take a message from `src` carrying `tag` only if one has already
    /// arrived. Never waits for the peer.
    fn try_recv_tagged<'a>(&'a self, src: Rank, tag: Tag)
    -> BoxFuture<'a, Result<Option<Vec<u8>>>>;
}
