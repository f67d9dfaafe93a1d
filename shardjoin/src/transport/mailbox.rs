use crate::error::{Result, ShardJoinError};
use crate::types::{Rank, Tag};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// Channel capacity per `(src, tag)` lane.
const LANE_CAPACITY: usize = 64;

type SharedReceiver = Arc<Mutex<mpsc::Receiver<Vec<u8>>>>;

/// One `(src, tag)` lane. Lazily created by whichever side touches it first:
/// the receive loop delivering a message, or a caller waiting on it.
struct Lane {
    /// Dropped once the source peer disconnects, so waiters drain and then
    /// observe the closed channel.
    tx: Option<mpsc::Sender<Vec<u8>>>,
    rx: SharedReceiver,
}

#[derive(Default)]
struct MailboxState {
    lanes: HashMap<(Rank, Tag), Lane>,
    closed: HashSet<Rank>,
    /// Set once the owning endpoint is gone; nothing is delivered after that.
    shut_down: bool,
}

impl MailboxState {
    fn lane(&mut self, src: Rank, tag: Tag) -> &mut Lane {
        let closed = self.closed.contains(&src);
        self.lanes.entry((src, tag)).or_insert_with(|| {
            let (tx, rx) = mpsc::channel(LANE_CAPACITY);
            Lane {
                tx: (!closed).then_some(tx),
                rx: Arc::new(Mutex::new(rx)),
            }
        })
    }
}

/// Receive-side demultiplexer shared by every transport.
///
/// Messages are matched by `(source rank, tag)`, FIFO within a lane. A message
/// that arrives before anyone waits on its lane is buffered in the lane.
#[derive(Default)]
pub(crate) struct Mailbox {
    state: Mutex<MailboxState>,
}

impl Mailbox {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Deliver an incoming message. Waits for lane capacity.
    ///
    /// Returns `false` if the lane no longer accepts data (source closed).
    pub(crate) async fn deliver(&self, src: Rank, tag: Tag, payload: Vec<u8>) -> bool {
        // Clone the sender outside the lock to avoid holding it across `.await`.
        let tx = {
            let mut st = self.state.lock().await;
            if st.shut_down {
                return false;
            }
            st.lane(src, tag).tx.clone()
        };
        match tx {
            Some(tx) => tx.send(payload).await.is_ok(),
            None => false,
        }
    }

    /// Wait for the next message from `src` on `tag`.
    pub(crate) async fn recv(&self, src: Rank, tag: Tag) -> Result<Vec<u8>> {
        let rx = {
            let mut st = self.state.lock().await;
            Arc::clone(&st.lane(src, tag).rx)
        };
        let mut rx = rx.lock().await;
        rx.recv()
            .await
            .ok_or(ShardJoinError::PeerDisconnected { rank: src })
    }

    /// Take the next message from `src` on `tag` if one is already queued.
    pub(crate) async fn try_recv(&self, src: Rank, tag: Tag) -> Option<Vec<u8>> {
        let rx = {
            let mut st = self.state.lock().await;
            Arc::clone(&st.lane(src, tag).rx)
        };
        let mut rx = rx.lock().await;
        rx.try_recv().ok()
    }

    /// Mark `src` as gone. Already-buffered messages stay receivable; any
    /// further wait on one of its lanes fails with `PeerDisconnected`.
    pub(crate) async fn close_peer(&self, src: Rank) {
        let mut st = self.state.lock().await;
        st.closed.insert(src);
        for ((rank, _), lane) in st.lanes.iter_mut() {
            if *rank == src {
                lane.tx = None;
            }
        }
    }

    /// Drop every lane and refuse further deliveries. Senders blocked on a
    /// full lane are released with an error.
    pub(crate) async fn shutdown(&self) {
        let mut st = self.state.lock().await;
        st.shut_down = true;
        st.lanes.clear();
    }
}
