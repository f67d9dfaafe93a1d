//! Gathering per-rank partial files onto the collector.

mod collector;
mod sender;

pub use collector::{CollectStats, CollectorState, SenderState, StreamCollector};
pub use sender::{SendStats, StreamSender};
