//! Reassembly of out-of-order RTP audio packets using a sliding window of
//! Reed-Solomon FEC blocks.
//!
//! A session delivers fixed-size windows of `data_shards` audio packets
//! alongside `parity_shards` FEC packets protecting that window. This crate
//! tracks live windows, emits packets in order as soon as they (or their
//! FEC-recovered reconstruction) are available, and falls back to
//! placeholders for windows that time out before they can be completed.

mod block;
mod block_list;
mod clock;
mod codec;
mod config;
mod error;
mod pool;
mod queue;
mod rtp;
mod seq;

pub use clock::{Clock, SystemClock};
pub use config::Config;
pub use error::Error;
pub use queue::{AddPacketOutcome, Queue, QueuedPacket};
pub use rtp::{RTP_HEADER_LEN, RTP_VERSION_FLAGS};
